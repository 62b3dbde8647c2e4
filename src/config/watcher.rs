//! Directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownSignal;

/// A watcher that signals whenever entries of one directory change.
pub struct DirWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<()>,
}

impl DirWatcher {
    /// Create a new DirWatcher.
    ///
    /// Returns the watcher and a receiver that gets one message per change
    /// event. Bursts are not coalesced here; consumers drain the channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Send change notifications into an existing channel instead.
    pub fn with_sender(path: &Path, update_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            path: path.to_path_buf(),
            update_tx,
        }
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(&self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::debug!(path = %path.display(), kind = ?event.kind, "Directory change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Directory watcher started");
        Ok(watcher)
    }

    /// Keep the directory watched for as long as it exists.
    ///
    /// The directory is checked every `retry`. When it appears, a watch is
    /// installed and one change is sent, since files may already be in it.
    /// When it disappears, the stale watch is dropped and the check resumes.
    pub fn spawn_when_present(self, retry: Duration, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut watcher: Option<RecommendedWatcher> = None;
            let mut last_error: Option<String> = None;

            loop {
                let present = self.path.is_dir();
                if present && watcher.is_none() {
                    match self.run() {
                        Ok(w) => {
                            watcher = Some(w);
                            last_error = None;
                            let _ = self.update_tx.send(());
                        }
                        Err(e) => {
                            let e = e.to_string();
                            if last_error.as_ref() != Some(&e) {
                                tracing::warn!(
                                    path = %self.path.display(),
                                    error = %e,
                                    "Cannot watch directory, will retry"
                                );
                            }
                            last_error = Some(e);
                        }
                    }
                } else if !present && watcher.take().is_some() {
                    tracing::info!(path = %self.path.display(), "Watched directory removed, waiting for it to return");
                    let _ = self.update_tx.send(());
                }

                tokio::select! {
                    _ = tokio::time::sleep(retry) => {}
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}
