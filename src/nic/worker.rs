//! Serialized execution of reconciliation passes.
//!
//! Every trigger (startup, directory change, SIGHUP, admin reload) goes
//! through one channel, and one task runs the passes back to back, so two
//! passes never touch the host at the same time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::nic::link::LinkControl;
use crate::nic::reconcile::NicReconciler;

/// Cloneable handle used to request a reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ReconcileHandle {
    /// Queue a pass. Returns `false` once the worker has stopped.
    pub fn request(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Sender for feeding watcher events straight into the worker.
    pub fn sender(&self) -> mpsc::UnboundedSender<()> {
        self.tx.clone()
    }
}

/// Spawn the worker. It stops on shutdown or when every handle is dropped.
pub fn spawn<L>(reconciler: NicReconciler<L>, mut shutdown: ShutdownSignal) -> (ReconcileHandle, JoinHandle<()>)
where
    L: LinkControl + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let reconciler = Arc::new(reconciler);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                request = rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }

            // Requests that piled up while the last pass ran are covered by
            // the pass we are about to start.
            while rx.try_recv().is_ok() {}

            let reconciler = Arc::clone(&reconciler);
            if let Err(e) = tokio::task::spawn_blocking(move || reconciler.reconcile_interfaces()).await {
                tracing::error!(error = %e, "Reconciliation pass panicked");
            }
        }
        tracing::debug!("Reconcile worker stopped");
    });

    (ReconcileHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::{Shutdown, ShutdownMode};
    use crate::nic::link::{LinkError, LiveInterface};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHost {
        passes: AtomicUsize,
    }

    impl LinkControl for Arc<CountingHost> {
        fn set_down(&self, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        fn set_up(&self, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        fn set_name(&self, _: &str, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        fn set_mtu(&self, _: &str, _: u32) -> Result<(), LinkError> {
            Ok(())
        }
        fn interfaces(&self) -> Result<Vec<LiveInterface>, LinkError> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn runs_requested_passes_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(CountingHost::default());
        let shutdown = Shutdown::new();
        let reconciler = NicReconciler::new(dir.path(), host.clone()).with_kernel_modules(Vec::new());

        let (handle, task) = spawn(reconciler, shutdown.subscribe());
        assert!(handle.request());

        tokio::time::timeout(Duration::from_secs(2), async {
            while host.passes.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("no pass ran");

        shutdown.trigger(ShutdownMode::Graceful);
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!handle.request());
    }
}
