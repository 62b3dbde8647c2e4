//! Shutdown coordination for the agent.

use tokio::sync::watch;

/// How the agent should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop accepting, let open connections finish.
    Graceful,
    /// Stop accepting and drop open connections.
    Force,
}

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe to the request; whoever owns the main server
/// marks it stopped so callers of [`wait_stopped`](Self::wait_stopped) can
/// answer only once the agent is really down.
#[derive(Debug)]
pub struct Shutdown {
    requested: watch::Sender<Option<ShutdownMode>>,
    stopped: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (requested, _) = watch::channel(None);
        let (stopped, _) = watch::channel(false);
        Self { requested, stopped }
    }

    /// Subscribe to the shutdown request.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.requested.subscribe(),
        }
    }

    /// Request shutdown. A forced request upgrades an earlier graceful one,
    /// never the other way round.
    pub fn trigger(&self, mode: ShutdownMode) {
        self.requested.send_if_modified(|current| match (*current, mode) {
            (Some(ShutdownMode::Force), _) => false,
            (Some(ShutdownMode::Graceful), ShutdownMode::Graceful) => false,
            _ => {
                *current = Some(mode);
                true
            }
        });
    }

    pub fn requested(&self) -> Option<ShutdownMode> {
        *self.requested.borrow()
    }

    /// Record that the main server has stopped.
    pub fn mark_stopped(&self) {
        self.stopped.send_replace(true);
    }

    /// Wait until [`mark_stopped`](Self::mark_stopped) has been called.
    pub async fn wait_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<ShutdownMode>>,
}

impl ShutdownSignal {
    /// Wait for a shutdown request. Returns immediately if one was already made.
    pub async fn recv(&mut self) -> ShutdownMode {
        match self.rx.wait_for(Option::is_some).await {
            Ok(mode) => (*mode).unwrap_or(ShutdownMode::Graceful),
            // Coordinator dropped: nothing can ask us to keep running.
            Err(_) => ShutdownMode::Graceful,
        }
    }

    /// Wait for a forced shutdown request.
    pub async fn forced(&mut self) {
        let _ = self
            .rx
            .wait_for(|mode| *mode == Some(ShutdownMode::Force))
            .await;
    }
}
