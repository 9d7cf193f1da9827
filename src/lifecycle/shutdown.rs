//! Stop signal for long-running loops.

use tokio::sync::broadcast;

/// Coordinator for stopping a loop, such as a backend's health monitor.
///
/// One coordinator exists per activation. Dropping it stops listeners
/// exactly like [`trigger`](Self::trigger) does.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Get a listener for this signal.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
            fired: false,
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of listeners still alive.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
    fired: bool,
}

impl ShutdownListener {
    /// Resolve once the coordinator triggers or is dropped.
    pub async fn recv(&mut self) {
        if !self.fired {
            // Both a value and a closed channel mean stop.
            let _ = self.rx.recv().await;
            self.fired = true;
        }
    }

    /// Non-blocking check.
    pub fn is_stopped(&mut self) -> bool {
        if !self.fired {
            self.fired = !matches!(self.rx.try_recv(), Err(broadcast::error::TryRecvError::Empty));
        }
        self.fired
    }
}
