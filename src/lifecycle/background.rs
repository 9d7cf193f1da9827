//! Background task runner.
//!
//! # Responsibilities
//! - Run the router's long-running work off the caller's task (DNS,
//!   connection open/close, health checks, re-bootstraps)
//! - Hand back a completion signal where the submitter must wait
//! - Abort whatever is still running on shutdown
//!
//! # Design Decisions
//! - Tasks run on the ambient Tokio runtime; its worker threads are the pool
//! - Finished tasks are reaped on every spawn so the set stays small
//! - Submitting after shutdown is refused, not queued

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio::task::JoinSet;

/// Tracks every task the router spawns.
#[derive(Debug)]
pub struct Background {
    /// `None` once shut down.
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl Background {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn fire-and-forget work. Returns false after shutdown.
    pub fn spawn<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().expect("background task set poisoned");
        match tasks.as_mut() {
            Some(set) => {
                while set.try_join_next().is_some() {}
                set.spawn(fut);
                true
            }
            None => false,
        }
    }

    /// Spawn work and return a receiver that fires with its output.
    ///
    /// The receiver errors if the task is aborted before finishing.
    pub fn submit<F, T>(&self, fut: F) -> Option<oneshot::Receiver<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let spawned = self.spawn(async move {
            let _ = tx.send(fut.await);
        });
        spawned.then_some(rx)
    }

    /// Number of tasks still tracked (including finished, unreaped ones).
    pub fn len(&self) -> usize {
        let tasks = self.tasks.lock().expect("background task set poisoned");
        tasks.as_ref().map_or(0, JoinSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutdown(&self) -> bool {
        self.tasks.lock().expect("background task set poisoned").is_none()
    }

    /// Abort all running tasks and refuse new ones.
    pub fn shutdown(&self) {
        let set = self.tasks.lock().expect("background task set poisoned").take();
        if let Some(mut set) = set {
            tracing::debug!(tasks = set.len(), "Shutting down background tasks");
            set.abort_all();
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}
