//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe one backend with a topology query
//! - Count consecutive failures; take the backend down at the threshold
//! - Ask the router to rediscover the cluster when a leader goes down

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::lifecycle::shutdown::ShutdownListener;
use crate::load_balancer::backend::{Backend, BackendEvent, BackendSettings};
use crate::observability::metrics;
use crate::resilience::backoff::jittered;

/// Health check loop for a single active backend.
pub struct HealthMonitor {
    backend: Arc<Backend>,
    stop: ShutdownListener,
    interval: Duration,
    jitter: f64,
}

impl HealthMonitor {
    pub fn new(backend: Arc<Backend>, stop: ShutdownListener, settings: &BackendSettings) -> Self {
        Self {
            backend,
            stop,
            interval: settings.health_interval,
            jitter: settings.health_jitter,
        }
    }

    pub async fn run(mut self) {
        loop {
            let delay = jittered(self.interval, self.jitter);
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = self.stop.recv() => {
                    tracing::trace!(backend = %self.backend, "Health monitor stopped");
                    break;
                }
            }

            if !self.check().await {
                break;
            }
        }
    }

    /// Run one health round. Returns false once the monitor should stop.
    pub async fn check(&mut self) -> bool {
        let backend = &self.backend;
        if self.stop.is_stopped() || backend.is_closed() || !backend.is_active() {
            return false;
        }

        tracing::trace!(backend = %backend, "Running health check");
        let healthy = backend.health_check().await;
        metrics::record_health_check(healthy);
        if !healthy {
            let failures = backend.record_failure();
            tracing::debug!(
                backend = %backend,
                failures,
                threshold = backend.error_threshold(),
                "Health check failed"
            );
        }

        if !backend.is_healthy() {
            tracing::debug!(backend = %backend, "Marking unhealthy backend down");
            let was_leader = backend.is_leader();
            if backend.down().await && was_leader {
                tracing::info!(
                    backend = %backend,
                    "Leader is unhealthy; rebuilding roster from discovery seeds"
                );
                backend.emit(BackendEvent::LeaderLost(backend.clone()));
            }
            return false;
        }

        if healthy && backend.is_suspect() {
            backend.reset_errors();
        }
        true
    }
}
