//! Backend abstraction.
//!
//! # Responsibilities
//! - Own the live connection to a single cluster node
//! - Bring the connection up/down and schedule its health monitor
//! - Track consecutive health-check failures
//! - Report state changes to the router as [`BackendEvent`]s
//!
//! # Design Decisions
//! - A backend never changes address; role and metadata may change in place
//! - All mutable fields sit behind one mutex, never held across an await
//! - The router learns about "up" from the return value of [`Backend::up`];
//!   "down", topology refreshes and leader loss arrive over a channel

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cluster::connection::{ConnectionError, ConnectionFactory, SharedConnection};
use crate::cluster::endpoint::{EndpointSet, Role, ServiceEndpoint};
use crate::cluster::resolver::Resolver;
use crate::config::RouterConfig;
use crate::health::active::HealthMonitor;
use crate::health::state::{BackendState, ErrorCounter};
use crate::lifecycle::{Background, Shutdown};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::routing::error::RouterError;

/// State changes a backend reports to its router.
#[derive(Debug)]
pub enum BackendEvent {
    /// The backend went down; drop it from the live map.
    Down(Arc<Backend>),
    /// A leader reported this topology; apply it.
    Refresh(EndpointSet),
    /// A leader went down; rediscover the cluster from the seeds.
    LeaderLost(Arc<Backend>),
}

/// Timing and threshold settings shared by all backends of a router.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub health_interval: Duration,
    pub health_jitter: f64,
    pub health_timeout: Duration,
    pub connect_timeout: Duration,
    pub unhealthy_threshold: u32,
}

impl From<&RouterConfig> for BackendSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            health_interval: config.health_check.interval(),
            health_jitter: config.health_check.jitter_ratio,
            health_timeout: config.health_check.timeout(),
            connect_timeout: config.timeouts.connect(),
            unhealthy_threshold: config.health_check.unhealthy_threshold,
        }
    }
}

/// Collaborators shared by a router and all of its backends.
pub struct BackendContext {
    pub factory: Arc<dyn ConnectionFactory>,
    pub resolver: Arc<dyn Resolver>,
    pub background: Arc<Background>,
    pub events: mpsc::UnboundedSender<BackendEvent>,
    pub settings: BackendSettings,
}

struct Inner {
    endpoint: ServiceEndpoint,
    connection: Option<SharedConnection>,
    active: bool,
    closed: bool,
    ever_active: bool,
    /// Cleared by `mark_unhealthy`, restored when the connection reopens.
    healthy: bool,
    /// Stops the running health monitor when dropped.
    monitor: Option<Shutdown>,
}

/// A single cluster node and its connection.
pub struct Backend {
    inner: Mutex<Inner>,
    errors: ErrorCounter,
    ctx: Arc<BackendContext>,
}

impl Backend {
    /// Create a pending backend. Nothing is opened until [`up`](Self::up).
    pub fn new(endpoint: ServiceEndpoint, ctx: Arc<BackendContext>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                endpoint,
                connection: None,
                active: false,
                closed: false,
                ever_active: false,
                healthy: true,
                monitor: None,
            }),
            errors: ErrorCounter::new(ctx.settings.unhealthy_threshold),
            ctx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("backend state poisoned")
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        self.lock().endpoint.clone()
    }

    pub fn addr_port(&self) -> SocketAddr {
        self.lock().endpoint.addr_port()
    }

    pub fn role(&self) -> Role {
        self.lock().endpoint.role
    }

    pub fn is_leader(&self) -> bool {
        self.role() == Role::Leader
    }

    /// The live connection, if the backend is active.
    pub fn connection(&self) -> Option<SharedConnection> {
        self.lock().connection.clone()
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn state(&self) -> BackendState {
        let inner = self.lock();
        if inner.closed {
            BackendState::Closed
        } else if inner.active {
            BackendState::Active
        } else if inner.ever_active {
            BackendState::Down
        } else {
            BackendState::Pending
        }
    }

    pub fn error_count(&self) -> u32 {
        self.errors.count()
    }

    pub fn error_threshold(&self) -> u32 {
        self.errors.threshold()
    }

    /// Healthy unless marked otherwise, the failure threshold is reached,
    /// or the connection reports its transport gone.
    pub fn is_healthy(&self) -> bool {
        let inner = self.lock();
        inner.healthy
            && !self.errors.is_exhausted()
            && inner.connection.as_ref().map_or(true, |c| !c.is_broken())
    }

    /// True when a health check failed since the last success.
    pub fn is_suspect(&self) -> bool {
        self.errors.is_suspect()
    }

    /// Force the next health round to take this backend down.
    pub fn mark_unhealthy(&self) {
        self.lock().healthy = false;
    }

    pub(crate) fn record_failure(&self) -> u32 {
        self.errors.record_failure()
    }

    pub(crate) fn reset_errors(&self) {
        self.errors.reset();
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        // The router may already be gone; nothing is listening then.
        let _ = self.ctx.events.send(event);
    }

    /// Replace the endpoint in place.
    ///
    /// Returns `Ok(false)` when nothing changed. A different address is a
    /// reconciliation bug and is refused.
    pub fn update(&self, endpoint: ServiceEndpoint) -> Result<bool, RouterError> {
        let mut inner = self.lock();
        if inner.endpoint == endpoint {
            return Ok(false);
        }
        if inner.endpoint.addr_port() != endpoint.addr_port() {
            return Err(RouterError::AddressChanged {
                current: inner.endpoint.addr_port(),
                requested: endpoint.addr_port(),
            });
        }
        inner.endpoint = endpoint;
        Ok(true)
    }

    /// Open the connection and start the health monitor.
    ///
    /// Returns `Ok(true)` if this call activated the backend. A backend
    /// closed while connecting discards the fresh connection and returns
    /// `Ok(false)`.
    pub async fn up(self: &Arc<Self>) -> Result<bool, ConnectionError> {
        let addr = {
            let inner = self.lock();
            if inner.closed || inner.active {
                return Ok(false);
            }
            inner.endpoint.addr_port()
        };

        let connection = with_timeout(
            self.ctx.settings.connect_timeout,
            self.ctx.factory.connect(addr),
        )
        .await?;

        let listener = {
            let mut inner = self.lock();
            if inner.closed || inner.active {
                None
            } else {
                inner.connection = Some(connection.clone());
                inner.active = true;
                inner.ever_active = true;
                inner.healthy = true;
                self.errors.reset();
                let shutdown = Shutdown::new();
                let listener = shutdown.listener();
                inner.monitor = Some(shutdown);
                Some(listener)
            }
        };

        let Some(listener) = listener else {
            tracing::debug!(backend = %self, "Backend retired while connecting; discarding connection");
            connection.close().await;
            return Ok(false);
        };

        tracing::debug!(backend = %self, "Creating health checker");
        let monitor = HealthMonitor::new(self.clone(), listener, &self.ctx.settings);
        self.ctx.background.spawn(monitor.run());
        metrics::record_backend_transition(self.role(), "up");
        Ok(true)
    }

    /// Close the connection and stop health checks. The backend can be
    /// brought up again later; use [`close`](Self::close) to retire it.
    ///
    /// Returns true if this call took the backend down.
    pub async fn down(self: &Arc<Self>) -> bool {
        let connection = {
            let mut inner = self.lock();
            if !inner.active || inner.closed {
                return false;
            }
            Self::deactivate(&mut inner)
        };

        self.emit(BackendEvent::Down(self.clone()));
        metrics::record_backend_transition(self.role(), "down");
        if let Some(connection) = connection {
            connection.close().await;
        }
        true
    }

    /// Retire the backend for good. Idempotent.
    pub async fn close(self: &Arc<Self>) {
        let (connection, was_active) = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let was_active = inner.active;
            (Self::deactivate(&mut inner), was_active)
        };

        if was_active {
            self.emit(BackendEvent::Down(self.clone()));
        }
        metrics::record_backend_transition(self.role(), "closed");
        if let Some(connection) = connection {
            connection.close().await;
        }
    }

    fn deactivate(inner: &mut Inner) -> Option<SharedConnection> {
        // Dropping the coordinator stops the monitor loop.
        inner.monitor = None;
        inner.active = false;
        inner.connection.take()
    }

    /// Probe the node with a topology query.
    ///
    /// A leader that lists itself as leader pushes the whole reported
    /// topology back to the router.
    pub async fn health_check(&self) -> bool {
        let (connection, addr) = {
            let inner = self.lock();
            match (&inner.connection, inner.active && !inner.closed) {
                (Some(connection), true) => (connection.clone(), inner.endpoint.addr_port()),
                _ => return false,
            }
        };

        let raw = match with_timeout(self.ctx.settings.health_timeout, connection.list_endpoints()).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(backend = %self, error = %e, "Health probe failed");
                return false;
            }
        };

        let reported = ServiceEndpoint::from_endpoints(raw, self.ctx.resolver.as_ref()).await;
        let reports_leader = reported
            .iter()
            .any(|ep| ep.addr_port() == addr && ep.is_leader());
        if reports_leader {
            tracing::debug!(backend = %self, "Leader backend is healthy; refreshing endpoints");
            self.emit(BackendEvent::Refresh(reported));
        }
        true
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backend({})", self.lock().endpoint)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Backend")
            .field("endpoint", &inner.endpoint)
            .field("active", &inner.active)
            .field("closed", &inner.closed)
            .field("errors", &self.errors.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::connection::Connection;
    use crate::cluster::endpoint::RawEndpoint;
    use crate::cluster::resolver::StaticResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct StubConnection {
        endpoints: Vec<RawEndpoint>,
        closes: AtomicUsize,
        broken: AtomicBool,
    }

    #[async_trait]
    impl Connection for StubConnection {
        async fn list_endpoints(&self) -> Result<Vec<RawEndpoint>, ConnectionError> {
            Ok(self.endpoints.clone())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_broken(&self) -> bool {
            self.broken.load(Ordering::SeqCst)
        }
    }

    struct StubFactory {
        connection: Arc<StubConnection>,
        delay: Duration,
    }

    #[async_trait]
    impl ConnectionFactory for StubFactory {
        async fn connect(&self, _addr: SocketAddr) -> Result<SharedConnection, ConnectionError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.connection.clone())
        }
    }

    fn endpoint(addr: &str, role: Role) -> ServiceEndpoint {
        let addr: SocketAddr = addr.parse().unwrap();
        ServiceEndpoint::new(addr.ip(), addr.port(), role)
    }

    fn context(
        connection: Arc<StubConnection>,
        delay: Duration,
    ) -> (Arc<BackendContext>, mpsc::UnboundedReceiver<BackendEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let mut config = RouterConfig::default();
        config.health_check.interval_ms = 60_000;
        let ctx = BackendContext {
            factory: Arc::new(StubFactory { connection, delay }),
            resolver: Arc::new(StaticResolver::new()),
            background: Arc::new(Background::new()),
            events,
            settings: BackendSettings::from(&config),
        };
        (Arc::new(ctx), rx)
    }

    #[tokio::test]
    async fn test_update_keeps_address() {
        let (ctx, _rx) = context(Arc::default(), Duration::ZERO);
        let backend = Backend::new(endpoint("10.0.0.1:8111", Role::Replica), ctx);

        assert!(!backend.update(endpoint("10.0.0.1:8111", Role::Replica)).unwrap());
        assert!(backend.update(endpoint("10.0.0.1:8111", Role::Leader)).unwrap());
        assert!(backend.is_leader());

        let err = backend.update(endpoint("10.0.0.2:8111", Role::Leader)).unwrap_err();
        assert!(matches!(err, RouterError::AddressChanged { .. }));
        assert_eq!(backend.addr_port(), "10.0.0.1:8111".parse().unwrap());
    }

    #[tokio::test]
    async fn test_up_down_close_lifecycle() {
        let connection = Arc::new(StubConnection::default());
        let (ctx, mut rx) = context(connection.clone(), Duration::ZERO);
        let backend = Backend::new(endpoint("10.0.0.1:8111", Role::Leader), ctx);
        assert_eq!(backend.state(), BackendState::Pending);

        assert!(backend.up().await.unwrap());
        assert_eq!(backend.state(), BackendState::Active);
        assert!(backend.connection().is_some());
        // Second up is a no-op.
        assert!(!backend.up().await.unwrap());

        assert!(backend.down().await);
        assert_eq!(backend.state(), BackendState::Down);
        assert!(backend.connection().is_none());
        assert_eq!(connection.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(rx.recv().await, Some(BackendEvent::Down(_))));
        assert!(!backend.down().await);

        backend.close().await;
        assert_eq!(backend.state(), BackendState::Closed);
        assert!(!backend.up().await.unwrap());
        assert!(!backend.down().await);
        // Already down, so no second connection close.
        assert_eq!(connection.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_while_connecting_discards_connection() {
        let connection = Arc::new(StubConnection::default());
        let (ctx, _rx) = context(connection.clone(), Duration::from_millis(50));
        let backend = Backend::new(endpoint("10.0.0.1:8111", Role::Replica), ctx);

        let up = tokio::spawn({
            let backend = backend.clone();
            async move { backend.up().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        backend.close().await;

        assert!(!up.await.unwrap().unwrap());
        assert_eq!(backend.state(), BackendState::Closed);
        assert!(backend.connection().is_none());
        assert_eq!(connection.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_leader_health_check_pushes_topology() {
        let connection = Arc::new(StubConnection {
            endpoints: vec![
                RawEndpoint::new("10.0.0.1".parse().unwrap(), 8111, Role::Leader),
                RawEndpoint::new("10.0.0.2".parse().unwrap(), 8111, Role::Replica),
            ],
            ..Default::default()
        });
        let (ctx, mut rx) = context(connection, Duration::ZERO);
        let backend = Backend::new(endpoint("10.0.0.1:8111", Role::Leader), ctx);

        assert!(!backend.health_check().await, "inactive backends are unhealthy");
        backend.up().await.unwrap();
        assert!(backend.health_check().await);

        match rx.recv().await {
            Some(BackendEvent::Refresh(endpoints)) => assert_eq!(endpoints.len(), 2),
            other => panic!("expected refresh, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replica_health_check_does_not_refresh() {
        let connection = Arc::new(StubConnection {
            endpoints: vec![RawEndpoint::new("10.0.0.2".parse().unwrap(), 8111, Role::Replica)],
            ..Default::default()
        });
        let (ctx, mut rx) = context(connection, Duration::ZERO);
        let backend = Backend::new(endpoint("10.0.0.2:8111", Role::Replica), ctx);

        backend.up().await.unwrap();
        assert!(backend.health_check().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_health_tracks_errors_and_broken_transport() {
        let connection = Arc::new(StubConnection::default());
        let (ctx, _rx) = context(connection.clone(), Duration::ZERO);
        let backend = Backend::new(endpoint("10.0.0.1:8111", Role::Replica), ctx);
        backend.up().await.unwrap();
        assert!(backend.is_healthy());

        for _ in 0..4 {
            backend.record_failure();
        }
        assert!(backend.is_suspect());
        assert!(backend.is_healthy());
        backend.record_failure();
        assert!(!backend.is_healthy());

        backend.reset_errors();
        assert!(backend.is_healthy());
        connection.broken.store(true, Ordering::SeqCst);
        assert!(!backend.is_healthy());

        connection.broken.store(false, Ordering::SeqCst);
        backend.mark_unhealthy();
        assert!(!backend.is_healthy());
    }
}
