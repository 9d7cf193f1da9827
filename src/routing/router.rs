//! Endpoint router.
//!
//! # Responsibilities
//! - Discover the cluster from the configured seeds
//! - Reconcile reported endpoint sets against the live backends
//! - Block callers until enough routes are up
//! - Hand out connections without blocking on I/O
//!
//! # Design Decisions
//! - Lock order is router, then backend. Backends never touch the router
//!   lock; they report through the event channel instead
//! - The router mutex is never held across an await
//! - Every up/down transition wakes all `wait_for_routes` callers

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{self, Instant};

use crate::cluster::connection::{ConnectionFactory, SharedConnection};
use crate::cluster::endpoint::{EndpointSet, Role, ServiceEndpoint};
use crate::cluster::resolver::{Resolver, SystemResolver};
use crate::config::RouterConfig;
use crate::lifecycle::Background;
use crate::load_balancer::backend::{Backend, BackendContext, BackendEvent, BackendSettings};
use crate::load_balancer::{BackendPool, RandomSelector, Selector};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::routing::error::{RouterError, RouterResult};

struct RouterState {
    pool: BackendPool,
    /// Backends still connecting, keyed by address.
    pending: HashMap<SocketAddr, Arc<Backend>>,
    closed: bool,
}

impl RouterState {
    fn counts(&self) -> (usize, usize) {
        (self.pool.len(), self.pool.count(Role::Leader))
    }
}

struct RouterInner {
    config: RouterConfig,
    ctx: Arc<BackendContext>,
    selector: Box<dyn Selector>,
    state: Mutex<RouterState>,
    route_change: Notify,
    last_applied: ArcSwap<EndpointSet>,
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        // Health monitors hold their backends, which hold the runner.
        self.ctx.background.shutdown();
    }
}

/// Routes requests across the nodes of one cluster.
///
/// Cheap to clone; all clones share the same backends.
#[derive(Clone)]
pub struct EndpointRouter {
    inner: Arc<RouterInner>,
}

impl EndpointRouter {
    /// Router using system DNS and random selection.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RouterConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::with_parts(
            config,
            factory,
            Arc::new(SystemResolver),
            Box::new(RandomSelector::new()),
        )
    }

    /// Router with explicit collaborators; see [`new`](Self::new).
    pub fn with_parts(
        config: RouterConfig,
        factory: Arc<dyn ConnectionFactory>,
        resolver: Arc<dyn Resolver>,
        selector: Box<dyn Selector>,
    ) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(BackendContext {
            factory,
            resolver,
            background: Arc::new(Background::new()),
            events,
            settings: BackendSettings::from(&config),
        });

        let inner = Arc::new(RouterInner {
            config,
            ctx: ctx.clone(),
            selector,
            state: Mutex::new(RouterState {
                pool: BackendPool::new(),
                pending: HashMap::new(),
                closed: false,
            }),
            route_change: Notify::new(),
            last_applied: ArcSwap::from_pointee(EndpointSet::new()),
        });

        ctx.background.spawn(event_loop(Arc::downgrade(&inner), rx));
        Self { inner }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.inner.state()
    }

    /// Discover the cluster from the seeds and apply what it reports.
    pub async fn bootstrap(&self) -> RouterResult<()> {
        if self.is_closed() {
            return Err(RouterError::Closed);
        }

        match self.bootstrap_endpoints().await {
            Ok(Some(endpoints)) => {
                metrics::record_bootstrap("ok");
                self.update(endpoints).await;
                Ok(())
            }
            Ok(None) => {
                metrics::record_bootstrap("no_route");
                let seeds: Vec<String> = self.inner.config.seeds.iter().map(ToString::to_string).collect();
                Err(RouterError::NoRoute(format!(
                    "failed to configure cluster endpoints from [{}]",
                    seeds.join(", ")
                )))
            }
            Err(e) => {
                metrics::record_bootstrap("auth_error");
                Err(e)
            }
        }
    }

    /// Run a bootstrap on the background runner.
    pub fn bootstrap_async(&self) {
        let router = self.clone();
        self.inner.ctx.background.spawn(async move {
            if let Err(e) = router.bootstrap().await {
                tracing::error!(error = %e, "Background bootstrap failed");
            }
        });
    }

    async fn bootstrap_endpoints(&self) -> RouterResult<Option<EndpointSet>> {
        let ctx = &self.inner.ctx;
        for seed in &self.inner.config.seeds {
            let mut addrs = ctx.resolver.resolve(&seed.host, seed.port).await;
            tracing::debug!(seed = %seed, addrs = ?addrs, "Resolved discovery seed");
            addrs.shuffle(&mut rand::thread_rng());

            if let Some(endpoints) = self.endpoints_from_seeds(&addrs).await? {
                return Ok(Some(endpoints));
            }
        }
        Ok(None)
    }

    /// Ask each address in turn; the first non-empty answer wins.
    async fn endpoints_from_seeds(&self, addrs: &[SocketAddr]) -> RouterResult<Option<EndpointSet>> {
        let ctx = &self.inner.ctx;
        let connect_timeout = ctx.settings.connect_timeout;

        for &addr in addrs {
            let connection = match with_timeout(connect_timeout, ctx.factory.connect(addr)).await {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::info!(addr = %addr, error = %e, "Could not connect to seed");
                    continue;
                }
            };

            let listed = with_timeout(ctx.settings.health_timeout, connection.list_endpoints()).await;
            connection.close().await;

            match listed {
                Ok(raw) if !raw.is_empty() => {
                    let endpoints = ServiceEndpoint::from_endpoints(raw, ctx.resolver.as_ref()).await;
                    if !endpoints.is_empty() {
                        return Ok(Some(endpoints));
                    }
                    tracing::info!(addr = %addr, "Seed reported no resolvable endpoints");
                }
                Ok(_) => tracing::info!(addr = %addr, "Seed reported no endpoints"),
                Err(e) if e.is_auth_error() => {
                    tracing::warn!(addr = %addr, error = %e, "Authentication failed while discovering cluster");
                    return Err(RouterError::Auth(e));
                }
                Err(e) => {
                    tracing::info!(addr = %addr, error = %e, "Failed to retrieve endpoints from seed");
                }
            }
        }
        Ok(None)
    }

    /// Reconcile the live backends with `endpoints`.
    ///
    /// New backends come up in the background; removed ones are closed with
    /// a bounded wait before this returns.
    pub async fn update(&self, endpoints: EndpointSet) {
        if **self.inner.last_applied.load() == endpoints {
            tracing::trace!("Endpoint set unchanged; skipping update");
            return;
        }

        let closing = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            for endpoint in &endpoints {
                self.reconcile(&mut state, endpoint.clone());
            }
            let closing = self.purge(&mut state, &endpoints);
            self.inner.last_applied.store(Arc::new(endpoints));
            closing
        };

        self.await_closes(closing, "purge").await;
        self.inner.route_change.notify_waiters();
        tracing::debug!(backends = ?self.route_counts(), "Applied endpoint update");
    }

    /// Run an update on the background runner.
    pub fn update_async(&self, endpoints: EndpointSet) {
        let router = self.clone();
        self.inner
            .ctx
            .background
            .spawn(async move { router.update(endpoints).await });
    }

    fn reconcile(&self, state: &mut RouterState, endpoint: ServiceEndpoint) {
        let addr = endpoint.addr_port();
        let role = endpoint.role;

        if let Some(backend) = state.pool.get(role, addr) {
            apply_endpoint(backend, endpoint);
            return;
        }

        if let Some((from, backend)) = state.pool.take_from_other_role(addr, role) {
            tracing::debug!(backend = %backend, from = %from, to = %role, "Moving backend to new role");
            apply_endpoint(&backend, endpoint);
            state.pool.insert(role, backend);
            return;
        }

        if let Some(backend) = state.pending.get(&addr) {
            apply_endpoint(backend, endpoint);
            return;
        }

        self.create_backend(state, endpoint);
    }

    fn create_backend(&self, state: &mut RouterState, endpoint: ServiceEndpoint) {
        let backend = Backend::new(endpoint, self.inner.ctx.clone());
        tracing::debug!(backend = %backend, "Creating backend");
        state.pending.insert(backend.addr_port(), backend.clone());

        let router = self.clone();
        self.inner
            .ctx
            .background
            .spawn(async move { router.bring_up(backend).await });
    }

    async fn bring_up(&self, backend: Arc<Backend>) {
        let result = backend.up().await;

        let registered = {
            let mut state = self.state();
            let addr = backend.addr_port();
            let still_wanted = state
                .pending
                .get(&addr)
                .is_some_and(|pending| Arc::ptr_eq(pending, &backend));
            if still_wanted {
                state.pending.remove(&addr);
            }

            match &result {
                Ok(true) if still_wanted && !state.closed && backend.is_active() => {
                    if let Some(old) = state.pool.insert(backend.role(), backend.clone()) {
                        if !Arc::ptr_eq(&old, &backend) {
                            self.close_later(old);
                        }
                    }
                    let (healthy, leaders) = state.counts();
                    metrics::record_routes(healthy, leaders);
                    true
                }
                Err(_) if still_wanted => {
                    // Let the next identical endpoint list retry this node.
                    self.inner.last_applied.store(Arc::new(EndpointSet::new()));
                    false
                }
                _ => false,
            }
        };

        match result {
            Ok(true) if registered => {
                tracing::debug!(backend = %backend, "Backend is up");
                self.inner.route_change.notify_waiters();
            }
            Ok(true) => {
                tracing::debug!(backend = %backend, "Backend no longer wanted; closing");
                backend.close().await;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::info!(backend = %backend, error = %e, "Failed to bring backend up");
                backend.close().await;
            }
        }
    }

    /// Detach every backend whose address left the set; returns close signals.
    fn purge(&self, state: &mut RouterState, endpoints: &EndpointSet) -> Vec<oneshot::Receiver<()>> {
        let keep: HashSet<SocketAddr> = endpoints.iter().map(ServiceEndpoint::addr_port).collect();

        let mut retired = state.pool.remove_missing(&keep);
        state.pending.retain(|addr, backend| {
            let kept = keep.contains(addr);
            if !kept {
                retired.push(backend.clone());
            }
            kept
        });

        retired
            .into_iter()
            .filter_map(|backend| {
                tracing::debug!(backend = %backend, "Removing backend");
                self.close_later(backend)
            })
            .collect()
    }

    fn close_later(&self, backend: Arc<Backend>) -> Option<oneshot::Receiver<()>> {
        self.inner
            .ctx
            .background
            .submit(async move { backend.close().await })
    }

    async fn await_closes(&self, closing: Vec<oneshot::Receiver<()>>, what: &'static str) {
        if closing.is_empty() {
            return;
        }
        let count = closing.len();
        let limit = self.inner.config.timeouts.close();
        if time::timeout(limit, join_all(closing)).await.is_err() {
            tracing::warn!(what, count, timeout = ?limit, "Backend closes still running; abandoning wait");
        }
    }

    fn backend_down(&self, backend: &Arc<Backend>) {
        let removed = {
            let mut state = self.state();
            let removed = state.pool.remove(backend);
            if removed {
                let (healthy, leaders) = state.counts();
                metrics::record_routes(healthy, leaders);
            }
            removed
        };

        if removed {
            // The next identical endpoint list must re-create this node.
            self.inner.last_applied.store(Arc::new(EndpointSet::new()));
            tracing::debug!(backend = %backend, "Backend is down");
        }
        self.inner.route_change.notify_waiters();
    }

    /// Wait until at least `min_healthy` backends and `min_leaders` leaders
    /// are live. Thresholds below 1 impose no requirement.
    ///
    /// A timeout too large to form a deadline (e.g. `Duration::MAX`) waits
    /// without limit.
    pub async fn wait_for_routes(
        &self,
        min_healthy: usize,
        min_leaders: usize,
        timeout: Duration,
    ) -> RouterResult<()> {
        let deadline = Instant::now().checked_add(timeout);
        let satisfied = |(healthy, leaders): (usize, usize)| {
            healthy >= min_healthy && leaders >= min_leaders
        };

        loop {
            let mut notified = pin!(self.inner.route_change.notified());
            notified.as_mut().enable();

            {
                let state = self.state();
                if state.closed {
                    return Err(RouterError::Closed);
                }
                if satisfied(state.counts()) {
                    return Ok(());
                }
            }

            let Some(deadline) = deadline else {
                notified.await;
                continue;
            };
            if time::timeout_at(deadline, notified).await.is_err() {
                let (healthy, leaders) = self.route_counts();
                if satisfied((healthy, leaders)) {
                    return Ok(());
                }
                return Err(RouterError::NotEnoughRoutes {
                    timeout,
                    min_healthy,
                    min_leaders,
                    healthy,
                    leaders,
                });
            }
        }
    }

    /// [`wait_for_routes`](Self::wait_for_routes) with the configured defaults.
    pub async fn wait_for_default_routes(&self) -> RouterResult<()> {
        let routes = &self.inner.config.routes;
        self.wait_for_routes(routes.min_healthy, routes.min_leaders, routes.wait_timeout())
            .await
    }

    /// A leader connection other than `previous` when one exists.
    pub fn next_leader(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection> {
        self.next(Some(Role::Leader), previous)
    }

    /// Any live connection other than `previous` when one exists.
    pub fn next_any(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection> {
        self.next(None, previous)
    }

    fn next(&self, role: Option<Role>, previous: Option<&SharedConnection>) -> Option<SharedConnection> {
        let candidates = {
            let state = self.state();
            if state.closed {
                return None;
            }
            state.pool.connections(role)
        };
        self.inner.selector.select(previous, &candidates)
    }

    /// Live backend count and live leader count.
    pub fn route_counts(&self) -> (usize, usize) {
        self.state().counts()
    }

    /// Snapshot of the live backends.
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.state().pool.all()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Close every backend and stop all background work. Idempotent.
    pub async fn close(&self) {
        let retired = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
            let mut retired = state.pool.all();
            retired.extend(state.pending.drain().map(|(_, backend)| backend));
            state.pool.clear();
            retired
        };

        tracing::debug!(backends = retired.len(), "Closing router");
        let closing = retired
            .into_iter()
            .filter_map(|backend| self.close_later(backend))
            .collect();
        self.await_closes(closing, "shutdown").await;

        metrics::record_routes(0, 0);
        self.inner.route_change.notify_waiters();
        self.inner.ctx.background.shutdown();
    }
}

impl RouterInner {
    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().expect("router state poisoned")
    }
}

fn apply_endpoint(backend: &Arc<Backend>, endpoint: ServiceEndpoint) {
    if let Err(e) = backend.update(endpoint) {
        tracing::error!(backend = %backend, error = %e, "Endpoint reconciliation bug");
    }
}

/// Applies backend events for as long as the router exists.
async fn event_loop(weak: Weak<RouterInner>, mut rx: mpsc::UnboundedReceiver<BackendEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let router = EndpointRouter { inner };

        match event {
            BackendEvent::Down(backend) => router.backend_down(&backend),
            BackendEvent::Refresh(endpoints) => router.update_async(endpoints),
            BackendEvent::LeaderLost(backend) => {
                tracing::debug!(backend = %backend, "Rediscovering cluster after leader loss");
                router.bootstrap_async();
            }
        }
    }
}

impl std::fmt::Debug for EndpointRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (healthy, leaders) = self.route_counts();
        f.debug_struct("EndpointRouter")
            .field("seeds", &self.inner.config.seeds)
            .field("healthy", &healthy)
            .field("leaders", &leaders)
            .finish()
    }
}
