//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Backend connect management: per-worker pools, heartbeat and circuit
//! breaker.

use crate::observability::{ConnectStatistics, ConnectivitySnapshot};
use crate::pool::{ConnectFn, ConnectionPool, PoolAffinity};
use crate::reconnection::{
    ConnectivityState, HeartbeatSchedule, HeartbeatTick, SessionTracker, HEARTBEAT_FILTER,
};
use crate::service::{LifecycleDriver, NoopLifecycle, ServiceLifecycle};
use crate::transport::{
    ConnectFuture, ConnectRequest, Connector, InlineWorkers, IoWorkers, NoopHandler, Scheduler,
    SessionHandler, SessionInitializer, SessionRef, TokioScheduler, TransportError, WorkerId,
};
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Establishes, pools and monitors connections to one backend.
///
/// In thread-aligned mode (the default) every I/O worker owns its own
/// [`ConnectionPool`], created on that worker by [`start`](Self::start).
/// Otherwise a single shared pool serves every caller.
///
/// Every connect the manager issues, including pool fills, feeds a small
/// circuit breaker. The first failure marks the backend disconnected and,
/// when a recovery interval is configured, quiesces the owning service and
/// starts a heartbeat. The first success of any kind marks it connected
/// again, restarts the service and refills the pools.
///
/// # Examples
///
/// ```rust
/// use gatelink::service::ServiceConnectManager;
/// use gatelink::transport::memory::MemoryConnector;
/// use gatelink::transport::{InlineWorkers, WorkerId};
/// use std::sync::Arc;
///
/// let connector = Arc::new(MemoryConnector::new());
/// let manager = ServiceConnectManager::builder("memory://backend")
///     .connector(connector.clone())
///     .workers(Arc::new(InlineWorkers::new(2)))
///     .prepared_connections(4)
///     .build()
///     .unwrap();
///
/// manager.start();
/// assert_eq!(manager.prepared_connection_count(), 4);
///
/// // A caller on worker 0 is served from that worker's pool.
/// let future = manager.get_next_connect_future(Some(WorkerId::new(0)), None);
/// assert!(future.is_connected());
/// assert!(manager.is_service_connected());
/// ```
#[derive(Clone)]
pub struct ServiceConnectManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    uri: String,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn SessionHandler>,
    workers: Arc<dyn IoWorkers>,
    scheduler: Arc<dyn Scheduler>,
    lifecycle: Arc<dyn ServiceLifecycle>,
    driver: OnceLock<LifecycleDriver>,
    session_initializer: Option<SessionInitializer>,
    prepared_connections: usize,
    connect_timeout: Duration,
    thread_aligned: bool,
    aligned_pools: Vec<OnceLock<Arc<ConnectionPool>>>,
    shared_pool: OnceLock<Arc<ConnectionPool>>,
    heartbeat: Option<Arc<HeartbeatSchedule>>,
    tracker: Arc<SessionTracker>,
    statistics: ConnectStatistics,
    started: AtomicBool,
    me: Weak<ManagerInner>,
}

impl ServiceConnectManager {
    /// Starts building a manager for the backend at `uri`.
    pub fn builder(uri: impl Into<String>) -> ServiceConnectManagerBuilder {
        ServiceConnectManagerBuilder::new(uri)
    }

    /// Creates the pools and, when enabled, starts the heartbeat.
    ///
    /// The prepared count is spread over the workers; the first
    /// `prepared % workers` workers take one extra connection. Calling
    /// `start` on a running manager does nothing.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            backend = %inner.uri,
            prepared = inner.prepared_connections,
            aligned = inner.thread_aligned,
            "starting connect manager"
        );
        inner.driver();
        inner.tracker.set_enabled(true);

        if inner.thread_aligned {
            let count = inner.aligned_pools.len();
            let base = inner.prepared_connections / count;
            let remainder = inner.prepared_connections % count;
            for index in 0..count {
                let target = base + usize::from(index < remainder);
                inner.start_aligned_pool(WorkerId::new(index), target);
            }
        } else {
            let pool = inner.shared_pool.get_or_init(|| {
                ConnectionPool::new(
                    PoolAffinity::Shared,
                    inner.prepared_connections,
                    inner.connect_fn(None),
                )
            });
            pool.start();
        }

        // Warm sessions opened by the fill keep the heartbeat paused.
        inner.tracker.resume_heartbeat();
    }

    /// Stops every pool and the heartbeat, closing unclaimed sessions.
    ///
    /// Sessions already handed out are unaffected, and closing them later
    /// does not resume the heartbeat.
    pub fn stop(&self) {
        let inner = &self.inner;
        if !inner.started.swap(false, Ordering::AcqRel) {
            return;
        }
        info!(backend = %inner.uri, "stopping connect manager");
        inner.tracker.set_enabled(false);
        for pool in inner.pools() {
            pool.stop();
        }
        if let Some(heartbeat) = &inner.heartbeat {
            heartbeat.stop();
        }
    }

    /// Returns a connect future for a new backend session.
    ///
    /// `caller` is the worker the caller runs on, if any. A caller on a
    /// pool-owning worker is served from that worker's pool directly. Any
    /// other caller gets a relay future at once while the request runs on a
    /// randomly chosen worker; if no worker has answered within the connect
    /// timeout the relay fails with [`TransportError::Timeout`].
    ///
    /// `initializer` runs on the backend session once it exists, before the
    /// future completes.
    pub fn get_next_connect_future(
        &self,
        caller: Option<WorkerId>,
        initializer: Option<SessionInitializer>,
    ) -> ConnectFuture {
        let inner = &self.inner;
        if !inner.thread_aligned {
            return match inner.shared_pool.get() {
                Some(pool) => pool.get_next_connect_future(initializer),
                None => inner.connect(None, initializer),
            };
        }
        if let Some(pool) = caller.and_then(|worker| inner.aligned_pool(worker)) {
            return pool.get_next_connect_future(initializer);
        }

        let worker = match caller {
            Some(worker) if worker.index() < inner.aligned_pools.len() => worker,
            _ => WorkerId::new(rand::thread_rng().gen_range(0..inner.aligned_pools.len())),
        };
        inner.hand_off(worker, initializer)
    }

    /// The backend URI.
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// Number of I/O workers.
    pub fn worker_count(&self) -> usize {
        self.inner.workers.worker_count()
    }

    /// The pool owned by `worker`, once created.
    pub fn pool(&self, worker: WorkerId) -> Option<Arc<ConnectionPool>> {
        self.inner.aligned_pool(worker)
    }

    /// The shared pool, when the manager is not thread-aligned.
    pub fn shared_pool(&self) -> Option<Arc<ConnectionPool>> {
        self.inner.shared_pool.get().cloned()
    }

    /// Prepared connections across all pools.
    pub fn prepared_connection_count(&self) -> usize {
        self.inner
            .pools()
            .iter()
            .map(|pool| pool.current_prepared_count())
            .sum()
    }

    /// Returns `false` while the backend is considered unreachable.
    pub fn is_service_connected(&self) -> bool {
        self.inner.statistics.is_service_connected()
    }

    /// Returns `true` while heartbeat probes are scheduled.
    pub fn is_heartbeat_running(&self) -> bool {
        self.inner
            .heartbeat
            .as_ref()
            .is_some_and(|heartbeat| heartbeat.is_running())
    }

    /// Circuit-breaker state.
    pub fn connectivity_state(&self) -> ConnectivityState {
        ConnectivityState::from_flags(self.is_service_connected(), self.is_heartbeat_running())
    }

    /// Backend sessions currently open, excluding heartbeat probes.
    pub fn open_sessions(&self) -> usize {
        self.inner.tracker.open_sessions()
    }

    /// Live statistics.
    pub fn connect_statistics(&self) -> &ConnectStatistics {
        &self.inner.statistics
    }

    /// Snapshot of the statistics for reporting.
    pub fn statistics(&self) -> ConnectivitySnapshot {
        self.inner
            .statistics
            .snapshot(self.is_heartbeat_running(), self.prepared_connection_count())
    }
}

impl fmt::Debug for ServiceConnectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnectManager")
            .field("uri", &self.inner.uri)
            .field("workers", &self.worker_count())
            .field("prepared", &self.prepared_connection_count())
            .field("state", &self.connectivity_state())
            .finish()
    }
}

impl ManagerInner {
    fn driver(&self) -> &LifecycleDriver {
        self.driver
            .get_or_init(|| LifecycleDriver::new(self.lifecycle.clone()))
    }

    fn pools(&self) -> Vec<Arc<ConnectionPool>> {
        self.aligned_pools
            .iter()
            .chain(std::iter::once(&self.shared_pool))
            .filter_map(|pool| pool.get().cloned())
            .collect()
    }

    fn aligned_pool(&self, worker: WorkerId) -> Option<Arc<ConnectionPool>> {
        self.aligned_pools
            .get(worker.index())
            .and_then(|pool| pool.get().cloned())
    }

    fn connect_fn(&self, worker: Option<WorkerId>) -> ConnectFn {
        let me = self.me.clone();
        Arc::new(move |initializer| match me.upgrade() {
            Some(inner) => inner.connect(worker, initializer),
            None => ConnectFuture::failed(TransportError::ConnectorShuttingDown),
        })
    }

    fn start_aligned_pool(&self, worker: WorkerId, target: usize) {
        let me = self.me.clone();
        self.workers.execute(
            worker,
            Box::new(move || {
                let Some(inner) = me.upgrade() else {
                    return;
                };
                let Some(slot) = inner.aligned_pools.get(worker.index()) else {
                    return;
                };
                let pool = slot.get_or_init(|| {
                    ConnectionPool::new(
                        PoolAffinity::ThreadAligned(worker),
                        target,
                        inner.connect_fn(Some(worker)),
                    )
                });
                debug!(backend = %inner.uri, %worker, target, "starting worker pool");
                pool.start();
            }),
        );
    }

    fn restart_pools(&self) {
        for pool in self.pools() {
            if pool.is_active() {
                continue;
            }
            match pool.affinity() {
                PoolAffinity::ThreadAligned(worker) => {
                    self.workers.execute(worker, Box::new(move || pool.start()));
                }
                PoolAffinity::Shared => pool.start(),
            }
        }
    }

    fn hand_off(&self, worker: WorkerId, initializer: Option<SessionInitializer>) -> ConnectFuture {
        let relay = ConnectFuture::new();
        let timeout = self.connect_timeout;
        let expired = relay.clone();
        let uri = self.uri.clone();
        let timer = self.scheduler.schedule(
            timeout,
            Box::new(move || {
                if expired.set_error(TransportError::Timeout { duration: timeout }) {
                    warn!(
                        backend = %uri,
                        %worker,
                        ?timeout,
                        "worker did not hand off connect in time"
                    );
                }
            }),
        );
        relay.add_listener(move |_| timer.cancel());

        trace!(backend = %self.uri, %worker, "handing connect off to worker");
        let me = self.me.clone();
        let target = relay.clone();
        self.workers.execute(
            worker,
            Box::new(move || {
                let future = match me.upgrade() {
                    Some(inner) => match inner.aligned_pool(worker) {
                        Some(pool) => pool.get_next_connect_future(initializer),
                        None => inner.connect(Some(worker), initializer),
                    },
                    None => ConnectFuture::failed(TransportError::ConnectorShuttingDown),
                };
                future.forward_to(&target);
            }),
        );
        relay
    }

    fn connect(
        &self,
        worker: Option<WorkerId>,
        caller: Option<SessionInitializer>,
    ) -> ConnectFuture {
        let tracker = self.tracker.clone();
        let service = self.session_initializer.clone();
        let initializer: SessionInitializer = Arc::new(move |session: &SessionRef| {
            session
                .filter_chain()
                .add_last(HEARTBEAT_FILTER, tracker.filter());
            for initializer in service.iter().chain(caller.iter()) {
                initializer(session);
            }
        });
        let request = ConnectRequest::new(self.uri.clone(), self.handler.clone())
            .with_initializer(Some(initializer))
            .with_worker(worker);
        let future = self.connector.connect(request);

        let me = self.me.clone();
        future.add_listener(move |future| {
            let Some(inner) = me.upgrade() else {
                return;
            };
            match future.error() {
                None => inner.on_connect_succeeded(),
                Some(error) => inner.on_connect_failed(&error),
            }
        });

        // Callers may fail their future early; the transport's own future
        // keeps reporting what really happened.
        let relay = ConnectFuture::new();
        future.forward_to(&relay);
        relay
    }

    fn on_connect_succeeded(&self) {
        self.statistics.record_connect_success();
        self.on_backend_reachable();
    }

    fn on_connect_failed(&self, error: &TransportError) {
        self.statistics.record_connect_failure();
        if error.is_shutdown() {
            debug!(backend = %self.uri, "connect refused, connector shutting down");
            return;
        }
        warn!(backend = %self.uri, %error, "connect failed");
        debug!(backend = %self.uri, error = ?error, "connect failure detail");
        self.on_backend_unreachable();
    }

    fn on_backend_reachable(&self) {
        if !self.statistics.mark_connected() {
            return;
        }
        info!(backend = %self.uri, "backend reachable");
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.backoff().reset();
            self.driver().start();
            if self.tracker.open_sessions() > 0 {
                heartbeat.stop();
            }
        }
        if self.started.load(Ordering::Acquire) {
            self.restart_pools();
        }
    }

    fn on_backend_unreachable(&self) {
        if !self.statistics.mark_disconnected() {
            return;
        }
        warn!(backend = %self.uri, "backend unreachable");
        if let Some(heartbeat) = &self.heartbeat {
            self.driver().quiesce();
            if self.started.load(Ordering::Acquire) {
                heartbeat.start();
            }
        }
    }

    fn heartbeat_tick(&self, cycle: u64) {
        let Some(heartbeat) = &self.heartbeat else {
            return;
        };
        if !heartbeat.is_current(cycle) {
            return;
        }
        trace!(backend = %self.uri, cycle, "heartbeat ping");
        let future = self
            .connector
            .connect(ConnectRequest::new(self.uri.clone(), Arc::new(NoopHandler)));
        let me = self.me.clone();
        future.add_listener(move |future| {
            if let Some(inner) = me.upgrade() {
                inner.on_heartbeat_complete(cycle, future);
            }
        });
    }

    fn on_heartbeat_complete(&self, cycle: u64, future: &ConnectFuture) {
        let Some(heartbeat) = &self.heartbeat else {
            return;
        };
        match (future.session(), future.error()) {
            (Some(session), _) => {
                session.close(true);
                self.statistics.record_ping_success();
                debug!(backend = %self.uri, cycle, "heartbeat ping succeeded");
                self.on_backend_reachable();
            }
            (None, Some(error)) if error.is_shutdown() => {
                self.statistics.record_ping_failure();
                info!(backend = %self.uri, "connector shutting down, stopping heartbeat");
                if heartbeat.is_current(cycle) {
                    heartbeat.stop();
                }
                return;
            }
            (None, error) => {
                self.statistics.record_ping_failure();
                if let Some(error) = error {
                    info!(backend = %self.uri, cycle, %error, "heartbeat ping failed");
                    debug!(backend = %self.uri, error = ?error, "heartbeat failure detail");
                }
                self.on_backend_unreachable();
            }
        }
        heartbeat.reschedule(cycle);
    }
}

/// Builder for [`ServiceConnectManager`].
///
/// Only the connector is required. Defaults: one inline worker, the tokio
/// scheduler, no lifecycle hooks, no prepared connections, no heartbeat,
/// a 30 second hand-off timeout and thread-aligned pools.
pub struct ServiceConnectManagerBuilder {
    uri: String,
    connector: Option<Arc<dyn Connector>>,
    handler: Arc<dyn SessionHandler>,
    workers: Arc<dyn IoWorkers>,
    scheduler: Arc<dyn Scheduler>,
    lifecycle: Arc<dyn ServiceLifecycle>,
    session_initializer: Option<SessionInitializer>,
    prepared_connections: usize,
    recovery_interval: Duration,
    connect_timeout: Duration,
    thread_aligned: bool,
}

impl ServiceConnectManagerBuilder {
    fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connector: None,
            handler: Arc::new(NoopHandler),
            workers: Arc::new(InlineWorkers::new(1)),
            scheduler: Arc::new(TokioScheduler),
            lifecycle: Arc::new(NoopLifecycle),
            session_initializer: None,
            prepared_connections: 0,
            recovery_interval: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            thread_aligned: true,
        }
    }

    /// Sets the connector used for every backend connect.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the handler for backend sessions.
    pub fn handler(mut self, handler: Arc<dyn SessionHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Sets the I/O workers.
    pub fn workers(mut self, workers: Arc<dyn IoWorkers>) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the scheduler for heartbeats and hand-off timeouts.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the owning service's lifecycle hooks.
    pub fn lifecycle(mut self, lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Sets an initializer run on every backend session, pooled or not.
    pub fn session_initializer(mut self, initializer: SessionInitializer) -> Self {
        self.session_initializer = Some(initializer);
        self
    }

    /// Sets the number of warm connections across all workers.
    pub fn prepared_connections(mut self, count: usize) -> Self {
        self.prepared_connections = count;
        self
    }

    /// Sets the heartbeat ceiling. Zero disables the heartbeat and quiescing.
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }

    /// Sets how long an off-worker caller waits for a worker to hand off.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Chooses per-worker pools (`true`) or one shared pool (`false`).
    pub fn thread_aligned(mut self, aligned: bool) -> Self {
        self.thread_aligned = aligned;
        self
    }

    /// Builds the manager. It does nothing until started.
    pub fn build(self) -> Result<ServiceConnectManager, TransportError> {
        let connector = self.connector.ok_or_else(|| TransportError::InvalidConfiguration {
            reason: "a connector is required".to_string(),
        })?;
        if self.uri.is_empty() {
            return Err(TransportError::InvalidConfiguration {
                reason: "backend URI is empty".to_string(),
            });
        }
        let worker_count = self.workers.worker_count();
        if worker_count == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "at least one I/O worker is required".to_string(),
            });
        }

        let scheduler = self.scheduler;
        let recovery_interval = self.recovery_interval;
        let inner = Arc::new_cyclic(|me: &Weak<ManagerInner>| {
            let heartbeat = (!recovery_interval.is_zero()).then(|| {
                let weak = me.clone();
                let tick: HeartbeatTick = Arc::new(move |cycle| {
                    if let Some(inner) = weak.upgrade() {
                        inner.heartbeat_tick(cycle);
                    }
                });
                Arc::new(HeartbeatSchedule::new(scheduler.clone(), recovery_interval, tick))
            });
            let tracker = Arc::new(SessionTracker::new(heartbeat.as_ref().map(Arc::downgrade)));
            tracker.set_enabled(false);
            ManagerInner {
                uri: self.uri,
                connector,
                handler: self.handler,
                workers: self.workers,
                scheduler,
                lifecycle: self.lifecycle,
                driver: OnceLock::new(),
                session_initializer: self.session_initializer,
                prepared_connections: self.prepared_connections,
                connect_timeout: self.connect_timeout,
                thread_aligned: self.thread_aligned,
                aligned_pools: (0..worker_count).map(|_| OnceLock::new()).collect(),
                shared_pool: OnceLock::new(),
                heartbeat,
                tracker,
                statistics: ConnectStatistics::new(),
                started: AtomicBool::new(false),
                me: me.clone(),
            }
        });
        Ok(ServiceConnectManager { inner })
    }
}

impl fmt::Debug for ServiceConnectManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnectManagerBuilder")
            .field("uri", &self.uri)
            .field("workers", &self.workers.worker_count())
            .field("prepared_connections", &self.prepared_connections)
            .field("recovery_interval", &self.recovery_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("thread_aligned", &self.thread_aligned)
            .finish()
    }
}
