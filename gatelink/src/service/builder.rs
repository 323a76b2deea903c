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

//! Builder pattern for proxy services.

use crate::error::ProxyError;
use crate::observability::ProxyMetrics;
use crate::service::handler::{ProxyBridge, ProxyConnectHandler};
use crate::service::{
    NoopLifecycle, ProxyConfig, ProxyService, ProxyServiceExtension, ProxyServiceHandler,
    ServiceConnectManager, ServiceLifecycle,
};
use crate::transport::{
    Connector, InlineWorkers, IoWorkers, Scheduler, TokioScheduler, TransportError,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builder for creating and configuring proxy services.
///
/// A proxy service needs a backend URI and a [`Connector`] to reach it.
/// Everything else has a default: one inline worker, the tokio scheduler,
/// no lifecycle hooks, no extensions and [`ProxyConfig::default`].
///
/// # Examples
///
/// ```rust
/// use gatelink::service::{ConnectStrategyKind, ProxyServiceBuilder};
/// use gatelink::transport::memory::MemoryConnector;
/// use gatelink::transport::InlineWorkers;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), gatelink::ProxyError> {
/// let service = ProxyServiceBuilder::new("memory://backend")
///     .with_connector(Arc::new(MemoryConnector::new()))
///     .with_workers(Arc::new(InlineWorkers::new(2)))
///     .configure(|config| config.prepared_connection_count = 1)
///     .build()?;
///
/// // One prepared connection is raised to one per worker.
/// assert_eq!(service.strategy().kind(), ConnectStrategyKind::Prepared);
/// assert_eq!(service.strategy().connection_count(), 2);
/// # Ok(())
/// # }
/// ```
pub struct ProxyServiceBuilder {
    uri: String,
    config: ProxyConfig,
    connector: Option<Arc<dyn Connector>>,
    workers: Arc<dyn IoWorkers>,
    scheduler: Arc<dyn Scheduler>,
    lifecycle: Arc<dyn ServiceLifecycle>,
    extensions: Vec<Arc<dyn ProxyServiceExtension>>,
    thread_aligned: bool,
}

impl ProxyServiceBuilder {
    /// Creates a builder for a service proxying to `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            config: ProxyConfig::default(),
            connector: None,
            workers: Arc::new(InlineWorkers::new(1)),
            scheduler: Arc::new(TokioScheduler),
            lifecycle: Arc::new(NoopLifecycle),
            extensions: Vec::new(),
            thread_aligned: true,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Adjusts the configuration in place.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut ProxyConfig),
    {
        f(&mut self.config);
        self
    }

    /// Sets the connector used to reach the backend.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the I/O workers.
    pub fn with_workers(mut self, workers: Arc<dyn IoWorkers>) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the scheduler for heartbeats and hand-off timeouts.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the hooks used to quiesce and restart the owning service.
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Adds an extension. Extensions run in the order they were added.
    pub fn with_extension(mut self, extension: Arc<dyn ProxyServiceExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Chooses per-worker pools (`true`, the default) or one shared pool.
    pub fn thread_aligned(mut self, aligned: bool) -> Self {
        self.thread_aligned = aligned;
        self
    }

    /// Validates the configuration and assembles the service.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if the connect strategy and prepared
    /// count disagree, and [`ProxyError::Transport`] if the connector is
    /// missing or the worker set is empty.
    pub fn build(self) -> Result<ProxyService, ProxyError> {
        let connector = self.connector.ok_or_else(|| TransportError::InvalidConfiguration {
            reason: "a connector is required".to_string(),
        })?;
        let strategy = self.config.connect_strategy(self.workers.worker_count())?;
        debug!(backend = %self.uri, %strategy, "building proxy service");

        let metrics = Arc::new(ProxyMetrics::new());
        let bridge = Arc::new(ProxyBridge::new(
            self.config.maximum_pending_bytes,
            self.config.maximum_transferred_bytes,
            self.extensions,
            metrics.clone(),
        ));
        let manager = ServiceConnectManager::builder(self.uri)
            .connector(connector)
            .handler(Arc::new(ProxyConnectHandler::new(bridge.clone())))
            .workers(self.workers)
            .scheduler(self.scheduler)
            .lifecycle(self.lifecycle)
            .prepared_connections(strategy.connection_count())
            .recovery_interval(self.config.maximum_recovery_interval())
            .connect_timeout(self.config.connect_timeout())
            .thread_aligned(self.thread_aligned)
            .build()?;
        let accept_handler = Arc::new(ProxyServiceHandler::new(bridge, manager.clone(), strategy));

        Ok(ProxyService::new(
            self.config,
            strategy,
            manager,
            accept_handler,
            metrics,
        ))
    }
}

impl fmt::Debug for ProxyServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServiceBuilder")
            .field("uri", &self.uri)
            .field("config", &self.config)
            .field("workers", &self.workers.worker_count())
            .field("extensions", &self.extensions.len())
            .field("thread_aligned", &self.thread_aligned)
            .finish()
    }
}
