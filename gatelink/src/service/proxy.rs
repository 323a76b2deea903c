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

//! The assembled proxy service.

use crate::observability::{ConnectivitySnapshot, ProxyMetrics};
use crate::service::{ProxyConfig, ProxyConnectStrategy, ProxyServiceHandler, ServiceConnectManager};
use crate::transport::SessionHandler;
use std::fmt;
use std::sync::Arc;

/// A proxy from client sessions to one backend.
///
/// Hand [`accept_handler`](Self::accept_handler) to whatever accepts client
/// sessions; every client session it sees is bridged to a backend session
/// obtained through [`connect_manager`](Self::connect_manager).
///
/// # Examples
///
/// ```rust
/// use gatelink::service::ProxyServiceBuilder;
/// use gatelink::transport::memory::{MemoryConnector, MemorySession};
/// use gatelink::transport::{Session, WorkerId};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), gatelink::ProxyError> {
/// let backend = Arc::new(MemoryConnector::new());
/// let service = ProxyServiceBuilder::new("memory://backend")
///     .with_connector(backend.clone())
///     .build()?;
/// service.start();
///
/// let client = MemorySession::new(Some(WorkerId::new(0)), service.accept_handler());
/// client.open();
/// client.receive(&b"ping"[..]);
///
/// let sessions = backend.sessions();
/// assert_eq!(sessions.len(), 1);
/// assert_eq!(sessions[0].written(), vec![&b"ping"[..]]);
///
/// client.close(false);
/// assert!(sessions[0].is_closed());
/// # Ok(())
/// # }
/// ```
pub struct ProxyService {
    config: ProxyConfig,
    strategy: ProxyConnectStrategy,
    manager: ServiceConnectManager,
    accept_handler: Arc<ProxyServiceHandler>,
    metrics: Arc<ProxyMetrics>,
}

impl ProxyService {
    pub(crate) fn new(
        config: ProxyConfig,
        strategy: ProxyConnectStrategy,
        manager: ServiceConnectManager,
        accept_handler: Arc<ProxyServiceHandler>,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        Self {
            config,
            strategy,
            manager,
            accept_handler,
            metrics,
        }
    }

    /// Starts the backend pools and heartbeat.
    pub fn start(&self) {
        self.manager.start();
    }

    /// Stops the backend pools and heartbeat. Bridged pairs stay up.
    pub fn stop(&self) {
        self.manager.stop();
    }

    /// Handler for client sessions.
    pub fn accept_handler(&self) -> Arc<dyn SessionHandler> {
        self.accept_handler.clone()
    }

    /// The concrete client-session handler.
    pub fn proxy_handler(&self) -> &Arc<ProxyServiceHandler> {
        &self.accept_handler
    }

    /// The backend connect manager.
    pub fn connect_manager(&self) -> &ServiceConnectManager {
        &self.manager
    }

    /// The resolved connect strategy.
    pub fn strategy(&self) -> ProxyConnectStrategy {
        self.strategy
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Backend connectivity statistics.
    pub fn statistics(&self) -> ConnectivitySnapshot {
        self.manager.statistics()
    }

    /// Bridge traffic counters.
    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }
}

impl fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyService")
            .field("backend", &self.manager.uri())
            .field("strategy", &self.strategy)
            .field("state", &self.manager.connectivity_state())
            .finish()
    }
}
