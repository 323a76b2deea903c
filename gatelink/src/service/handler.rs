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

//! Bridging shared by both sides of a proxied connection, and the handler
//! for backend sessions.

use crate::observability::ProxyMetrics;
use crate::service::{
    AttachedSessionManager, ContextRegistry, Delivery, Detached, ProxyServiceExtension,
};
use crate::transport::{Message, Session, SessionHandler, SessionRef, TransportError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// State shared by the accept and connect handlers of one proxy service.
pub(crate) struct ProxyBridge {
    pub(crate) registry: ContextRegistry,
    pub(crate) maximum_pending_bytes: u64,
    pub(crate) maximum_transferred_bytes: i64,
    pub(crate) extensions: Vec<Arc<dyn ProxyServiceExtension>>,
    pub(crate) metrics: Arc<ProxyMetrics>,
}

impl ProxyBridge {
    pub(crate) fn new(
        maximum_pending_bytes: u64,
        maximum_transferred_bytes: i64,
        extensions: Vec<Arc<dyn ProxyServiceExtension>>,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        Self {
            registry: ContextRegistry::new(),
            maximum_pending_bytes,
            maximum_transferred_bytes,
            extensions,
            metrics,
        }
    }

    /// Routes a received message through the session's context.
    pub(crate) fn forward(&self, session: &SessionRef, message: Message) {
        if session.is_closing() {
            return;
        }
        let context = self.registry.get_or_create(session.id());
        if context.forward_or_queue(message) == Delivery::Queued {
            trace!(session = %session.id(), "queued message until attached");
            self.metrics.record_queued();
        }
    }

    /// Drops the session's context and returns what it referenced.
    pub(crate) fn detach(&self, session: &SessionRef) -> Option<Detached> {
        self.registry
            .remove(session.id())
            .map(|context| context.detach())
    }

    /// Bridges `accept` and `connect` in both directions.
    ///
    /// Returns `false` if either side closed first, in which case the other
    /// side has been closed too.
    pub(crate) fn attach(&self, accept: &SessionRef, connect: &SessionRef) -> bool {
        let Some(accept_context) = self.registry.get(accept.id()) else {
            connect.close(true);
            return false;
        };
        // The connect initializer registers the backend; a missing context
        // means its close already ran.
        let Some(connect_context) = self.registry.get(connect.id()) else {
            debug!(accept = %accept.id(), connect = %connect.id(), "backend gone before attach");
            accept.close(false);
            return false;
        };

        let upstream = AttachedSessionManager::new(
            accept.clone(),
            connect.clone(),
            self.maximum_pending_bytes,
            self.maximum_transferred_bytes,
            self.metrics.clone(),
        );
        let downstream = AttachedSessionManager::new(
            connect.clone(),
            accept.clone(),
            self.maximum_pending_bytes,
            self.maximum_transferred_bytes,
            self.metrics.clone(),
        );

        if !connect_context.attach(downstream) {
            debug!(accept = %accept.id(), connect = %connect.id(), "backend closed before attach");
            accept.close(false);
            return false;
        }
        if !accept_context.attach(upstream) {
            debug!(accept = %accept.id(), connect = %connect.id(), "client closed before attach");
            connect.close(true);
            return false;
        }
        self.metrics.record_pair_attached();
        debug!(accept = %accept.id(), connect = %connect.id(), "sessions bridged");
        true
    }
}

impl fmt::Debug for ProxyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyBridge")
            .field("contexts", &self.registry.len())
            .field("maximum_pending_bytes", &self.maximum_pending_bytes)
            .field("maximum_transferred_bytes", &self.maximum_transferred_bytes)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Handler for backend sessions.
///
/// Forwards backend messages to the bridged client, queueing any that
/// arrive before the pair is attached, and closes the client when the
/// backend goes away.
#[derive(Debug)]
pub struct ProxyConnectHandler {
    bridge: Arc<ProxyBridge>,
}

impl ProxyConnectHandler {
    pub(crate) fn new(bridge: Arc<ProxyBridge>) -> Self {
        Self { bridge }
    }
}

impl SessionHandler for ProxyConnectHandler {
    fn message_received(&self, session: &SessionRef, message: Message) {
        self.bridge.forward(session, message);
    }

    fn session_closed(&self, session: &SessionRef) {
        let Some(detached) = self.bridge.detach(session) else {
            return;
        };
        if let Some(manager) = detached.attached {
            let accept = manager.destination();
            debug!(
                connect = %session.id(),
                accept = %accept.id(),
                "backend closed, closing client"
            );
            accept.close(true);
        }
    }

    fn exception_caught(&self, session: &SessionRef, error: &TransportError) {
        warn!(connect = %session.id(), %error, "backend session error, closing");
        session.close(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemorySession;
    use crate::transport::NoopHandler;

    fn bridge() -> ProxyBridge {
        ProxyBridge::new(64_000, -1, Vec::new(), Arc::new(ProxyMetrics::new()))
    }

    #[test]
    fn test_attach_bridges_registered_sessions() {
        let bridge = bridge();
        let accept: SessionRef = MemorySession::new(None, Arc::new(NoopHandler));
        let connect: SessionRef = MemorySession::new(None, Arc::new(NoopHandler));
        bridge.registry.get_or_create(accept.id());
        bridge.registry.get_or_create(connect.id());

        assert!(bridge.attach(&accept, &connect));
        assert!(bridge.registry.get(accept.id()).and_then(|c| c.attached()).is_some());
        assert!(bridge.registry.get(connect.id()).and_then(|c| c.attached()).is_some());
        assert_eq!(bridge.metrics.active_pairs(), 1);
    }

    #[test]
    fn test_attach_after_backend_detached_closes_client() {
        let bridge = bridge();
        let accept = MemorySession::new(None, Arc::new(NoopHandler));
        let connect = MemorySession::new(None, Arc::new(NoopHandler));
        let accept_ref: SessionRef = accept.clone();
        let connect_ref: SessionRef = connect.clone();
        bridge.registry.get_or_create(accept.id());
        bridge.registry.get_or_create(connect.id());

        // The backend's close handler ran between the close check and attach.
        assert!(bridge.detach(&connect_ref).is_some());

        assert!(!bridge.attach(&accept_ref, &connect_ref));
        assert!(accept.is_closed());
        assert!(!accept.was_closed_immediately());
        assert!(bridge.registry.get(connect.id()).is_none());
        assert!(bridge.registry.get(accept.id()).and_then(|c| c.attached()).is_none());
    }
}
