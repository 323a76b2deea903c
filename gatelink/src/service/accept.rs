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

//! Accept-side orchestration.

use crate::service::handler::ProxyBridge;
use crate::service::{
    DeferredConnectStrategyFilter, ProxyConnectStrategy, ServiceConnectManager,
    DEFERRED_CONNECT_FILTER,
};
use crate::transport::{
    ConnectFuture, Message, Session, SessionHandler, SessionInitializer, SessionRef,
    TransportError,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handler for client sessions of a proxy service.
///
/// For every client session it:
///
/// 1. runs the extensions' `init_accept_session` hook on creation and, for
///    the deferred strategy, holds back `Opened` until traffic is seen
/// 2. on `Opened`, asks the connect manager for a backend session; the
///    extensions' `init_connect_session` hook runs as soon as that session
///    exists
/// 3. once connected, runs `proxied_connection_established` and bridges the
///    two sessions, flushing anything either side sent in the meantime
///
/// A failed backend connect closes the client. A client that closes first
/// fails the pending connect with [`TransportError::AcceptClosed`], and the
/// backend session is closed as soon as it arrives.
pub struct ProxyServiceHandler {
    bridge: Arc<ProxyBridge>,
    manager: ServiceConnectManager,
    strategy: ProxyConnectStrategy,
}

impl ProxyServiceHandler {
    pub(crate) fn new(
        bridge: Arc<ProxyBridge>,
        manager: ServiceConnectManager,
        strategy: ProxyConnectStrategy,
    ) -> Self {
        Self {
            bridge,
            manager,
            strategy,
        }
    }

    /// The connect strategy in effect.
    pub fn strategy(&self) -> ProxyConnectStrategy {
        self.strategy
    }

    /// Number of client and backend sessions with live proxy state.
    pub fn live_contexts(&self) -> usize {
        self.bridge.registry.len()
    }

    fn connect_initializer(&self) -> SessionInitializer {
        let bridge = self.bridge.clone();
        Arc::new(move |connect: &SessionRef| {
            bridge.registry.get_or_create(connect.id());
            for extension in &bridge.extensions {
                extension.init_connect_session(connect);
            }
        })
    }
}

fn on_connect_complete(bridge: &ProxyBridge, accept: &SessionRef, future: &ConnectFuture) {
    let Some(connect) = future.session() else {
        if accept.is_closing() {
            return;
        }
        if let Some(error) = future.error() {
            info!(accept = %accept.id(), %error, "backend connect failed, closing client");
            debug!(accept = %accept.id(), error = ?error, "backend connect failure detail");
        }
        accept.close(false);
        return;
    };

    if accept.is_closing() {
        debug!(
            accept = %accept.id(),
            connect = %connect.id(),
            "client closed before backend connected"
        );
        connect.close(true);
        return;
    }
    if connect.is_closing() {
        debug!(accept = %accept.id(), connect = %connect.id(), "backend closed before bridging");
        accept.close(false);
        return;
    }

    for extension in &bridge.extensions {
        extension.proxied_connection_established(accept, &connect);
    }
    bridge.attach(accept, &connect);
}

impl SessionHandler for ProxyServiceHandler {
    fn session_created(&self, session: &SessionRef) {
        self.bridge.registry.get_or_create(session.id());
        for extension in &self.bridge.extensions {
            extension.init_accept_session(session);
        }
        if self.strategy.is_deferred() {
            session.filter_chain().add_last(
                DEFERRED_CONNECT_FILTER,
                Arc::new(DeferredConnectStrategyFilter::new()),
            );
        }
    }

    fn session_opened(&self, session: &SessionRef) {
        if session.is_closing() {
            return;
        }
        let context = self.bridge.registry.get_or_create(session.id());
        if context.connect_future().is_some() {
            return;
        }

        let future = self
            .manager
            .get_next_connect_future(session.worker(), Some(self.connect_initializer()));
        context.set_connect_future(future.clone());

        let bridge = self.bridge.clone();
        let accept = session.clone();
        future.add_listener(move |future| on_connect_complete(&bridge, &accept, future));
    }

    fn message_received(&self, session: &SessionRef, message: Message) {
        self.bridge.forward(session, message);
    }

    fn session_closed(&self, session: &SessionRef) {
        let Some(detached) = self.bridge.detach(session) else {
            return;
        };
        if let Some(future) = &detached.connect_future {
            if future.set_error(TransportError::AcceptClosed) {
                debug!(accept = %session.id(), "failing connect future because accept is closed");
            }
        }

        let connect = match &detached.attached {
            Some(manager) => {
                self.bridge.metrics.record_pair_detached();
                Some(manager.destination().clone())
            }
            None => detached.connect_future.as_ref().and_then(ConnectFuture::session),
        };
        if let Some(connect) = connect {
            debug!(
                accept = %session.id(),
                connect = %connect.id(),
                "client closed, closing backend"
            );
            connect.close(true);
        }
    }

    fn exception_caught(&self, session: &SessionRef, error: &TransportError) {
        warn!(accept = %session.id(), %error, "client session error, closing");
        session.close(true);
    }
}

impl fmt::Debug for ProxyServiceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServiceHandler")
            .field("strategy", &self.strategy)
            .field("backend", &self.manager.uri())
            .field("contexts", &self.bridge.registry.len())
            .finish()
    }
}
