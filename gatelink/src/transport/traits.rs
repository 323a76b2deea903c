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

//! The session, handler and connector contract the proxy core consumes.

use crate::transport::{ConnectFuture, FilterChain, Message, SessionId, TransportError, WorkerId};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Completion of a single session write.
pub type WriteFuture = BoxFuture<'static, Result<(), TransportError>>;

/// Shared handle to a session.
pub type SessionRef = Arc<dyn Session>;

/// Callback run against a freshly created connect session before any of its
/// events are delivered.
pub type SessionInitializer = Arc<dyn Fn(&SessionRef) + Send + Sync>;

/// One end of a network connection.
///
/// Sessions are owned by the transport. The proxy core only references them:
/// it writes to them, closes them, throttles their reads, and attaches
/// filters to their chains.
///
/// # Implementations
///
/// - [`MemorySession`](crate::transport::memory::MemorySession): in-process
///   session for tests and demos
pub trait Session: Send + Sync {
    /// Returns the session's identity.
    fn id(&self) -> SessionId;

    /// Returns the I/O worker servicing this session, if it is thread-aligned.
    fn worker(&self) -> Option<WorkerId>;

    /// Schedules `message` for writing.
    ///
    /// The returned future resolves once the transport has flushed the
    /// message, which is the signal backpressure accounting waits for.
    fn write(&self, message: Message) -> WriteFuture;

    /// Closes the session. `immediately` discards queued writes.
    ///
    /// Closing is idempotent; the session's chain sees exactly one
    /// [`SessionEvent::Closed`](crate::transport::SessionEvent::Closed).
    fn close(&self, immediately: bool);

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closing(&self) -> bool;

    /// Stops delivering received messages until [`resume_read`](Self::resume_read).
    fn suspend_read(&self);

    /// Resumes delivering received messages.
    fn resume_read(&self);

    /// Returns the session's filter chain.
    fn filter_chain(&self) -> &FilterChain;
}

impl fmt::Debug for dyn Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("worker", &self.worker())
            .field("closing", &self.is_closing())
            .finish()
    }
}

/// Receives the events of a session once they have passed its filters.
///
/// Every method has an empty default so handlers override only what they
/// care about. Handlers run on the session's I/O worker and must not block.
pub trait SessionHandler: Send + Sync {
    /// The session was created; no I/O has happened yet.
    fn session_created(&self, _session: &SessionRef) {}

    /// The session is open and ready for I/O.
    fn session_opened(&self, _session: &SessionRef) {}

    /// A message arrived on the session.
    fn message_received(&self, _session: &SessionRef, _message: Message) {}

    /// A message written to the session was flushed.
    fn message_sent(&self, _session: &SessionRef, _message: Message) {}

    /// The session has been idle for the transport's idle period.
    fn session_idle(&self, _session: &SessionRef) {}

    /// The session closed.
    fn session_closed(&self, _session: &SessionRef) {}

    /// The transport reported an error on the session.
    fn exception_caught(&self, _session: &SessionRef, _error: &TransportError) {}
}

/// A handler that ignores every event.
///
/// Heartbeat probes connect with this handler since the resulting session is
/// closed as soon as it exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl SessionHandler for NoopHandler {}

/// Parameters of one connect attempt.
#[derive(Clone)]
pub struct ConnectRequest {
    /// Backend address to connect to
    pub uri: String,
    /// Handler that will receive the new session's events
    pub handler: Arc<dyn SessionHandler>,
    /// Runs against the new session before its first event
    pub initializer: Option<SessionInitializer>,
    /// Worker the new session should be aligned to
    pub worker: Option<WorkerId>,
}

impl ConnectRequest {
    /// Creates a request for `uri` whose session events go to `handler`.
    pub fn new(uri: impl Into<String>, handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            uri: uri.into(),
            handler,
            initializer: None,
            worker: None,
        }
    }

    /// Sets the session initializer.
    pub fn with_initializer(mut self, initializer: Option<SessionInitializer>) -> Self {
        self.initializer = initializer;
        self
    }

    /// Aligns the new session to `worker`.
    pub fn with_worker(mut self, worker: Option<WorkerId>) -> Self {
        self.worker = worker;
        self
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("uri", &self.uri)
            .field("initializer", &self.initializer.is_some())
            .field("worker", &self.worker)
            .finish()
    }
}

/// Establishes outbound sessions.
///
/// A connector returns immediately with a [`ConnectFuture`]. Implementations
/// must run the request's initializer before the new session's
/// `session_created` event, and must complete the future after the session's
/// handler has seen `session_opened`.
pub trait Connector: Send + Sync {
    /// Starts a connect attempt.
    fn connect(&self, request: ConnectRequest) -> ConnectFuture;
}
