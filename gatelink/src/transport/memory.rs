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

//! In-memory sessions and connector.
//!
//! These types implement the transport contract without any network I/O.
//! They are deterministic: events fire synchronously on the calling thread,
//! write completion can be held back and released on demand, and every
//! suspend, resume and close is recorded. This makes them the backbone of
//! the crate's own tests, and useful for exercising a proxy service
//! in-process.
//!
//! # Examples
//!
//! ```rust
//! use gatelink::transport::memory::{ConnectMode, MemoryConnector};
//! use gatelink::transport::{ConnectRequest, Connector, NoopHandler};
//! use std::sync::Arc;
//!
//! let connector = MemoryConnector::new();
//! let future = connector.connect(ConnectRequest::new("memory://backend", Arc::new(NoopHandler)));
//! assert!(future.is_connected());
//!
//! connector.set_mode(ConnectMode::Refuse);
//! let future = connector.connect(ConnectRequest::new("memory://backend", Arc::new(NoopHandler)));
//! assert!(future.error().is_some());
//! assert_eq!(connector.attempts(), 2);
//! ```

use crate::transport::{
    ConnectFuture, ConnectRequest, Connector, FilterChain, Message, Session, SessionEvent,
    SessionHandler, SessionId, SessionRef, TransportError, WorkerId, WriteFuture,
};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::trace;

/// Global counter for generating unique session IDs.
static NEXT_MEMORY_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// An in-process session.
pub struct MemorySession {
    id: SessionId,
    worker: Option<WorkerId>,
    chain: FilterChain,
    me: Weak<MemorySession>,
    closing: AtomicBool,
    closed_immediately: AtomicBool,
    read_suspended: AtomicBool,
    suspend_calls: AtomicUsize,
    resume_calls: AtomicUsize,
    hold_writes: AtomicBool,
    written: Mutex<Vec<Message>>,
    held: Mutex<VecDeque<oneshot::Sender<Result<(), TransportError>>>>,
}

impl MemorySession {
    /// Creates a session whose events go to `handler`.
    ///
    /// No events fire until [`open`](Self::open) is called.
    pub fn new(worker: Option<WorkerId>, handler: Arc<dyn SessionHandler>) -> Arc<Self> {
        let id = SessionId::new(NEXT_MEMORY_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        Arc::new_cyclic(|me| Self {
            id,
            worker,
            chain: FilterChain::new(handler),
            me: me.clone(),
            closing: AtomicBool::new(false),
            closed_immediately: AtomicBool::new(false),
            read_suspended: AtomicBool::new(false),
            suspend_calls: AtomicUsize::new(0),
            resume_calls: AtomicUsize::new(0),
            hold_writes: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
            held: Mutex::new(VecDeque::new()),
        })
    }

    fn as_session(&self) -> Option<SessionRef> {
        self.me.upgrade().map(|session| session as SessionRef)
    }

    fn fire(&self, event: SessionEvent) {
        if let Some(session) = self.as_session() {
            self.chain.fire(&session, event);
        }
    }

    /// Fires `Created` then `Opened`, as a transport does for a new session.
    pub fn open(&self) {
        self.fire(SessionEvent::Created);
        self.fire(SessionEvent::Opened);
    }

    /// Delivers `message` as if it had arrived from the peer.
    ///
    /// Ignored once the session is closing.
    pub fn receive(&self, message: impl Into<Message>) {
        if !self.is_closing() {
            self.fire(SessionEvent::MessageReceived(message.into()));
        }
    }

    /// Fires an `Idle` event.
    pub fn idle(&self) {
        self.fire(SessionEvent::Idle);
    }

    /// When `hold` is true, write futures stay pending until released with
    /// [`complete_writes`](Self::complete_writes).
    pub fn set_hold_writes(&self, hold: bool) {
        self.hold_writes.store(hold, Ordering::Release);
    }

    /// Completes up to `count` held writes, oldest first. Returns how many
    /// were completed.
    pub fn complete_writes(&self, count: usize) -> usize {
        let mut completed = 0;
        while completed < count {
            let Some(sender) = self.held.lock().pop_front() else {
                break;
            };
            let _ = sender.send(Ok(()));
            completed += 1;
        }
        completed
    }

    /// Number of writes still held.
    pub fn held_writes(&self) -> usize {
        self.held.lock().len()
    }

    /// Every message written to this session, in order.
    pub fn written(&self) -> Vec<Message> {
        self.written.lock().clone()
    }

    /// Total bytes written to this session.
    pub fn written_bytes(&self) -> usize {
        self.written.lock().iter().map(|m| m.len()).sum()
    }

    /// Returns `true` while reads are suspended.
    pub fn is_read_suspended(&self) -> bool {
        self.read_suspended.load(Ordering::Acquire)
    }

    /// Number of `suspend_read` calls seen.
    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls.load(Ordering::Acquire)
    }

    /// Number of `resume_read` calls seen.
    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::Acquire)
    }

    /// Returns `true` once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Returns `true` if the session was closed with `immediately = true`.
    pub fn was_closed_immediately(&self) -> bool {
        self.closed_immediately.load(Ordering::Acquire)
    }
}

impl Session for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn worker(&self) -> Option<WorkerId> {
        self.worker
    }

    fn write(&self, message: Message) -> WriteFuture {
        if self.is_closing() {
            return futures_util::future::ready(Err(TransportError::Closed)).boxed();
        }
        self.written.lock().push(message);
        if !self.hold_writes.load(Ordering::Acquire) {
            return futures_util::future::ready(Ok(())).boxed();
        }
        let (tx, rx) = oneshot::channel();
        self.held.lock().push_back(tx);
        async move { rx.await.unwrap_or_else(|_| Err(TransportError::write_aborted())) }.boxed()
    }

    fn close(&self, immediately: bool) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closed_immediately.store(immediately, Ordering::Release);
        trace!(session = %self.id, immediately, "closing memory session");
        // Dropping the senders fails any held writes with `WriteFailed`.
        self.held.lock().clear();
        self.fire(SessionEvent::Closed);
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn suspend_read(&self) {
        self.suspend_calls.fetch_add(1, Ordering::AcqRel);
        self.read_suspended.store(true, Ordering::Release);
    }

    fn resume_read(&self) {
        self.resume_calls.fetch_add(1, Ordering::AcqRel);
        self.read_suspended.store(false, Ordering::Release);
    }

    fn filter_chain(&self) -> &FilterChain {
        &self.chain
    }
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("worker", &self.worker)
            .field("closing", &self.is_closing())
            .field("read_suspended", &self.is_read_suspended())
            .finish()
    }
}

/// How a [`MemoryConnector`] answers connect requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Establish the session synchronously.
    Accept,
    /// Fail with a refused connection.
    Refuse,
    /// Keep the request pending until released or failed by the test.
    Hold,
    /// Fail with [`TransportError::ConnectorShuttingDown`].
    ShuttingDown,
}

/// A [`Connector`] that creates [`MemorySession`]s.
pub struct MemoryConnector {
    mode: Mutex<ConnectMode>,
    attempts: AtomicUsize,
    hold_writes: AtomicBool,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    held: Mutex<VecDeque<(ConnectRequest, ConnectFuture)>>,
}

impl MemoryConnector {
    /// Creates a connector in [`ConnectMode::Accept`].
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(ConnectMode::Accept),
            attempts: AtomicUsize::new(0),
            hold_writes: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            held: Mutex::new(VecDeque::new()),
        }
    }

    /// Changes how later requests are answered.
    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock() = mode;
    }

    /// Returns the current mode.
    pub fn mode(&self) -> ConnectMode {
        *self.mode.lock()
    }

    /// Makes sessions created from now on hold their writes.
    pub fn set_hold_writes(&self, hold: bool) {
        self.hold_writes.store(hold, Ordering::Release);
    }

    /// Number of connect requests received.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// Every session this connector has created.
    pub fn sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions.lock().clone()
    }

    /// Number of created sessions that are not closed.
    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|session| !session.is_closed())
            .count()
    }

    /// Number of requests waiting in [`ConnectMode::Hold`].
    pub fn held_connects(&self) -> usize {
        self.held.lock().len()
    }

    /// Establishes the oldest held request. Returns `false` if none was held.
    pub fn release_one(&self) -> bool {
        let Some((request, future)) = self.held.lock().pop_front() else {
            return false;
        };
        self.establish(request, &future);
        true
    }

    /// Fails the oldest held request with a refused connection.
    pub fn fail_one(&self) -> bool {
        let Some((request, future)) = self.held.lock().pop_front() else {
            return false;
        };
        future.set_error(TransportError::connection_refused(request.uri));
        true
    }

    fn establish(&self, request: ConnectRequest, future: &ConnectFuture) {
        let session = MemorySession::new(request.worker, request.handler);
        session.set_hold_writes(self.hold_writes.load(Ordering::Acquire));
        self.sessions.lock().push(session.clone());

        let session_ref: SessionRef = session.clone();
        if let Some(initializer) = &request.initializer {
            initializer(&session_ref);
        }
        session.open();
        future.set_session(session_ref);
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, request: ConnectRequest) -> ConnectFuture {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        match self.mode() {
            ConnectMode::Accept => {
                let future = ConnectFuture::new();
                self.establish(request, &future);
                future
            }
            ConnectMode::Refuse => {
                ConnectFuture::failed(TransportError::connection_refused(request.uri))
            }
            ConnectMode::ShuttingDown => {
                ConnectFuture::failed(TransportError::ConnectorShuttingDown)
            }
            ConnectMode::Hold => {
                let future = ConnectFuture::new();
                self.held.lock().push_back((request, future.clone()));
                future
            }
        }
    }
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("mode", &self.mode())
            .field("attempts", &self.attempts())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}
