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

//! Per-session proxy state.

use crate::service::AttachedSessionManager;
use crate::transport::{ConnectFuture, Message, SessionId};
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// What happened to a message offered to a [`ProxyContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the attached manager
    Forwarded,
    /// Held until the session is attached
    Queued,
    /// Dropped because the session is closed
    Dropped,
}

#[derive(Default)]
struct ContextState {
    attached: Option<Arc<AttachedSessionManager>>,
    flushing: bool,
    pending: VecDeque<Message>,
    closed: bool,
    connect_future: Option<ConnectFuture>,
}

/// What a context held when it was detached.
#[derive(Debug, Default)]
pub struct Detached {
    /// The manager forwarding this session's messages, if attached
    pub attached: Option<Arc<AttachedSessionManager>>,
    /// The backend connect started for this session, if any
    pub connect_future: Option<ConnectFuture>,
}

/// Proxy state for one session: where its messages go, and what arrived
/// before that was known.
///
/// Messages received before [`attach`](Self::attach) wait in a pending
/// queue. Attaching flushes the queue in arrival order, and messages that
/// arrive during the flush join the back of the queue, so the destination
/// always sees them in the order they were received.
pub struct ProxyContext {
    session: SessionId,
    state: Mutex<ContextState>,
}

impl ProxyContext {
    /// Creates an unattached context for `session`.
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            state: Mutex::new(ContextState::default()),
        }
    }

    /// The session this context belongs to.
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Forwards `message` if attached, otherwise queues it.
    pub fn forward_or_queue(&self, message: Message) -> Delivery {
        let manager = {
            let mut state = self.state.lock();
            if state.closed {
                return Delivery::Dropped;
            }
            match &state.attached {
                Some(manager) if !state.flushing => manager.clone(),
                _ => {
                    state.pending.push_back(message);
                    return Delivery::Queued;
                }
            }
        };
        manager.write_message(message);
        Delivery::Forwarded
    }

    /// Attaches `manager` and flushes queued messages through it.
    ///
    /// Returns `false` if the context is closed or already attached.
    pub fn attach(&self, manager: Arc<AttachedSessionManager>) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed || state.attached.is_some() {
                return false;
            }
            state.attached = Some(manager.clone());
            state.flushing = true;
        }
        loop {
            let batch = {
                let mut state = self.state.lock();
                if state.closed || state.pending.is_empty() {
                    state.flushing = false;
                    state.pending.clear();
                    break;
                }
                std::mem::take(&mut state.pending)
            };
            for message in batch {
                manager.write_message(message);
            }
        }
        true
    }

    /// Records the backend connect started for this session.
    pub fn set_connect_future(&self, future: ConnectFuture) {
        self.state.lock().connect_future = Some(future);
    }

    /// The backend connect started for this session.
    pub fn connect_future(&self) -> Option<ConnectFuture> {
        self.state.lock().connect_future.clone()
    }

    /// The attached manager, once attached.
    pub fn attached(&self) -> Option<Arc<AttachedSessionManager>> {
        self.state.lock().attached.clone()
    }

    /// Messages waiting for attachment.
    pub fn pending_messages(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns `true` once detached.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Closes the context, dropping queued messages, and hands back what it
    /// referenced.
    pub fn detach(&self) -> Detached {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        Detached {
            attached: state.attached.take(),
            connect_future: state.connect_future.take(),
        }
    }
}

impl fmt::Debug for ProxyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProxyContext")
            .field("session", &self.session)
            .field("attached", &state.attached.is_some())
            .field("pending", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Proxy contexts of live sessions, keyed by session.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: SkipMap<u64, Arc<ProxyContext>>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context for `session`, creating it if needed.
    pub fn get_or_create(&self, session: SessionId) -> Arc<ProxyContext> {
        self.contexts
            .get_or_insert_with(session.as_u64(), || Arc::new(ProxyContext::new(session)))
            .value()
            .clone()
    }

    /// Returns the context for `session`, if any.
    pub fn get(&self, session: SessionId) -> Option<Arc<ProxyContext>> {
        self.contexts
            .get(&session.as_u64())
            .map(|entry| entry.value().clone())
    }

    /// Removes and returns the context for `session`.
    pub fn remove(&self, session: SessionId) -> Option<Arc<ProxyContext>> {
        self.contexts
            .remove(&session.as_u64())
            .map(|entry| entry.value().clone())
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if no context is live.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("contexts", &self.len())
            .finish()
    }
}
