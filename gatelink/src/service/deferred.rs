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

//! Deferred connect strategy.

use crate::transport::{NextFilter, SessionEvent, SessionFilter, SessionRef};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::trace;

/// Name of the filter that holds back `Opened` until traffic is seen.
pub const DEFERRED_CONNECT_FILTER: &str = "gatelink.deferred-connect";

const READY: u8 = 0;
const OBSERVED: u8 = 1;
const FLUSHED: u8 = 2;

/// Where a [`DeferredConnectStrategyFilter`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// `Opened` has not been seen
    Ready,
    /// `Opened` was seen and is being held
    Observed,
    /// `Opened` was released
    Flushed,
}

/// Holds an accept session's `Opened` event until the next event arrives.
///
/// The accept handler starts the backend connect from `Opened`, so holding
/// it back means clients that connect and go quiet never cost a backend
/// connection. When any later event arrives the filter forwards `Opened`,
/// then that event, and removes itself from the chain.
///
/// # Examples
///
/// ```rust
/// use gatelink::service::{DeferredConnectStrategyFilter, DeferredState, DEFERRED_CONNECT_FILTER};
/// use gatelink::transport::memory::MemorySession;
/// use gatelink::transport::{NoopHandler, Session};
/// use std::sync::Arc;
///
/// let session = MemorySession::new(None, Arc::new(NoopHandler));
/// let filter = Arc::new(DeferredConnectStrategyFilter::new());
/// session.filter_chain().add_last(DEFERRED_CONNECT_FILTER, filter.clone());
///
/// session.open();
/// assert_eq!(filter.state(), DeferredState::Observed);
///
/// session.receive(&b"hello"[..]);
/// assert_eq!(filter.state(), DeferredState::Flushed);
/// assert!(!session.filter_chain().contains(DEFERRED_CONNECT_FILTER));
/// ```
#[derive(Debug, Default)]
pub struct DeferredConnectStrategyFilter {
    state: AtomicU8,
}

impl DeferredConnectStrategyFilter {
    /// Creates a filter in the ready state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(READY),
        }
    }

    /// Current state.
    pub fn state(&self) -> DeferredState {
        match self.state.load(Ordering::Acquire) {
            READY => DeferredState::Ready,
            OBSERVED => DeferredState::Observed,
            _ => DeferredState::Flushed,
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl SessionFilter for DeferredConnectStrategyFilter {
    fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
        if matches!(event, SessionEvent::Opened) {
            if self.transition(READY, OBSERVED) {
                trace!(session = %session.id(), "deferring session opened");
                return;
            }
        } else if self.transition(OBSERVED, FLUSHED) {
            trace!(
                session = %session.id(),
                trigger = event.name(),
                "releasing deferred session opened"
            );
            next.fire(session, SessionEvent::Opened);
            next.fire(session, event);
            session.filter_chain().remove(DEFERRED_CONNECT_FILTER);
            return;
        }
        next.fire(session, event);
    }
}
