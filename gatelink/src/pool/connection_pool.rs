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

//! Warm backend connections for one worker, or for a shared pool.

use crate::pool::{ConcurrentStore, PoolKey, PoolStore, RingStore};
use crate::transport::{
    ConnectFuture, NextFilter, SessionEvent, SessionFilter, SessionInitializer, SessionRef,
    WorkerId,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Name of the filter that ties a pooled session to its pool entry.
pub const POOL_ENTRY_FILTER: &str = "gatelink.pool-entry";

/// Issues a connect on behalf of a pool.
///
/// The pool passes the caller's initializer through for on-demand connects
/// and `None` for connects that will be pooled.
pub type ConnectFn = Arc<dyn Fn(Option<SessionInitializer>) -> ConnectFuture + Send + Sync>;

/// Who may touch a pool, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAffinity {
    /// Only the given worker uses the pool; storage is a plain ring.
    ThreadAligned(WorkerId),
    /// Any thread may use the pool; storage is lock-free.
    Shared,
}

/// A bounded set of pre-established backend connections.
///
/// The pool keeps up to `target` connect futures that have already
/// connected. [`get_next_connect_future`](Self::get_next_connect_future)
/// hands out the oldest one, or issues a fresh connect when none is ready,
/// and then tops the pool back up.
///
/// A failed preconnect deactivates the pool: no further fills are attempted
/// until [`start`](Self::start) is called again, normally by the owning
/// manager once the backend is reachable.
///
/// # Examples
///
/// ```rust
/// use gatelink::pool::{ConnectFn, ConnectionPool, PoolAffinity};
/// use gatelink::transport::memory::MemoryConnector;
/// use gatelink::transport::{ConnectRequest, Connector, NoopHandler, WorkerId};
/// use std::sync::Arc;
///
/// let connector = Arc::new(MemoryConnector::new());
/// let backend = connector.clone();
/// let connect: ConnectFn = Arc::new(move |initializer| {
///     backend.connect(
///         ConnectRequest::new("memory://backend", Arc::new(NoopHandler))
///             .with_initializer(initializer),
///     )
/// });
///
/// let pool = ConnectionPool::new(PoolAffinity::ThreadAligned(WorkerId::new(0)), 2, connect);
/// pool.start();
/// assert_eq!(pool.current_prepared_count(), 2);
///
/// let future = pool.get_next_connect_future(None);
/// assert!(future.is_connected());
/// // The pool refilled behind the claim.
/// assert_eq!(pool.current_prepared_count(), 2);
/// assert_eq!(connector.attempts(), 3);
/// ```
pub struct ConnectionPool {
    affinity: PoolAffinity,
    store: Box<dyn PoolStore>,
    connect: ConnectFn,
    target: usize,
    current: AtomicUsize,
    active: AtomicBool,
    stopped: AtomicBool,
    fill_in_progress: AtomicBool,
    me: Weak<ConnectionPool>,
}

impl ConnectionPool {
    /// Creates an inactive pool that will hold up to `target` connections.
    pub fn new(affinity: PoolAffinity, target: usize, connect: ConnectFn) -> Arc<Self> {
        let store: Box<dyn PoolStore> = match affinity {
            PoolAffinity::ThreadAligned(_) => Box::new(RingStore::with_capacity(target)),
            PoolAffinity::Shared => Box::new(ConcurrentStore::new()),
        };
        Arc::new_cyclic(|me| Self {
            affinity,
            store,
            connect,
            target,
            current: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            fill_in_progress: AtomicBool::new(false),
            me: me.clone(),
        })
    }

    /// Activates the pool and starts filling it toward its target.
    pub fn start(&self) {
        self.stopped.store(false, Ordering::Release);
        self.active.store(true, Ordering::Release);
        debug!(affinity = ?self.affinity, target = self.target, "starting connection pool");
        self.fill();
    }

    /// Deactivates the pool and closes every unclaimed session.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        let drained = self.store.drain();
        debug!(affinity = ?self.affinity, drained = drained.len(), "stopping connection pool");
        for future in drained {
            self.decrement();
            if let Some(session) = future.session() {
                session.close(true);
            }
        }
    }

    /// Returns a pooled connect future, or a fresh connect if none is ready.
    ///
    /// A pooled session is released from the pool's bookkeeping and
    /// `initializer` runs on it before it is returned. Either way the pool
    /// is topped back up afterwards.
    pub fn get_next_connect_future(
        &self,
        initializer: Option<SessionInitializer>,
    ) -> ConnectFuture {
        let future = match self.claim() {
            Some((future, session)) => {
                if let Some(initializer) = &initializer {
                    initializer(&session);
                }
                future
            }
            None => (self.connect)(initializer),
        };
        self.fill();
        future
    }

    /// Discards the pooled entry for `key`.
    ///
    /// Returns `true` and decrements the prepared count only if the entry
    /// was still pooled, so repeated calls are harmless.
    pub fn remove(&self, key: PoolKey) -> bool {
        if self.store.remove(key).is_some() {
            self.decrement();
            trace!(affinity = ?self.affinity, %key, "removed pooled connection");
            true
        } else {
            false
        }
    }

    /// Connections issued for the pool and not yet claimed or lost.
    pub fn current_prepared_count(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Number of connections the pool tries to keep ready.
    pub fn target_prepared_count(&self) -> usize {
        self.target
    }

    /// Returns `false` after a preconnect failure or [`stop`](Self::stop).
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The pool's affinity.
    pub fn affinity(&self) -> PoolAffinity {
        self.affinity
    }

    /// Number of connected sessions waiting to be claimed.
    pub fn ready_count(&self) -> usize {
        self.store.len()
    }

    fn claim(&self) -> Option<(ConnectFuture, SessionRef)> {
        while let Some((_, future)) = self.store.poll_first() {
            self.decrement();
            let Some(session) = future.session() else {
                continue;
            };
            session.filter_chain().remove(POOL_ENTRY_FILTER);
            if session.is_closing() {
                trace!(session = %session.id(), "skipping pooled session that is closing");
                continue;
            }
            return Some((future, session));
        }
        None
    }

    fn fill(&self) {
        if self.target == 0 {
            return;
        }
        loop {
            if self
                .fill_in_progress
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            while self.is_active() && self.try_reserve() {
                let future = (self.connect)(None);
                let pool = self.me.clone();
                future.add_listener(move |future| {
                    if let Some(pool) = pool.upgrade() {
                        pool.on_preconnect_complete(future);
                    }
                });
            }
            self.fill_in_progress.store(false, Ordering::Release);

            // A claim may have raced the end of the pass.
            if !self.is_active() || self.current_prepared_count() >= self.target {
                return;
            }
        }
    }

    fn try_reserve(&self) -> bool {
        let reserved = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.target).then_some(current + 1)
            })
            .is_ok();
        if reserved {
            #[cfg(feature = "observability")]
            metrics::gauge!("gatelink.pool.prepared").increment(1.0);
        }
        reserved
    }

    fn decrement(&self) {
        let decremented = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            })
            .is_ok();
        if decremented {
            #[cfg(feature = "observability")]
            metrics::gauge!("gatelink.pool.prepared").decrement(1.0);
        }
    }

    fn on_preconnect_complete(&self, future: &ConnectFuture) {
        let Some(session) = future.session() else {
            self.active.store(false, Ordering::Release);
            self.decrement();
            if let Some(error) = future.error() {
                warn!(affinity = ?self.affinity, %error, "preconnect failed, pausing pool fill");
                debug!(affinity = ?self.affinity, error = ?error, "preconnect failure detail");
            }
            return;
        };

        if self.stopped.load(Ordering::Acquire) {
            self.decrement();
            session.close(true);
            return;
        }

        let key = self.store.add(future.clone());
        let filter = PoolEntryFilter {
            key,
            pool: self.me.clone(),
            fired: AtomicBool::new(false),
        };
        session
            .filter_chain()
            .add_last(POOL_ENTRY_FILTER, Arc::new(filter));
        // The session may have closed before the filter was in place.
        if session.is_closing() {
            self.remove(key);
        }
        trace!(affinity = ?self.affinity, %key, session = %session.id(), "pooled connection ready");
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("affinity", &self.affinity)
            .field("current", &self.current_prepared_count())
            .field("target", &self.target)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Drops a pooled session's entry when the session closes unclaimed.
///
/// Removed from the chain when the session is claimed.
struct PoolEntryFilter {
    key: PoolKey,
    pool: Weak<ConnectionPool>,
    fired: AtomicBool,
}

impl SessionFilter for PoolEntryFilter {
    fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
        if matches!(event, SessionEvent::Closed) && !self.fired.swap(true, Ordering::AcqRel) {
            if let Some(pool) = self.pool.upgrade() {
                pool.remove(self.key);
            }
        }
        next.fire(session, event);
    }
}
