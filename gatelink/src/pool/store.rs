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

//! Storage strategies for pooled connect futures.

use crate::transport::ConnectFuture;
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one entry in a pool.
///
/// Keys are handed to the entry's pool-entry filter, so a pooled session that
/// closes can drop its own entry without a lookup by session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey(u64);

impl PoolKey {
    /// Creates a key from its raw value.
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Returns the raw key.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolKey({})", self.0)
    }
}

/// Ordered storage for unclaimed connect futures.
pub trait PoolStore: Send + Sync {
    /// Appends `future` and returns its key.
    fn add(&self, future: ConnectFuture) -> PoolKey;

    /// Removes and returns the oldest entry.
    fn poll_first(&self) -> Option<(PoolKey, ConnectFuture)>;

    /// Removes the entry for `key`, if still present.
    fn remove(&self, key: PoolKey) -> Option<ConnectFuture>;

    /// Removes and returns every entry.
    fn drain(&self) -> Vec<ConnectFuture>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns `true` if there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ring buffer store for a pool owned by a single I/O worker.
///
/// Only the owning worker touches the ring, so the lock is never contended;
/// it exists to make the pool shareable with the listeners and filters that
/// hold it.
#[derive(Debug, Default)]
pub struct RingStore {
    ring: Mutex<Ring>,
}

#[derive(Debug, Default)]
struct Ring {
    entries: VecDeque<(PoolKey, ConnectFuture)>,
    next_key: u64,
}

impl RingStore {
    /// Creates a ring sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_key: 0,
            }),
        }
    }
}

impl PoolStore for RingStore {
    fn add(&self, future: ConnectFuture) -> PoolKey {
        let mut ring = self.ring.lock();
        let key = PoolKey(ring.next_key);
        ring.next_key += 1;
        ring.entries.push_back((key, future));
        key
    }

    fn poll_first(&self) -> Option<(PoolKey, ConnectFuture)> {
        self.ring.lock().entries.pop_front()
    }

    fn remove(&self, key: PoolKey) -> Option<ConnectFuture> {
        let mut ring = self.ring.lock();
        // Keys are monotonic, so the ring is sorted by key.
        let index = ring
            .entries
            .binary_search_by_key(&key, |(existing, _)| *existing)
            .ok()?;
        ring.entries.remove(index).map(|(_, future)| future)
    }

    fn drain(&self) -> Vec<ConnectFuture> {
        self.ring
            .lock()
            .entries
            .drain(..)
            .map(|(_, future)| future)
            .collect()
    }

    fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }
}

/// Lock-free store for a pool shared across I/O workers.
#[derive(Default)]
pub struct ConcurrentStore {
    entries: SkipMap<u64, ConnectFuture>,
    next_key: AtomicU64,
}

impl ConcurrentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoolStore for ConcurrentStore {
    fn add(&self, future: ConnectFuture) -> PoolKey {
        let key = self.next_key.fetch_add(1, Ordering::AcqRel);
        self.entries.insert(key, future);
        PoolKey(key)
    }

    fn poll_first(&self) -> Option<(PoolKey, ConnectFuture)> {
        self.entries
            .pop_front()
            .map(|entry| (PoolKey(*entry.key()), entry.value().clone()))
    }

    fn remove(&self, key: PoolKey) -> Option<ConnectFuture> {
        self.entries
            .remove(&key.0)
            .map(|entry| entry.value().clone())
    }

    fn drain(&self) -> Vec<ConnectFuture> {
        let mut drained = Vec::new();
        while let Some(entry) = self.entries.pop_front() {
            drained.push(entry.value().clone());
        }
        drained
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for ConcurrentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStore")
            .field("len", &self.entries.len())
            .finish()
    }
}
