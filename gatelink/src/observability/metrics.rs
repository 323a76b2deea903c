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

//! Bridge metrics.
//!
//! Counters for traffic flowing through bridged session pairs. Metrics are
//! collected using atomic counters and exported to the `metrics` crate when
//! the `observability` feature is enabled.

use std::sync::atomic::{AtomicU64, Ordering};

/// Traffic and flow-control counters shared by every bridged pair of a
/// proxy service.
///
/// # Examples
///
/// ```rust
/// use gatelink::observability::ProxyMetrics;
///
/// let metrics = ProxyMetrics::new();
/// metrics.record_pair_attached();
/// metrics.record_forwarded(1024);
/// metrics.record_discarded(16);
///
/// assert_eq!(metrics.active_pairs(), 1);
/// assert_eq!(metrics.bytes_forwarded(), 1024);
/// assert_eq!(metrics.messages_discarded(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    pairs_attached: AtomicU64,
    pairs_detached: AtomicU64,
    messages_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    messages_discarded: AtomicU64,
    messages_queued: AtomicU64,
    reads_suspended: AtomicU64,
    reads_resumed: AtomicU64,
    write_failures: AtomicU64,
}

impl ProxyMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accept session bridged to a connect session.
    pub fn record_pair_attached(&self) {
        self.pairs_attached.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("gatelink.bridge.pairs.attached").increment(1);
            metrics::gauge!("gatelink.bridge.pairs.active").increment(1.0);
        }
    }

    /// Records a bridged pair torn down.
    pub fn record_pair_detached(&self) {
        self.pairs_detached.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::gauge!("gatelink.bridge.pairs.active").decrement(1.0);
    }

    /// Records a message forwarded to its destination.
    pub fn record_forwarded(&self, bytes: u64) {
        self.messages_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.bridge.bytes").increment(bytes);
    }

    /// Records a message dropped by a drain-only pair.
    pub fn record_discarded(&self, bytes: u64) {
        self.messages_discarded.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.bridge.discarded.bytes").increment(bytes);
    }

    /// Records a message held until its session is attached.
    pub fn record_queued(&self) {
        self.messages_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a source session's reads being suspended.
    pub fn record_read_suspended(&self) {
        self.reads_suspended.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.bridge.read_suspended").increment(1);
    }

    /// Records a source session's reads being resumed.
    pub fn record_read_resumed(&self) {
        self.reads_resumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a destination write that failed.
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.bridge.write_failures").increment(1);
    }

    /// Pairs currently bridged.
    #[must_use]
    pub fn active_pairs(&self) -> u64 {
        let attached = self.pairs_attached.load(Ordering::Relaxed);
        let detached = self.pairs_detached.load(Ordering::Relaxed);
        attached.saturating_sub(detached)
    }

    /// Messages forwarded.
    #[must_use]
    pub fn messages_forwarded(&self) -> u64 {
        self.messages_forwarded.load(Ordering::Relaxed)
    }

    /// Bytes forwarded.
    #[must_use]
    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded.load(Ordering::Relaxed)
    }

    /// Messages discarded by drain-only pairs.
    #[must_use]
    pub fn messages_discarded(&self) -> u64 {
        self.messages_discarded.load(Ordering::Relaxed)
    }

    /// Messages queued before attachment.
    #[must_use]
    pub fn messages_queued(&self) -> u64 {
        self.messages_queued.load(Ordering::Relaxed)
    }

    /// Read suspensions.
    #[must_use]
    pub fn reads_suspended(&self) -> u64 {
        self.reads_suspended.load(Ordering::Relaxed)
    }

    /// Read resumptions.
    #[must_use]
    pub fn reads_resumed(&self) -> u64 {
        self.reads_resumed.load(Ordering::Relaxed)
    }

    /// Failed destination writes.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs() {
        let metrics = ProxyMetrics::new();
        metrics.record_pair_attached();
        metrics.record_pair_attached();
        metrics.record_pair_detached();
        assert_eq!(metrics.active_pairs(), 1);
    }

    #[test]
    fn test_flow_control_counters() {
        let metrics = ProxyMetrics::new();
        metrics.record_read_suspended();
        metrics.record_read_resumed();
        metrics.record_queued();
        metrics.record_write_failure();
        assert_eq!(metrics.reads_suspended(), 1);
        assert_eq!(metrics.reads_resumed(), 1);
        assert_eq!(metrics.messages_queued(), 1);
        assert_eq!(metrics.write_failures(), 1);
    }
}
