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

//! Connectivity statistics for one backend.
//!
//! Statistics are the only connect-manager state mutated from arbitrary
//! threads, so every field is an atomic. Counters are also exported to the
//! `metrics` crate when the `observability` feature is enabled.

use crate::reconnection::ConnectivityState;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Connect outcomes, heartbeat pings and the service-connected flag.
///
/// # Examples
///
/// ```rust
/// use gatelink::observability::ConnectStatistics;
///
/// let stats = ConnectStatistics::new();
/// assert!(stats.is_service_connected());
///
/// stats.record_connect_failure();
/// assert!(stats.mark_disconnected());
/// assert!(!stats.mark_disconnected());
///
/// stats.record_ping_success();
/// assert!(stats.mark_connected());
/// assert_eq!(stats.ping_successes(), 1);
/// ```
#[derive(Debug)]
pub struct ConnectStatistics {
    connect_successes: AtomicU64,
    connect_failures: AtomicU64,
    ping_successes: AtomicU64,
    ping_failures: AtomicU64,
    last_success_millis: AtomicU64,
    last_failure_millis: AtomicU64,
    service_connected: AtomicBool,
}

impl ConnectStatistics {
    /// Creates statistics for a backend assumed reachable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_successes: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            ping_successes: AtomicU64::new(0),
            ping_failures: AtomicU64::new(0),
            last_success_millis: AtomicU64::new(0),
            last_failure_millis: AtomicU64::new(0),
            service_connected: AtomicBool::new(true),
        }
    }

    /// Records a successful connect of any kind.
    pub fn record_connect_success(&self) {
        self.connect_successes.fetch_add(1, Ordering::Relaxed);
        self.last_success_millis.store(now_millis(), Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.connect.succeeded").increment(1);
    }

    /// Records a failed connect of any kind.
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_millis.store(now_millis(), Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.connect.failed").increment(1);
    }

    /// Records a heartbeat ping that reached the backend.
    pub fn record_ping_success(&self) {
        self.ping_successes.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.heartbeat.pings", "result" => "success").increment(1);
    }

    /// Records a heartbeat ping that failed.
    pub fn record_ping_failure(&self) {
        self.ping_failures.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("gatelink.heartbeat.pings", "result" => "failure").increment(1);
    }

    /// Flips the service to connected. Returns `true` if it was disconnected.
    pub fn mark_connected(&self) -> bool {
        let changed = self
            .service_connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        #[cfg(feature = "observability")]
        if changed {
            metrics::gauge!("gatelink.service.connected").set(1.0);
        }
        changed
    }

    /// Flips the service to disconnected. Returns `true` if it was connected.
    pub fn mark_disconnected(&self) -> bool {
        let changed = self
            .service_connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        #[cfg(feature = "observability")]
        if changed {
            metrics::gauge!("gatelink.service.connected").set(0.0);
        }
        changed
    }

    /// Returns `true` unless the backend is considered unreachable.
    #[must_use]
    pub fn is_service_connected(&self) -> bool {
        self.service_connected.load(Ordering::Acquire)
    }

    /// Total successful connects.
    #[must_use]
    pub fn connect_successes(&self) -> u64 {
        self.connect_successes.load(Ordering::Relaxed)
    }

    /// Total failed connects.
    #[must_use]
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Total successful heartbeat pings.
    #[must_use]
    pub fn ping_successes(&self) -> u64 {
        self.ping_successes.load(Ordering::Relaxed)
    }

    /// Total failed heartbeat pings.
    #[must_use]
    pub fn ping_failures(&self) -> u64 {
        self.ping_failures.load(Ordering::Relaxed)
    }

    /// Unix time in milliseconds of the last successful connect, if any.
    #[must_use]
    pub fn last_success_millis(&self) -> Option<u64> {
        Some(self.last_success_millis.load(Ordering::Relaxed)).filter(|millis| *millis > 0)
    }

    /// Unix time in milliseconds of the last failed connect, if any.
    #[must_use]
    pub fn last_failure_millis(&self) -> Option<u64> {
        Some(self.last_failure_millis.load(Ordering::Relaxed)).filter(|millis| *millis > 0)
    }

    /// Captures the counters together with state owned by the manager.
    #[must_use]
    pub fn snapshot(
        &self,
        heartbeat_running: bool,
        prepared_connections: usize,
    ) -> ConnectivitySnapshot {
        let service_connected = self.is_service_connected();
        ConnectivitySnapshot {
            state: ConnectivityState::from_flags(service_connected, heartbeat_running),
            service_connected,
            heartbeat_running,
            prepared_connections,
            connect_successes: self.connect_successes(),
            connect_failures: self.connect_failures(),
            ping_successes: self.ping_successes(),
            ping_failures: self.ping_failures(),
            last_success_millis: self.last_success_millis(),
            last_failure_millis: self.last_failure_millis(),
        }
    }
}

impl Default for ConnectStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of a backend's connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivitySnapshot {
    /// Circuit-breaker state
    pub state: ConnectivityState,
    /// Whether the owning service is running (not quiesced)
    pub service_connected: bool,
    /// Whether heartbeat probes are scheduled
    pub heartbeat_running: bool,
    /// Prepared connections across all pools
    pub prepared_connections: usize,
    /// Successful connects
    pub connect_successes: u64,
    /// Failed connects
    pub connect_failures: u64,
    /// Successful heartbeat pings
    pub ping_successes: u64,
    /// Failed heartbeat pings
    pub ping_failures: u64,
    /// Unix millis of the last successful connect
    pub last_success_millis: Option<u64>,
    /// Unix millis of the last failed connect
    pub last_failure_millis: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_statistics() {
        let stats = ConnectStatistics::new();
        assert!(stats.is_service_connected());
        assert_eq!(stats.last_success_millis(), None);
        assert_eq!(stats.last_failure_millis(), None);
        assert!(!stats.mark_connected());
    }

    #[test]
    fn test_timestamps_recorded() {
        let stats = ConnectStatistics::new();
        stats.record_connect_success();
        stats.record_connect_failure();
        assert!(stats.last_success_millis().is_some());
        assert!(stats.last_failure_millis().is_some());
        assert_eq!(stats.connect_successes(), 1);
        assert_eq!(stats.connect_failures(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = ConnectStatistics::new();
        stats.record_ping_failure();
        stats.mark_disconnected();

        let snapshot = stats.snapshot(true, 3);
        assert_eq!(snapshot.state, ConnectivityState::Disconnected);
        assert_eq!(snapshot.ping_failures, 1);

        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["state"], "DISCONNECTED");
        assert_eq!(json["prepared_connections"], 3);
        assert_eq!(json["heartbeat_running"], true);
        assert!(json["last_success_millis"].is_null());
    }
}
