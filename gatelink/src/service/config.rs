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

//! Configuration for proxy services.

use crate::service::{ConfigError, ConnectStrategyKind, ProxyConnectStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Property key for the backpressure high-water mark.
pub const MAXIMUM_PENDING_BYTES: &str = "maximum.pending.bytes";
/// Property key for the per-direction transfer cap.
pub const MAXIMUM_TRANSFERRED_BYTES: &str = "internal.maximum.transferred.bytes";
/// Property key for the heartbeat ceiling, in seconds.
pub const MAXIMUM_RECOVERY_INTERVAL: &str = "maximum.recovery.interval";
/// Property key for the warm-pool size.
pub const PREPARED_CONNECTION_COUNT: &str = "prepared.connection.count";
/// Property key for the connect strategy.
pub const CONNECT_STRATEGY: &str = "connect.strategy";
/// Property key for the cross-worker hand-off timeout, in seconds.
pub const CONNECT_TIMEOUT: &str = "connect.timeout";

/// Configuration for a proxy service.
///
/// Values can be set directly, through the `with_*` methods, or parsed from
/// the service's string properties with
/// [`from_properties`](Self::from_properties).
///
/// # Examples
///
/// ```rust
/// use gatelink::service::{ConnectStrategyKind, ProxyConfig};
/// use std::collections::HashMap;
///
/// let properties = HashMap::from([
///     ("prepared.connection.count".to_string(), "1".to_string()),
///     ("maximum.recovery.interval".to_string(), "30".to_string()),
/// ]);
/// let config = ProxyConfig::from_properties(&properties).unwrap();
///
/// // A positive pool smaller than the worker count is raised to it.
/// let strategy = config.connect_strategy(4).unwrap();
/// assert_eq!(strategy.kind(), ConnectStrategyKind::Prepared);
/// assert_eq!(strategy.connection_count(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Scheduled-write bytes above which the source's reads are suspended.
    ///
    /// Default: 64000
    pub maximum_pending_bytes: u64,

    /// Bytes each bridged direction may forward before it only drains.
    ///
    /// Negative means unlimited, zero means nothing is forwarded.
    ///
    /// Default: -1
    pub maximum_transferred_bytes: i64,

    /// Ceiling of the heartbeat delay in seconds. Zero disables the
    /// heartbeat and service quiescing.
    ///
    /// Default: 0
    pub maximum_recovery_interval_secs: u64,

    /// Warm connections to keep across all workers.
    ///
    /// Default: 0
    pub prepared_connection_count: usize,

    /// Connect strategy. `None` picks prepared when
    /// `prepared_connection_count` is positive and immediate otherwise.
    ///
    /// Default: None
    pub connect_strategy: Option<ConnectStrategyKind>,

    /// Seconds a caller off the worker threads waits for a worker to hand
    /// over a connect.
    ///
    /// Default: 30
    pub connect_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            maximum_pending_bytes: 64_000,
            maximum_transferred_bytes: -1,
            maximum_recovery_interval_secs: 0,
            prepared_connection_count: 0,
            connect_strategy: None,
            connect_timeout_secs: 30,
        }
    }
}

impl ProxyConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the recognized keys of `properties` over the defaults.
    ///
    /// Unknown keys are ignored so a host can pass its whole property map.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = parse(properties, MAXIMUM_PENDING_BYTES)? {
            config.maximum_pending_bytes = value;
        }
        if let Some(value) = parse(properties, MAXIMUM_TRANSFERRED_BYTES)? {
            config.maximum_transferred_bytes = value;
        }
        if let Some(value) = parse(properties, MAXIMUM_RECOVERY_INTERVAL)? {
            config.maximum_recovery_interval_secs = value;
        }
        if let Some(value) = parse(properties, PREPARED_CONNECTION_COUNT)? {
            config.prepared_connection_count = value;
        }
        if let Some(value) = properties.get(CONNECT_STRATEGY) {
            config.connect_strategy = Some(value.parse()?);
        }
        if let Some(value) = parse(properties, CONNECT_TIMEOUT)? {
            config.connect_timeout_secs = value;
        }
        Ok(config)
    }

    /// Resolves the connect strategy for `worker_count` workers.
    ///
    /// A positive prepared count below the worker count is raised to it so
    /// every worker holds at least one warm connection.
    pub fn connect_strategy(
        &self,
        worker_count: usize,
    ) -> Result<ProxyConnectStrategy, ConfigError> {
        let mut count = self.prepared_connection_count;
        if count > 0 && count < worker_count {
            count = worker_count;
        }
        let kind = self.connect_strategy.unwrap_or(if count > 0 {
            ConnectStrategyKind::Prepared
        } else {
            ConnectStrategyKind::Immediate
        });
        ProxyConnectStrategy::new_instance(kind, count, worker_count)
    }

    /// Heartbeat ceiling; zero when the heartbeat is disabled.
    pub fn maximum_recovery_interval(&self) -> Duration {
        Duration::from_secs(self.maximum_recovery_interval_secs)
    }

    /// Cross-worker hand-off timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Sets the backpressure high-water mark.
    pub fn with_maximum_pending_bytes(mut self, bytes: u64) -> Self {
        self.maximum_pending_bytes = bytes;
        self
    }

    /// Sets the per-direction transfer cap. Negative means unlimited.
    pub fn with_maximum_transferred_bytes(mut self, bytes: i64) -> Self {
        self.maximum_transferred_bytes = bytes;
        self
    }

    /// Sets the heartbeat ceiling. Zero disables the heartbeat.
    pub fn with_maximum_recovery_interval(mut self, interval: Duration) -> Self {
        self.maximum_recovery_interval_secs = interval.as_secs();
        self
    }

    /// Sets the warm-pool size.
    pub fn with_prepared_connection_count(mut self, count: usize) -> Self {
        self.prepared_connection_count = count;
        self
    }

    /// Sets the connect strategy.
    pub fn with_connect_strategy(mut self, kind: ConnectStrategyKind) -> Self {
        self.connect_strategy = Some(kind);
        self
    }

    /// Sets the cross-worker hand-off timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }
}

fn parse<T>(properties: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    properties
        .get(key)
        .map(|value| {
            value.trim().parse().map_err(|error: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
                reason: error.to_string(),
            })
        })
        .transpose()
}
