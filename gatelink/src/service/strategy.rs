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

//! Connect strategies.

use crate::service::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When the backend connection for an accept session is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectStrategyKind {
    /// Claim a warm connection from the pool, or connect on demand.
    Prepared,
    /// Connect as soon as the accept session opens.
    Immediate,
    /// Connect once the accept session shows traffic.
    Deferred,
}

impl ConnectStrategyKind {
    /// The lowercase name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
        }
    }
}

impl fmt::Display for ConnectStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectStrategyKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prepared" => Ok(Self::Prepared),
            "immediate" => Ok(Self::Immediate),
            "deferred" => Ok(Self::Deferred),
            _ => Err(ConfigError::InvalidStrategy {
                value: value.to_string(),
            }),
        }
    }
}

/// A validated connect strategy and its warm-connection count.
///
/// # Examples
///
/// ```rust
/// use gatelink::service::{ConnectStrategyKind, ProxyConnectStrategy};
///
/// // Zero prepared connections means "one per worker".
/// let strategy = ProxyConnectStrategy::new_instance(ConnectStrategyKind::Prepared, 0, 4).unwrap();
/// assert_eq!(strategy.connection_count(), 4);
///
/// // Only the prepared strategy may hold warm connections.
/// assert!(ProxyConnectStrategy::new_instance(ConnectStrategyKind::Deferred, 2, 4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProxyConnectStrategy {
    kind: ConnectStrategyKind,
    connection_count: usize,
}

impl ProxyConnectStrategy {
    /// Validates `count` against `kind`.
    ///
    /// For [`ConnectStrategyKind::Prepared`] a count of zero resolves to
    /// `max_count`. The other strategies keep no warm connections and
    /// reject any non-zero count.
    pub fn new_instance(
        kind: ConnectStrategyKind,
        count: usize,
        max_count: usize,
    ) -> Result<Self, ConfigError> {
        let connection_count = match kind {
            ConnectStrategyKind::Prepared if count == 0 => max_count,
            ConnectStrategyKind::Prepared => count,
            ConnectStrategyKind::Immediate | ConnectStrategyKind::Deferred if count == 0 => 0,
            _ => {
                return Err(ConfigError::InvalidConnectionCount {
                    kind: kind.to_string(),
                    count,
                })
            }
        };
        Ok(Self {
            kind,
            connection_count,
        })
    }

    /// The strategy kind.
    pub fn kind(&self) -> ConnectStrategyKind {
        self.kind
    }

    /// Warm connections to keep across all workers.
    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    /// Returns `true` if backend connects wait for client traffic.
    pub fn is_deferred(&self) -> bool {
        self.kind == ConnectStrategyKind::Deferred
    }
}

impl fmt::Display for ProxyConnectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConnectStrategyKind::Prepared => write!(f, "prepared({})", self.connection_count),
            kind => write!(f, "{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Prepared".parse(), Ok(ConnectStrategyKind::Prepared));
        assert_eq!(" IMMEDIATE ".parse(), Ok(ConnectStrategyKind::Immediate));
        assert_eq!("deferred".parse(), Ok(ConnectStrategyKind::Deferred));
        assert!(matches!(
            "lazy".parse::<ConnectStrategyKind>(),
            Err(ConfigError::InvalidStrategy { .. })
        ));
    }

    #[test]
    fn test_prepared_counts() {
        let strategy =
            ProxyConnectStrategy::new_instance(ConnectStrategyKind::Prepared, 0, 8).unwrap();
        assert_eq!(strategy.connection_count(), 8);

        let strategy =
            ProxyConnectStrategy::new_instance(ConnectStrategyKind::Prepared, 3, 8).unwrap();
        assert_eq!(strategy.connection_count(), 3);
        assert_eq!(strategy.to_string(), "prepared(3)");
    }

    #[test]
    fn test_immediate_and_deferred_reject_counts() {
        for kind in [ConnectStrategyKind::Immediate, ConnectStrategyKind::Deferred] {
            let strategy = ProxyConnectStrategy::new_instance(kind, 0, 8).unwrap();
            assert_eq!(strategy.connection_count(), 0);
            assert_eq!(
                ProxyConnectStrategy::new_instance(kind, 1, 8),
                Err(ConfigError::InvalidConnectionCount {
                    kind: kind.to_string(),
                    count: 1,
                })
            );
        }
        assert!(ProxyConnectStrategy::new_instance(ConnectStrategyKind::Deferred, 0, 2)
            .unwrap()
            .is_deferred());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ConnectStrategyKind::Immediate).unwrap();
        assert_eq!(json, "\"immediate\"");
        let kind: ConnectStrategyKind = serde_json::from_str("\"deferred\"").unwrap();
        assert_eq!(kind, ConnectStrategyKind::Deferred);
    }
}
