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

//! Error types for proxy configuration.

use thiserror::Error;

/// Errors raised while validating proxy configuration.
///
/// Configuration errors are never recoverable: they are reported once, when
/// the service is built, and the service does not start.
///
/// # Examples
///
/// ```rust
/// use gatelink::service::ConfigError;
///
/// let error = ConfigError::InvalidValue {
///     key: "maximum.pending.bytes".to_string(),
///     value: "lots".to_string(),
///     reason: "expected an unsigned integer".to_string(),
/// };
/// assert!(error.to_string().contains("maximum.pending.bytes"));
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The connect strategy name is not recognized.
    #[error("invalid connect strategy: {value:?} (expected prepared, immediate or deferred)")]
    InvalidStrategy {
        /// The rejected value
        value: String,
    },

    /// The connection count is not allowed for the strategy.
    #[error("invalid connection count {count} for {kind} connect strategy")]
    InvalidConnectionCount {
        /// Strategy name
        kind: String,
        /// The rejected count
        count: usize,
    },

    /// A property value could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Property key
        key: String,
        /// The rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = ConfigError::InvalidConnectionCount {
            kind: "immediate".to_string(),
            count: 3,
        };
        assert_eq!(
            error.to_string(),
            "invalid connection count 3 for immediate connect strategy"
        );

        let error = ConfigError::InvalidStrategy {
            value: "eager".to_string(),
        };
        assert!(error.to_string().contains("\"eager\""));
    }
}
