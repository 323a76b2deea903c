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

//! Top-level error type for gatelink.
//!
//! Errors come from two layers:
//!
//! 1. **Transport layer**: connect, session and runtime failures
//!    ([`TransportError`])
//! 2. **Configuration layer**: invalid proxy settings ([`ConfigError`])
//!
//! [`ProxyError`] composes both for the operations that can fail with
//! either, such as building a proxy service. Failures that happen while a
//! service runs are never returned to the application: they are logged and
//! reflected in the connect statistics.
//!
//! # Examples
//!
//! ```rust
//! use gatelink::ProxyError;
//! use gatelink::service::ConfigError;
//! use gatelink::transport::TransportError;
//!
//! let error: ProxyError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//!
//! let error: ProxyError = ConfigError::InvalidStrategy {
//!     value: "eager".to_string(),
//! }
//! .into();
//! assert!(error.is_config_error());
//! ```

use crate::service::ConfigError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for gatelink operations.
#[derive(Debug)]
pub enum ProxyError {
    /// A backend connector or session failed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gatelink::ProxyError;
    /// use gatelink::transport::TransportError;
    ///
    /// let error = ProxyError::Transport(TransportError::ConnectorShuttingDown);
    /// assert!(error.is_transport_error());
    /// assert!(!error.is_recoverable());
    /// ```
    Transport(TransportError),

    /// The proxy configuration is invalid.
    ///
    /// Configuration errors are reported when a service is built and are
    /// never recoverable.
    Config(ConfigError),
}

impl ProxyError {
    /// Returns `true` when the failure came from a backend connector.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` if retrying the operation may succeed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gatelink::ProxyError;
    /// use gatelink::transport::TransportError;
    /// use std::time::Duration;
    ///
    /// let timeout = ProxyError::Transport(TransportError::Timeout {
    ///     duration: Duration::from_secs(30),
    /// });
    /// assert!(timeout.is_recoverable());
    ///
    /// let closed = ProxyError::Transport(TransportError::Closed);
    /// assert!(!closed.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl StdError for ProxyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<TransportError> for ProxyError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<ConfigError> for ProxyError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transport_error() {
        let error = ProxyError::Transport(TransportError::Closed);
        assert!(error.is_transport_error());
        assert!(!error.is_config_error());
    }

    #[test]
    fn test_is_config_error() {
        let error = ProxyError::Config(ConfigError::InvalidConnectionCount {
            kind: "deferred".to_string(),
            count: 2,
        });
        assert!(error.is_config_error());
        assert!(!error.is_transport_error());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_is_recoverable() {
        let refused = ProxyError::from(TransportError::connection_refused("memory://backend"));
        assert!(refused.is_recoverable());

        let aborted = ProxyError::from(TransportError::write_aborted());
        assert!(!aborted.is_recoverable());
    }

    #[test]
    fn test_display() {
        let error = ProxyError::Transport(TransportError::AcceptClosed);
        assert_eq!(
            error.to_string(),
            "transport error: failing connect future because accept is closed"
        );

        let error = ProxyError::Config(ConfigError::InvalidStrategy {
            value: "eager".to_string(),
        });
        assert!(error.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn test_error_source() {
        let error = ProxyError::Transport(TransportError::Closed);
        assert!(error.source().is_some());

        let error = ProxyError::Config(ConfigError::InvalidStrategy {
            value: "eager".to_string(),
        });
        assert!(error.source().is_some());
    }
}
