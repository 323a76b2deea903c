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

//! Errors raised by backend connectors and sessions.
//!
//! Transport errors are the lowest level of the gateway's error hierarchy.
//! They describe failures to reach the backend, failures of established
//! sessions, and the proxy-specific outcomes a connect future can end with
//! (for example an accept session closing while its backend connect is
//! still in flight).
//!
//! # Error Categories
//!
//! - **Connection errors**: the backend could not be reached
//! - **I/O errors**: write failures on an established session
//! - **Lifecycle errors**: the connector is shutting down, or the accept side
//!   went away before the backend session could be attached
//! - **Timeout errors**: an operation exceeded its limit
//!
//! Connect failures feed the heartbeat and quiesce logic; a shutdown-class
//! error ([`TransportError::is_shutdown`]) ends the current heartbeat cycle
//! instead of rescheduling it.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a backend connector or one of its sessions.
///
/// # Examples
///
/// ```rust
/// use gatelink::transport::TransportError;
/// use std::io;
///
/// let error = TransportError::ConnectionFailed {
///     address: "tcp://backend:8080".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
/// };
///
/// assert!(error.is_recoverable());
/// assert!(!error.is_shutdown());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection to the backend.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// Backend address the connector dialed
        address: String,
        /// OS error from the dial attempt
        #[source]
        source: io::Error,
    },

    /// A write was still pending when its session closed.
    #[error("write failed: {source}")]
    WriteFailed {
        /// OS error from the failed write
        #[source]
        source: io::Error,
    },

    /// A bounded wait, such as a worker hand-off, elapsed.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// Limit that elapsed
        duration: Duration,
    },

    /// The connector refused the request because it is shutting down.
    ///
    /// Heartbeats treat this as terminal for the current cycle.
    #[error("connector is shutting down")]
    ConnectorShuttingDown,

    /// The accept session closed before its backend connect completed.
    #[error("failing connect future because accept is closed")]
    AcceptClosed,

    /// The session is already closed.
    #[error("session is closed")]
    Closed,

    /// The connector was configured with an unusable value.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which setting was rejected
        reason: String,
    },
}

impl TransportError {
    /// Returns `true` if retrying the connect may succeed.
    ///
    /// Connection failures and timeouts are recoverable. Write failures are
    /// recoverable only when the underlying error kind is transient.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } | TransportError::Timeout { .. } => true,

            TransportError::WriteFailed { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),

            TransportError::ConnectorShuttingDown
            | TransportError::AcceptClosed
            | TransportError::Closed
            | TransportError::InvalidConfiguration { .. } => false,
        }
    }

    /// Returns `true` if this error means the connector is going away.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gatelink::transport::TransportError;
    ///
    /// assert!(TransportError::ConnectorShuttingDown.is_shutdown());
    /// assert!(!TransportError::Closed.is_shutdown());
    /// ```
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TransportError::ConnectorShuttingDown)
    }

    /// Creates the error for a write dropped because its session closed.
    pub fn write_aborted() -> Self {
        TransportError::WriteFailed {
            source: io::Error::new(
                io::ErrorKind::BrokenPipe,
                "session closed before write completed",
            ),
        }
    }

    /// Creates a refused-connection error for `address`.
    pub fn connection_refused(address: impl Into<String>) -> Self {
        TransportError::ConnectionFailed {
            address: address.into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_is_recoverable() {
        let error = TransportError::connection_refused("tcp://backend:8080");
        assert!(error.is_recoverable());
        assert!(!error.is_shutdown());
        assert!(error.to_string().contains("tcp://backend:8080"));
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let error = TransportError::ConnectorShuttingDown;
        assert!(error.is_shutdown());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_accept_closed_message() {
        assert_eq!(
            TransportError::AcceptClosed.to_string(),
            "failing connect future because accept is closed"
        );
    }

    #[test]
    fn test_write_failure_recoverability() {
        let transient = TransportError::WriteFailed {
            source: io::Error::new(io::ErrorKind::Interrupted, "interrupted"),
        };
        assert!(transient.is_recoverable());

        let aborted = TransportError::write_aborted();
        assert!(!aborted.is_recoverable());
        assert!(aborted.to_string().contains("session closed"));
    }

    #[test]
    fn test_timeout_display() {
        let error = TransportError::Timeout {
            duration: Duration::from_secs(30),
        };
        assert!(error.to_string().contains("30s"));
        assert!(error.is_recoverable());
    }
}
