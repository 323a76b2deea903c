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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! gatelink is organized into layers:
//!
//! - **[`transport`]**: the contract with the underlying I/O layer (sessions,
//!   filter chains, connectors, connect futures, workers and scheduling),
//!   plus an in-memory implementation
//! - **[`backpressure`]**: write accounting, read suspension and transfer caps
//! - **[`pool`]**: warm backend connections, per worker or shared
//! - **[`reconnection`]**: heartbeat backoff and connectivity state
//! - **[`service`]**: connect strategies, the connect manager and the
//!   accept-side handler that bridges client and backend sessions
//! - **[`observability`]**: connect statistics and bridge metrics
//!
//! ## Error Handling
//!
//! - [`TransportError`]: connect and session failures
//! - [`ConfigError`](service::ConfigError): invalid proxy settings
//! - [`ProxyError`]: the two combined
//!
//! ## Safety
//!
//! gatelink is written in 100% safe Rust with `#![deny(unsafe_code)]`.

pub mod backpressure;
pub mod error;
pub mod observability;
pub mod pool;
pub mod reconnection;
pub mod service;
pub mod transport;

pub use error::ProxyError;
pub use observability::{ConnectStatistics, ConnectivitySnapshot, ProxyMetrics};
pub use service::{
    ConfigError, ConnectStrategyKind, ProxyConfig, ProxyConnectStrategy, ProxyService,
    ProxyServiceBuilder, ServiceConnectManager,
};
pub use transport::{ConnectFuture, Connector, Session, SessionHandler, TransportError};
