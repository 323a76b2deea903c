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

//! Observability support.
//!
//! - **[`ConnectStatistics`]**: per-backend connect outcomes, heartbeat pings
//!   and the service-connected flag, with a serializable
//!   [`ConnectivitySnapshot`] for management endpoints
//! - **[`ProxyMetrics`]**: traffic and flow-control counters for bridged
//!   session pairs
//!
//! Both keep their own atomic counters so they work without any exporter.
//! With the `observability` feature (on by default) they also publish to the
//! [`metrics`](https://docs.rs/metrics) facade under the `gatelink.` prefix.
//! Logging goes through [`tracing`](https://docs.rs/tracing); the crate never
//! installs a subscriber.
//!
//! # Examples
//!
//! ```rust
//! use gatelink::observability::ConnectStatistics;
//!
//! let stats = ConnectStatistics::new();
//! stats.record_connect_success();
//! let snapshot = stats.snapshot(false, 4);
//! assert_eq!(snapshot.prepared_connections, 4);
//! assert_eq!(snapshot.connect_successes, 1);
//! ```

mod metrics;
mod statistics;

pub use self::metrics::ProxyMetrics;
pub use statistics::{ConnectStatistics, ConnectivitySnapshot};
