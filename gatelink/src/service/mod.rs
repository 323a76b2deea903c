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

//! Proxy services: connect strategies, backend connect management and
//! bridging of client sessions to backend sessions.
//!
//! A proxy service sits between an accept side, which produces client
//! sessions, and a [`Connector`](crate::transport::Connector) that reaches a
//! single backend. The pieces are:
//!
//! - [`ProxyConfig`] and [`ProxyConnectStrategy`]: what the service was asked
//!   to do, validated once at build time
//! - [`ServiceConnectManager`]: per-worker connection pools, the heartbeat and
//!   the circuit breaker that quiesces the owning service
//!   ([`ServiceLifecycle`]) while the backend is down
//! - [`ProxyServiceHandler`]: the client-session handler that obtains a
//!   backend session for each client and bridges the two
//! - [`AttachedSessionManager`]: one direction of a bridged pair, with
//!   backpressure and an optional transfer cap
//! - [`DeferredConnectStrategyFilter`]: postpones the backend connect until a
//!   client shows traffic
//! - [`ProxyServiceExtension`]: hooks for protocol or policy specific
//!   behavior
//!
//! # Examples
//!
//! ```rust
//! use gatelink::service::{ProxyConfig, ProxyServiceBuilder};
//! use gatelink::transport::memory::MemoryConnector;
//! use gatelink::transport::InlineWorkers;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), gatelink::ProxyError> {
//! let properties = HashMap::from([
//!     ("connect.strategy".to_string(), "deferred".to_string()),
//!     ("maximum.pending.bytes".to_string(), "32768".to_string()),
//! ]);
//! let service = ProxyServiceBuilder::new("memory://backend")
//!     .with_config(ProxyConfig::from_properties(&properties)?)
//!     .with_connector(Arc::new(MemoryConnector::new()))
//!     .with_workers(Arc::new(InlineWorkers::new(4)))
//!     .build()?;
//!
//! assert!(service.strategy().is_deferred());
//! # Ok(())
//! # }
//! ```

mod accept;
mod attached;
mod builder;
mod config;
mod connect_manager;
mod context;
mod deferred;
mod error;
mod extension;
mod handler;
mod lifecycle;
mod proxy;
mod strategy;

pub use accept::ProxyServiceHandler;
pub use attached::AttachedSessionManager;
pub use builder::ProxyServiceBuilder;
pub use config::{
    ProxyConfig, CONNECT_STRATEGY, CONNECT_TIMEOUT, MAXIMUM_PENDING_BYTES,
    MAXIMUM_RECOVERY_INTERVAL, MAXIMUM_TRANSFERRED_BYTES, PREPARED_CONNECTION_COUNT,
};
pub use connect_manager::{ServiceConnectManager, ServiceConnectManagerBuilder};
pub use context::{ContextRegistry, Delivery, Detached, ProxyContext};
pub use deferred::{DeferredConnectStrategyFilter, DeferredState, DEFERRED_CONNECT_FILTER};
pub use error::ConfigError;
pub use extension::ProxyServiceExtension;
pub use handler::ProxyConnectHandler;
pub use lifecycle::{LifecycleDriver, NoopLifecycle, ServiceLifecycle};
pub use proxy::ProxyService;
pub use strategy::{ConnectStrategyKind, ProxyConnectStrategy};
