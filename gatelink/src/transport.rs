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

//! Transport contract consumed by the proxy core.
//!
//! The gateway's generic I/O layer (accept and connect primitives, session
//! objects, filter chains) lives outside this crate. This module defines the
//! narrow surface the proxy core depends on:
//!
//! - [`Session`] and [`SessionHandler`]: one end of a connection and the
//!   receiver of its events
//! - [`Connector`] and [`ConnectFuture`]: asynchronous outbound connects
//! - [`FilterChain`] and [`SessionFilter`]: per-session event interception
//! - [`IoWorkers`] and [`Scheduler`]: thread-aligned workers and delayed tasks
//!
//! along with an in-memory implementation ([`memory`]) and Tokio-backed
//! runtime adapters ([`TokioWorkers`], [`TokioScheduler`]).
//!
//! # Thread alignment
//!
//! Sessions are serviced by exactly one I/O worker. A session reports its
//! worker through [`Session::worker`], and connects may request a worker via
//! [`ConnectRequest::with_worker`]. Per-worker state in the core is indexed
//! by [`WorkerId`] rather than looked up through thread-locals.

mod error;
mod filter;
mod future;
pub mod memory;
mod runtime;
mod traits;
mod types;

pub use error::TransportError;
pub use filter::{FilterChain, NextFilter, SessionEvent, SessionFilter};
pub use future::ConnectFuture;
pub use runtime::{
    InlineWorkers, IoWorkers, ManualScheduler, ScheduledTask, Scheduler, Task, TokioScheduler,
    TokioWorkers,
};
pub use traits::{
    ConnectRequest, Connector, NoopHandler, Session, SessionHandler, SessionInitializer,
    SessionRef, WriteFuture,
};
pub use types::{Message, SessionId, WorkerId};
