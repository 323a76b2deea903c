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

//! Backend connection pooling.
//!
//! A [`ConnectionPool`] keeps a small number of backend sessions connected
//! ahead of demand so a new client can be bridged without paying connect
//! latency. Pools are either thread-aligned (one per I/O worker, backed by a
//! [`RingStore`]) or shared across workers (backed by a lock-free
//! [`ConcurrentStore`]); the choice is made once, through [`PoolAffinity`],
//! when the pool is built.

mod connection_pool;
mod store;

pub use connection_pool::{ConnectFn, ConnectionPool, PoolAffinity, POOL_ENTRY_FILTER};
pub use store::{ConcurrentStore, PoolKey, PoolStore, RingStore};
