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

//! Backend liveness: heartbeat backoff, scheduling and connectivity state.
//!
//! When the backend becomes unreachable the connect manager quiesces the
//! owning service and starts a heartbeat: a throwaway connect that is closed
//! as soon as it succeeds. Probes back off from zero to the configured
//! recovery interval ([`HeartbeatBackoff`]). The first successful connect of
//! any kind moves the backend back to [`ConnectivityState::Connected`].
//!
//! While at least one real session to the backend is open the heartbeat is
//! paused, since live traffic already proves the backend is up
//! ([`SessionTracker`]).
//!
//! # Examples
//!
//! ```
//! use gatelink::reconnection::{ConnectivityState, HeartbeatBackoff};
//! use std::time::Duration;
//!
//! let backoff = HeartbeatBackoff::new(Duration::from_secs(16));
//! assert_eq!(backoff.next_delay(), Duration::ZERO);
//! assert_eq!(backoff.next_delay(), Duration::from_secs(1));
//!
//! let state = ConnectivityState::from_flags(false, true);
//! assert_eq!(state, ConnectivityState::Disconnected);
//! ```

mod backoff;
mod connectivity;
mod heartbeat;

pub use backoff::HeartbeatBackoff;
pub use connectivity::ConnectivityState;
pub use heartbeat::{HeartbeatSchedule, HeartbeatTick, SessionTracker, HEARTBEAT_FILTER};
