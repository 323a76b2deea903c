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

//! Backend connectivity state.

use serde::Serialize;
use std::fmt;

/// Where the circuit breaker for one backend stands.
///
/// ```text
///            connect fails                    heartbeat succeeds
/// CONNECTED ───────────────▶ DISCONNECTED ───────────────────────▶ CONNECTED
///     │  ▲                   (service quiesced,                (service restarted,
///     │  │                    heartbeat probing)                pools refilled)
///     ▼  │ session opened
///   PROBING (no sessions open, heartbeat scheduled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityState {
    /// The backend is reachable and the heartbeat is idle
    Connected,
    /// The backend is reachable and periodic probes are scheduled
    Probing,
    /// The backend is unreachable and the owning service is quiesced
    Disconnected,
}

impl ConnectivityState {
    /// Derives the state from the service flag and heartbeat status.
    pub fn from_flags(service_connected: bool, heartbeat_running: bool) -> Self {
        match (service_connected, heartbeat_running) {
            (false, _) => ConnectivityState::Disconnected,
            (true, true) => ConnectivityState::Probing,
            (true, false) => ConnectivityState::Connected,
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Connected => f.write_str("CONNECTED"),
            ConnectivityState::Probing => f.write_str("PROBING"),
            ConnectivityState::Disconnected => f.write_str("DISCONNECTED"),
        }
    }
}
