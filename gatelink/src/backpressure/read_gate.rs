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

//! Single-transition read gate.

use std::sync::atomic::{AtomicU8, Ordering};

const ACTIVE: u8 = 0;
const SUSPENDED: u8 = 1;

/// Whether reads on a session are flowing or held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Reads are delivered
    Active,
    /// Reads are suspended until the destination drains
    Suspended,
}

/// Tracks the read state of one bridged session.
///
/// Each transition is a single compare-and-swap. A failed swap means another
/// thread already made the same transition; the caller treats that as a
/// no-op and must not touch the session. This keeps overlapping write
/// completions from suspending or resuming a session twice.
///
/// # Examples
///
/// ```rust
/// use gatelink::backpressure::{ReadGate, ReadState};
///
/// let gate = ReadGate::new();
/// assert!(gate.try_suspend());
/// assert!(!gate.try_suspend());
/// assert_eq!(gate.state(), ReadState::Suspended);
/// assert!(gate.try_resume());
/// assert_eq!(gate.state(), ReadState::Active);
/// ```
#[derive(Debug)]
pub struct ReadGate {
    state: AtomicU8,
}

impl ReadGate {
    /// Creates a gate in the active state.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
        }
    }

    /// Moves ACTIVE to SUSPENDED. Returns `true` if this call made the move.
    pub fn try_suspend(&self) -> bool {
        self.transition(ACTIVE, SUSPENDED)
    }

    /// Moves SUSPENDED to ACTIVE. Returns `true` if this call made the move.
    pub fn try_resume(&self) -> bool {
        self.transition(SUSPENDED, ACTIVE)
    }

    /// Returns the current state.
    pub fn state(&self) -> ReadState {
        match self.state.load(Ordering::Acquire) {
            SUSPENDED => ReadState::Suspended,
            _ => ReadState::Active,
        }
    }

    /// Returns `true` while suspended.
    pub fn is_suspended(&self) -> bool {
        self.state() == ReadState::Suspended
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ReadGate {
    fn default() -> Self {
        Self::new()
    }
}
