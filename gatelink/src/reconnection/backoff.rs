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

//! Capped exponential backoff for heartbeat probes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Delay sequence between heartbeat attempts.
///
/// The first delay is zero, the second one second, and each later delay
/// doubles until it reaches the ceiling. The sequence only starts over on
/// [`reset`](Self::reset), which the connect manager calls when the backend
/// becomes reachable again.
///
/// # Examples
///
/// ```
/// use gatelink::reconnection::HeartbeatBackoff;
/// use std::time::Duration;
///
/// let backoff = HeartbeatBackoff::new(Duration::from_secs(5));
/// let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
/// assert_eq!(delays, vec![0, 1, 2, 4, 5, 5]);
/// ```
#[derive(Debug)]
pub struct HeartbeatBackoff {
    ceiling_secs: u64,
    next_secs: AtomicU64,
}

impl HeartbeatBackoff {
    /// Creates a backoff capped at `ceiling`, truncated to whole seconds.
    pub fn new(ceiling: Duration) -> Self {
        Self {
            ceiling_secs: ceiling.as_secs(),
            next_secs: AtomicU64::new(0),
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_delay(&self) -> Duration {
        let ceiling = self.ceiling_secs;
        let current = self
            .next_secs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = if current == 0 { 1 } else { current.saturating_mul(2) };
                Some(next.min(ceiling))
            })
            .unwrap_or_else(|current| current);
        Duration::from_secs(current)
    }

    /// Returns the delay the next call to [`next_delay`](Self::next_delay) yields.
    pub fn peek(&self) -> Duration {
        Duration::from_secs(self.next_secs.load(Ordering::Acquire))
    }

    /// Restarts the sequence at zero.
    pub fn reset(&self) {
        self.next_secs.store(0, Ordering::Release);
    }

    /// The ceiling.
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &HeartbeatBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_delay().as_secs()).collect()
    }

    #[test]
    fn test_sequence_doubles_to_ceiling() {
        let backoff = HeartbeatBackoff::new(Duration::from_secs(30));
        assert_eq!(secs(&backoff, 8), vec![0, 1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_never_decreases_without_reset() {
        let backoff = HeartbeatBackoff::new(Duration::from_secs(100));
        let delays = secs(&backoff, 20);
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_reset() {
        let backoff = HeartbeatBackoff::new(Duration::from_secs(10));
        secs(&backoff, 5);
        assert_eq!(backoff.peek(), Duration::from_secs(10));
        backoff.reset();
        assert_eq!(secs(&backoff, 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_one_second_ceiling() {
        let backoff = HeartbeatBackoff::new(Duration::from_secs(1));
        assert_eq!(secs(&backoff, 4), vec![0, 1, 1, 1]);
        assert_eq!(backoff.ceiling(), Duration::from_secs(1));
    }
}
