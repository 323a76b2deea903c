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

//! Per-pair transfer cap with a permanent drain-only latch.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Outcome of offering a write to a [`TransferCap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Forward the write
    Forward,
    /// Forward the write; the cap is now exhausted and later writes are discarded
    ForwardThenDrain,
    /// Discard the write
    Discard,
}

/// Caps the bytes a bridged direction may forward.
///
/// The limit is copied from the service-wide setting when the direction is
/// created, so it can be driven to zero independently of other pairs. A
/// negative limit means unlimited and a limit of zero means nothing is ever
/// forwarded. The write that pushes the running total past a positive limit
/// is still forwarded; after it the limit becomes zero for the lifetime of
/// the cap.
///
/// # Examples
///
/// ```rust
/// use gatelink::backpressure::{Admission, TransferCap};
///
/// let cap = TransferCap::new(10);
/// assert_eq!(cap.admit(6), Admission::Forward);
/// assert_eq!(cap.admit(6), Admission::ForwardThenDrain);
/// assert_eq!(cap.admit(1), Admission::Discard);
/// assert!(cap.is_drain_only());
/// ```
#[derive(Debug)]
pub struct TransferCap {
    limit: AtomicI64,
    transferred: AtomicU64,
}

impl TransferCap {
    /// Creates a cap. Negative `limit` means unlimited.
    pub fn new(limit: i64) -> Self {
        Self {
            limit: AtomicI64::new(limit),
            transferred: AtomicU64::new(0),
        }
    }

    /// Creates a cap that never discards.
    pub fn unlimited() -> Self {
        Self::new(-1)
    }

    /// Decides whether a write of `len` bytes is forwarded.
    pub fn admit(&self, len: usize) -> Admission {
        let limit = self.limit.load(Ordering::Acquire);
        if limit == 0 {
            return Admission::Discard;
        }
        let total = self.transferred.fetch_add(len as u64, Ordering::AcqRel) + len as u64;
        if limit > 0 && total > limit as u64 {
            self.limit.store(0, Ordering::Release);
            return Admission::ForwardThenDrain;
        }
        Admission::Forward
    }

    /// Current limit; zero once drain-only.
    pub fn limit(&self) -> i64 {
        self.limit.load(Ordering::Acquire)
    }

    /// Bytes admitted so far.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    /// Returns `true` once nothing more will be forwarded.
    pub fn is_drain_only(&self) -> bool {
        self.limit() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let cap = TransferCap::unlimited();
        for _ in 0..100 {
            assert_eq!(cap.admit(1_000_000), Admission::Forward);
        }
        assert_eq!(cap.transferred(), 100_000_000);
        assert!(!cap.is_drain_only());
    }

    #[test]
    fn test_zero_never_forwards() {
        let cap = TransferCap::new(0);
        assert_eq!(cap.admit(1), Admission::Discard);
        assert_eq!(cap.admit(0), Admission::Discard);
        assert_eq!(cap.transferred(), 0);
    }

    #[test]
    fn test_exact_limit_still_forwards() {
        let cap = TransferCap::new(10);
        assert_eq!(cap.admit(10), Admission::Forward);
        assert_eq!(cap.admit(1), Admission::ForwardThenDrain);
    }

    #[test]
    fn test_drain_only_is_permanent() {
        let cap = TransferCap::new(5);
        assert_eq!(cap.admit(6), Admission::ForwardThenDrain);
        for len in [0, 1, 5, 1000] {
            assert_eq!(cap.admit(len), Admission::Discard);
        }
        assert_eq!(cap.limit(), 0);
        assert_eq!(cap.transferred(), 6);
    }
}
