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

//! Pending-write accounting with hysteresis.

use crate::backpressure::ReadGate;
use std::sync::atomic::{AtomicU64, Ordering};

/// What the caller should do to the source session after an accounting step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    /// Leave reads as they are
    Unchanged,
    /// Suspend reads on the source session
    SuspendRead,
    /// Resume reads on the source session
    ResumeRead,
}

/// Bytes written toward a destination but not yet flushed, and the read gate
/// of the session producing them.
///
/// Reads are suspended as soon as the scheduled total rises above the
/// high-water mark, and resumed only once it has drained to half of it. The
/// gap between the two thresholds keeps a stream hovering at the boundary
/// from toggling its reads on every write.
///
/// # Examples
///
/// ```rust
/// use gatelink::backpressure::{FlowSignal, WriteWindow};
///
/// let window = WriteWindow::new(1000);
/// assert_eq!(window.on_write_scheduled(1500), FlowSignal::SuspendRead);
/// assert_eq!(window.on_write_completed(1500), FlowSignal::ResumeRead);
/// assert_eq!(window.scheduled_bytes(), 0);
/// ```
#[derive(Debug)]
pub struct WriteWindow {
    maximum_pending_bytes: u64,
    scheduled: AtomicU64,
    gate: ReadGate,
}

impl WriteWindow {
    /// Creates a window with the given high-water mark.
    pub fn new(maximum_pending_bytes: u64) -> Self {
        Self {
            maximum_pending_bytes,
            scheduled: AtomicU64::new(0),
            gate: ReadGate::new(),
        }
    }

    /// Accounts `len` bytes handed to the destination.
    pub fn on_write_scheduled(&self, len: usize) -> FlowSignal {
        let total = self.scheduled.fetch_add(len as u64, Ordering::AcqRel) + len as u64;
        if total > self.maximum_pending_bytes && self.gate.try_suspend() {
            FlowSignal::SuspendRead
        } else {
            FlowSignal::Unchanged
        }
    }

    /// Accounts `len` bytes flushed by the destination.
    ///
    /// The scheduled total never drops below zero.
    pub fn on_write_completed(&self, len: usize) -> FlowSignal {
        let len = len as u64;
        let previous = self
            .scheduled
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(len))
            })
            .unwrap_or_else(|current| current);
        let total = previous.saturating_sub(len);
        if self.gate.is_suspended() && total <= self.resume_threshold() && self.gate.try_resume()
        {
            FlowSignal::ResumeRead
        } else {
            FlowSignal::Unchanged
        }
    }

    /// Bytes scheduled but not yet flushed.
    pub fn scheduled_bytes(&self) -> u64 {
        self.scheduled.load(Ordering::Acquire)
    }

    /// The high-water mark.
    pub fn maximum_pending_bytes(&self) -> u64 {
        self.maximum_pending_bytes
    }

    /// Scheduled total at or below which suspended reads resume.
    pub fn resume_threshold(&self) -> u64 {
        self.maximum_pending_bytes / 2
    }

    /// Returns `true` while the source's reads are suspended.
    pub fn is_read_suspended(&self) -> bool {
        self.gate.is_suspended()
    }
}
