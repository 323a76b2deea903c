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

//! Flow control for bridged sessions.
//!
//! When an accept session and a connect session are bridged, each direction
//! forwards whatever its source receives to its destination. A fast sender
//! facing a slow destination would otherwise grow the destination's write
//! queue without bound. This module provides the pieces each direction uses
//! to prevent that:
//!
//! - [`WriteWindow`]: counts bytes scheduled on the destination and signals
//!   when to suspend and resume reads on the source, with hysteresis
//! - [`ReadGate`]: the single-CAS ACTIVE/SUSPENDED state behind that signal
//! - [`TransferCap`]: an optional hard cap on forwarded bytes after which the
//!   direction only drains
//! - [`FlowMetrics`]: a snapshot of the above
//!
//! # Examples
//!
//! ```rust
//! use gatelink::backpressure::{Admission, FlowSignal, TransferCap, WriteWindow};
//!
//! let window = WriteWindow::new(64_000);
//! let cap = TransferCap::unlimited();
//!
//! let len = 1024;
//! if cap.admit(len) != Admission::Discard {
//!     if window.on_write_scheduled(len) == FlowSignal::SuspendRead {
//!         // source.suspend_read()
//!     }
//!     // ... once the destination flushes:
//!     if window.on_write_completed(len) == FlowSignal::ResumeRead {
//!         // source.resume_read()
//!     }
//! }
//! ```

mod metrics;
mod read_gate;
mod transfer_cap;
mod window;

pub use metrics::FlowMetrics;
pub use read_gate::{ReadGate, ReadState};
pub use transfer_cap::{Admission, TransferCap};
pub use window::{FlowSignal, WriteWindow};
