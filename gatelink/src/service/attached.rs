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

//! One direction of a bridged session pair.

use crate::backpressure::{Admission, FlowMetrics, FlowSignal, TransferCap, WriteWindow};
use crate::observability::ProxyMetrics;
use crate::transport::{Message, SessionRef, TransportError};
use futures_util::FutureExt;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace};

/// Forwards messages from a source session to a destination session.
///
/// A bridged pair uses two managers, one per direction. Each keeps its own
/// accounting:
///
/// - bytes written to the destination and not yet flushed; once they exceed
///   the high-water mark the source's reads are suspended, and they resume
///   when the destination has drained to half of it
/// - an optional cap on bytes forwarded; after the write that crosses it the
///   direction only drains, discarding everything for the rest of its life
///
/// # Examples
///
/// ```rust
/// use gatelink::observability::ProxyMetrics;
/// use gatelink::service::AttachedSessionManager;
/// use gatelink::transport::memory::MemorySession;
/// use gatelink::transport::NoopHandler;
/// use std::sync::Arc;
///
/// let client = MemorySession::new(None, Arc::new(NoopHandler));
/// let backend = MemorySession::new(None, Arc::new(NoopHandler));
/// let manager = AttachedSessionManager::new(
///     client.clone(),
///     backend.clone(),
///     64_000,
///     10,
///     Arc::new(ProxyMetrics::new()),
/// );
///
/// manager.write_message(b"0123456789ab".to_vec().into());
/// manager.write_message(b"dropped".to_vec().into());
///
/// assert_eq!(backend.written().len(), 1);
/// assert!(manager.is_drain_only());
/// ```
pub struct AttachedSessionManager {
    source: SessionRef,
    destination: SessionRef,
    window: WriteWindow,
    cap: TransferCap,
    metrics: Arc<ProxyMetrics>,
    me: Weak<AttachedSessionManager>,
}

impl AttachedSessionManager {
    /// Creates the manager for messages flowing from `source` to
    /// `destination`.
    ///
    /// A negative `maximum_transferred_bytes` means unlimited.
    pub fn new(
        source: SessionRef,
        destination: SessionRef,
        maximum_pending_bytes: u64,
        maximum_transferred_bytes: i64,
        metrics: Arc<ProxyMetrics>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            source,
            destination,
            window: WriteWindow::new(maximum_pending_bytes),
            cap: TransferCap::new(maximum_transferred_bytes),
            metrics,
            me: me.clone(),
        })
    }

    /// Forwards `message` to the destination, subject to the transfer cap
    /// and backpressure.
    pub fn write_message(&self, message: Message) {
        let len = message.len();
        match self.cap.admit(len) {
            Admission::Discard => {
                trace!(source = %self.source.id(), len, "drain only, discarding message");
                self.metrics.record_discarded(len as u64);
                return;
            }
            Admission::ForwardThenDrain => {
                info!(
                    source = %self.source.id(),
                    destination = %self.destination.id(),
                    transferred = self.cap.transferred(),
                    "transfer limit reached, draining from now on"
                );
            }
            Admission::Forward => {}
        }

        if self.window.on_write_scheduled(len) == FlowSignal::SuspendRead {
            debug!(
                source = %self.source.id(),
                scheduled = self.window.scheduled_bytes(),
                "suspending reads, destination backed up"
            );
            self.source.suspend_read();
            self.metrics.record_read_suspended();
        }
        self.metrics.record_forwarded(len as u64);

        let mut write = self.destination.write(message);
        if let Some(result) = (&mut write).now_or_never() {
            self.on_write_complete(len, result);
            return;
        }
        match Handle::try_current() {
            Ok(runtime) => {
                let me = self.me.clone();
                runtime.spawn(async move {
                    let result = write.await;
                    if let Some(manager) = me.upgrade() {
                        manager.on_write_complete(len, result);
                    }
                });
            }
            Err(_) => {
                error!(
                    destination = %self.destination.id(),
                    "no tokio runtime to await write completion, releasing bytes"
                );
                self.on_write_complete(len, Ok(()));
            }
        }
    }

    fn on_write_complete(&self, len: usize, result: Result<(), TransportError>) {
        if let Err(error) = result {
            debug!(destination = %self.destination.id(), %error, "forwarded write failed");
            self.metrics.record_write_failure();
        }
        if self.window.on_write_completed(len) == FlowSignal::ResumeRead {
            debug!(
                source = %self.source.id(),
                scheduled = self.window.scheduled_bytes(),
                "resuming reads, destination drained"
            );
            self.source.resume_read();
            self.metrics.record_read_resumed();
        }
    }

    /// The session messages come from.
    pub fn source(&self) -> &SessionRef {
        &self.source
    }

    /// The session messages go to.
    pub fn destination(&self) -> &SessionRef {
        &self.destination
    }

    /// Bytes written to the destination but not yet flushed.
    pub fn scheduled_write_bytes(&self) -> u64 {
        self.window.scheduled_bytes()
    }

    /// Returns `true` while the source's reads are suspended.
    pub fn is_read_suspended(&self) -> bool {
        self.window.is_read_suspended()
    }

    /// Returns `true` once this direction discards everything.
    pub fn is_drain_only(&self) -> bool {
        self.cap.is_drain_only()
    }

    /// Snapshot of this direction's flow control.
    pub fn flow_metrics(&self) -> FlowMetrics {
        FlowMetrics {
            scheduled_bytes: self.window.scheduled_bytes(),
            maximum_pending_bytes: self.window.maximum_pending_bytes(),
            transferred_bytes: self.cap.transferred(),
            transfer_limit: self.cap.limit(),
            read_suspended: self.window.is_read_suspended(),
        }
    }
}

impl fmt::Debug for AttachedSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedSessionManager")
            .field("source", &self.source.id())
            .field("destination", &self.destination.id())
            .field("flow", &self.flow_metrics())
            .finish()
    }
}
