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

//! Flow-control metrics snapshot.

use serde::Serialize;

/// Point-in-time view of one bridged direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlowMetrics {
    /// Bytes written to the destination but not yet flushed
    pub scheduled_bytes: u64,

    /// High-water mark for `scheduled_bytes`
    pub maximum_pending_bytes: u64,

    /// Bytes admitted past the transfer cap
    pub transferred_bytes: u64,

    /// Current transfer limit (negative means unlimited)
    pub transfer_limit: i64,

    /// Whether reads on the source are suspended
    pub read_suspended: bool,
}

impl FlowMetrics {
    /// Returns `true` once the direction discards everything.
    pub fn is_drain_only(&self) -> bool {
        self.transfer_limit == 0
    }

    /// Pending bytes as a percentage of the high-water mark.
    pub fn utilization_percent(&self) -> f64 {
        if self.maximum_pending_bytes == 0 {
            0.0
        } else {
            (self.scheduled_bytes as f64 / self.maximum_pending_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let metrics = FlowMetrics {
            scheduled_bytes: 250,
            maximum_pending_bytes: 1000,
            ..FlowMetrics::default()
        };
        assert!((metrics.utilization_percent() - 25.0).abs() < f64::EPSILON);
        assert_eq!(FlowMetrics::default().utilization_percent(), 0.0);
    }
}
