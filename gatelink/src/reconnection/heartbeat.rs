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

//! Heartbeat scheduling and open-session tracking.

use crate::reconnection::HeartbeatBackoff;
use crate::transport::{
    NextFilter, ScheduledTask, Scheduler, SessionEvent, SessionFilter, SessionRef,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Name of the filter that counts open backend sessions.
pub const HEARTBEAT_FILTER: &str = "gatelink.heartbeat";

/// Callback run for each heartbeat attempt, given the cycle it belongs to.
pub type HeartbeatTick = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct ScheduleState {
    task: Option<ScheduledTask>,
    running: bool,
    cycle: u64,
}

/// Drives the periodic heartbeat for one backend.
///
/// A heartbeat runs in cycles. [`start`](Self::start) opens a new cycle and
/// schedules its first attempt; each attempt, once finished, asks for the
/// next one with [`reschedule`](Self::reschedule), passing the cycle it was
/// started for. Attempts from a cycle that has since been stopped or
/// replaced are ignored, so at most one chain of attempts is ever live.
pub struct HeartbeatSchedule {
    scheduler: Arc<dyn Scheduler>,
    backoff: HeartbeatBackoff,
    tick: HeartbeatTick,
    state: Mutex<ScheduleState>,
}

impl HeartbeatSchedule {
    /// Creates a stopped schedule whose delays are capped at `interval`.
    pub fn new(scheduler: Arc<dyn Scheduler>, interval: Duration, tick: HeartbeatTick) -> Self {
        Self {
            scheduler,
            backoff: HeartbeatBackoff::new(interval),
            tick,
            state: Mutex::new(ScheduleState::default()),
        }
    }

    /// Starts a new cycle unless one is running. Returns `true` if started.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            return false;
        }
        state.running = true;
        state.cycle += 1;
        debug!(cycle = state.cycle, "starting heartbeat");
        self.schedule_locked(&mut state);
        true
    }

    /// Schedules the next attempt of `cycle` if that cycle is still live.
    pub fn reschedule(&self, cycle: u64) -> bool {
        let mut state = self.state.lock();
        if !state.running || state.cycle != cycle {
            return false;
        }
        self.schedule_locked(&mut state);
        true
    }

    /// Stops the running cycle and cancels its pending attempt.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if let Some(task) = state.task.take() {
            task.cancel();
        }
        if !state.running {
            return false;
        }
        state.running = false;
        debug!(cycle = state.cycle, "stopping heartbeat");
        true
    }

    /// Returns `true` if `cycle` is the live cycle.
    pub fn is_current(&self, cycle: u64) -> bool {
        let state = self.state.lock();
        state.running && state.cycle == cycle
    }

    /// Returns `true` while a cycle is running.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// The backoff shared by every cycle.
    pub fn backoff(&self) -> &HeartbeatBackoff {
        &self.backoff
    }

    fn schedule_locked(&self, state: &mut ScheduleState) {
        let delay = self.backoff.next_delay();
        let cycle = state.cycle;
        let tick = self.tick.clone();
        trace!(cycle, ?delay, "scheduling heartbeat attempt");
        state.task = Some(self.scheduler.schedule(delay, Box::new(move || tick(cycle))));
    }
}

impl fmt::Debug for HeartbeatSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeartbeatSchedule")
            .field("running", &state.running)
            .field("cycle", &state.cycle)
            .field("next_delay", &self.backoff.peek())
            .finish()
    }
}

/// Counts open backend sessions and pauses the heartbeat while any exist.
///
/// Real traffic is proof enough that the backend is alive; probing resumes
/// when the last session closes. A disabled tracker keeps counting but never
/// resumes the heartbeat.
#[derive(Debug)]
pub struct SessionTracker {
    open: AtomicUsize,
    enabled: AtomicBool,
    heartbeat: Option<Weak<HeartbeatSchedule>>,
}

impl SessionTracker {
    /// Creates an enabled tracker that drives `heartbeat`, if one is
    /// configured.
    pub fn new(heartbeat: Option<Weak<HeartbeatSchedule>>) -> Self {
        Self {
            open: AtomicUsize::new(0),
            enabled: AtomicBool::new(true),
            heartbeat,
        }
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Allows or forbids the tracker to resume the heartbeat.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns `true` if the tracker may resume the heartbeat.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Starts the heartbeat if the tracker is enabled and no session is open.
    ///
    /// Returns `true` if the heartbeat is running afterwards.
    pub fn resume_heartbeat(&self) -> bool {
        let Some(heartbeat) = self.heartbeat.as_ref().and_then(Weak::upgrade) else {
            return false;
        };
        if !self.is_enabled() || self.open_sessions() > 0 {
            return heartbeat.is_running();
        }
        heartbeat.start();
        // A session opened while starting saw nothing to stop.
        if self.open_sessions() > 0 {
            heartbeat.stop();
        }
        heartbeat.is_running()
    }

    /// Creates the per-session filter that reports to this tracker.
    pub fn filter(self: &Arc<Self>) -> Arc<dyn SessionFilter> {
        Arc::new(HeartbeatFilter {
            tracker: self.clone(),
            opened: AtomicBool::new(false),
        })
    }

    fn on_opened(&self) {
        if self.open.fetch_add(1, Ordering::AcqRel) == 0 {
            if let Some(heartbeat) = self.heartbeat.as_ref().and_then(Weak::upgrade) {
                heartbeat.stop();
            }
        }
    }

    fn on_closed(&self) {
        let previous = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| open.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            self.resume_heartbeat();
        }
    }
}

struct HeartbeatFilter {
    tracker: Arc<SessionTracker>,
    opened: AtomicBool,
}

impl SessionFilter for HeartbeatFilter {
    fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
        match event {
            SessionEvent::Opened => {
                if !self.opened.swap(true, Ordering::AcqRel) {
                    self.tracker.on_opened();
                }
            }
            SessionEvent::Closed => {
                if self.opened.swap(false, Ordering::AcqRel) {
                    self.tracker.on_closed();
                }
            }
            _ => {}
        }
        next.fire(session, event);
    }
}
