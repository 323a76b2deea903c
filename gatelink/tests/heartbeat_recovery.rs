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

//! Integration tests for the heartbeat and circuit breaker of the connect
//! manager.
//!
//! A [`ManualScheduler`] stands in for the timer so every heartbeat attempt
//! is run explicitly and its requested delay can be checked.

mod common;

use common::RecordingLifecycle;
use gatelink::reconnection::ConnectivityState;
use gatelink::service::ServiceConnectManager;
use gatelink::transport::memory::{ConnectMode, MemoryConnector};
use gatelink::transport::{
    InlineWorkers, ManualScheduler, Session, SessionInitializer, SessionRef, WorkerId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn secs(delays: Vec<Duration>) -> Vec<u64> {
    delays.into_iter().map(|delay| delay.as_secs()).collect()
}

fn manager(
    connector: &Arc<MemoryConnector>,
    scheduler: &Arc<ManualScheduler>,
    prepared: usize,
) -> ServiceConnectManager {
    common::init_tracing();
    ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .workers(Arc::new(InlineWorkers::new(1)))
        .scheduler(scheduler.clone())
        .prepared_connections(prepared)
        .recovery_interval(Duration::from_secs(4))
        .build()
        .unwrap()
}

/// Test that heartbeat delays back off exponentially up to the interval.
#[test]
fn test_heartbeat_backoff_is_capped() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 0);
    manager.start();

    assert_eq!(scheduler.run_until_idle(5), 5);
    assert_eq!(secs(scheduler.delays()), vec![0, 1, 2, 4, 4, 4]);
    assert_eq!(manager.connectivity_state(), ConnectivityState::Disconnected);
    assert_eq!(manager.connect_statistics().ping_failures(), 5);
    assert_eq!(manager.connect_statistics().connect_failures(), 0);
}

/// Test that a successful ping reconnects the service and resets the backoff.
#[test]
fn test_successful_ping_resets_backoff() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 0);
    manager.start();

    scheduler.run_until_idle(3);
    assert!(!manager.is_service_connected());

    connector.set_mode(ConnectMode::Accept);
    assert!(scheduler.run_next());
    assert!(manager.is_service_connected());
    assert_eq!(secs(scheduler.delays()), vec![0, 1, 2, 4, 0]);
    assert_eq!(manager.connectivity_state(), ConnectivityState::Probing);

    // The probe session is closed straight away.
    assert_eq!(connector.open_sessions(), 0);
    assert_eq!(manager.connect_statistics().ping_successes(), 1);
}

/// Test that heartbeat probes skip the tracker and the session initializer.
#[test]
fn test_heartbeat_probe_is_not_a_backend_session() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let initializer: SessionInitializer = Arc::new(move |_: &SessionRef| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .scheduler(scheduler.clone())
        .session_initializer(initializer)
        .recovery_interval(Duration::from_secs(4))
        .build()
        .unwrap();
    manager.start();

    assert!(scheduler.run_next());
    assert_eq!(connector.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.open_sessions(), 0);
    assert!(manager.is_heartbeat_running());
}

/// Test that the heartbeat pauses while backend sessions are open.
#[test]
fn test_heartbeat_paused_while_sessions_open() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 0);
    manager.start();
    assert!(manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 1);

    let session = manager
        .get_next_connect_future(Some(WorkerId::new(0)), None)
        .session()
        .unwrap();
    assert_eq!(manager.open_sessions(), 1);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(manager.connectivity_state(), ConnectivityState::Connected);

    session.close(true);
    assert_eq!(manager.open_sessions(), 0);
    assert!(manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 1);
}

/// Test that warm pool sessions keep the heartbeat idle from the start.
#[test]
fn test_heartbeat_idle_while_pool_open() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 1);
    manager.start();

    assert_eq!(manager.open_sessions(), 1);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(manager.connectivity_state(), ConnectivityState::Connected);

    // Claiming the warm session refills the pool; probing stays off.
    let session = manager
        .get_next_connect_future(Some(WorkerId::new(0)), None)
        .session()
        .unwrap();
    assert_eq!(manager.open_sessions(), 2);
    session.close(true);
    assert_eq!(manager.open_sessions(), 1);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);
}

/// Test that stopping the manager cancels the heartbeat and closing the
/// pooled sessions does not bring it back.
#[test]
fn test_stop_cancels_heartbeat() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 1);
    manager.start();
    assert_eq!(connector.attempts(), 1);

    manager.stop();
    assert_eq!(manager.open_sessions(), 0);
    assert_eq!(connector.open_sessions(), 0);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);
    assert!(!scheduler.run_next());
    assert_eq!(connector.attempts(), 1);
}

/// Test that a session handed out before stop does not restart the
/// heartbeat when it closes afterwards.
#[test]
fn test_close_after_stop_keeps_heartbeat_stopped() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 0);
    manager.start();
    assert!(manager.is_heartbeat_running());

    let session = manager
        .get_next_connect_future(Some(WorkerId::new(0)), None)
        .session()
        .unwrap();
    assert!(!manager.is_heartbeat_running());

    manager.stop();
    session.close(true);
    assert_eq!(manager.open_sessions(), 0);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);

    // Starting again resumes probing.
    manager.start();
    assert!(manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 1);
}

/// Test that a connector shutting down stops the heartbeat for good.
#[test]
fn test_shutdown_error_stops_heartbeat() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 0);
    manager.start();
    assert!(scheduler.run_next());

    connector.set_mode(ConnectMode::ShuttingDown);
    assert!(scheduler.run_next());
    assert!(!manager.is_heartbeat_running());
    assert_eq!(scheduler.pending(), 0);
    assert!(!scheduler.run_next());
}

/// Test that a connect refused by a shutting-down connector does not trip
/// the breaker.
#[test]
fn test_shutdown_connect_failure_does_not_disconnect() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::ShuttingDown);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 1);
    manager.start();

    assert_eq!(manager.connect_statistics().connect_failures(), 1);
    assert!(manager.is_service_connected());
}

/// Test that a failed pool fill starts the heartbeat and a successful ping
/// refills the pool.
#[test]
fn test_recovery_refills_pools() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = manager(&connector, &scheduler, 1);
    manager.start();

    assert!(!manager.is_service_connected());
    assert!(manager.is_heartbeat_running());
    assert_eq!(manager.prepared_connection_count(), 0);

    connector.set_mode(ConnectMode::Accept);
    assert!(scheduler.run_next());
    assert!(manager.is_service_connected());
    assert_eq!(manager.prepared_connection_count(), 1);

    // The pooled session is open, so probing stops.
    assert_eq!(manager.open_sessions(), 1);
    assert!(!manager.is_heartbeat_running());
    assert_eq!(manager.connectivity_state(), ConnectivityState::Connected);
}

/// Test that losing and regaining the backend quiesces and restarts the
/// owning service, in order.
#[tokio::test]
async fn test_lifecycle_follows_backend() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let scheduler = Arc::new(ManualScheduler::new());
    let lifecycle = RecordingLifecycle::new();
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .scheduler(scheduler.clone())
        .lifecycle(lifecycle.clone())
        .recovery_interval(Duration::from_secs(4))
        .build()
        .unwrap();
    manager.start();

    assert!(scheduler.run_next());
    assert!(scheduler.run_next());
    connector.set_mode(ConnectMode::Accept);
    assert!(scheduler.run_next());
    common::settle().await;

    // Repeated failures quiesce only once.
    assert_eq!(lifecycle.events(), vec!["quiesce", "start"]);

    let snapshot = manager.statistics();
    assert!(snapshot.service_connected);
    assert_eq!(snapshot.ping_failures, 2);
    assert_eq!(snapshot.ping_successes, 1);
}

/// Test that a disabled recovery interval never quiesces the service.
#[tokio::test]
async fn test_no_recovery_interval_never_quiesces() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let lifecycle = RecordingLifecycle::new();
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .lifecycle(lifecycle.clone())
        .prepared_connections(1)
        .build()
        .unwrap();
    manager.start();
    common::settle().await;

    assert!(!manager.is_service_connected());
    assert!(!manager.is_heartbeat_running());
    assert!(lifecycle.events().is_empty());
}
