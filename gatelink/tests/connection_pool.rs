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

//! Integration tests for prepared connection pools behind the connect
//! manager.

mod common;

use gatelink::service::ServiceConnectManager;
use gatelink::transport::memory::{ConnectMode, MemoryConnector};
use gatelink::transport::{InlineWorkers, Session, SessionInitializer, SessionRef, WorkerId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn manager(
    connector: &Arc<MemoryConnector>,
    workers: usize,
    prepared: usize,
) -> ServiceConnectManager {
    common::init_tracing();
    ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .workers(Arc::new(InlineWorkers::new(workers)))
        .prepared_connections(prepared)
        .build()
        .unwrap()
}

/// Test that the prepared count is spread over the workers, remainder first.
#[test]
fn test_prepared_connections_spread_over_workers() {
    let connector = Arc::new(MemoryConnector::new());
    let manager = manager(&connector, 2, 5);
    manager.start();

    let first = manager.pool(WorkerId::new(0)).unwrap();
    let second = manager.pool(WorkerId::new(1)).unwrap();
    assert_eq!(first.target_prepared_count(), 3);
    assert_eq!(second.target_prepared_count(), 2);
    assert_eq!(manager.prepared_connection_count(), 5);
    assert_eq!(connector.attempts(), 5);
    assert!(manager.shared_pool().is_none());
}

/// Test that an aligned caller claims from its own pool, which refills.
#[test]
fn test_aligned_caller_claims_from_own_pool() {
    let connector = Arc::new(MemoryConnector::new());
    let manager = manager(&connector, 2, 4);
    manager.start();

    let future = manager.get_next_connect_future(Some(WorkerId::new(1)), None);
    let session = future.session().unwrap();
    assert_eq!(session.worker(), Some(WorkerId::new(1)));
    assert_eq!(manager.prepared_connection_count(), 4);
    assert_eq!(connector.attempts(), 5);
}

/// Test that the caller's initializer runs on a pooled session when claimed.
#[test]
fn test_initializer_runs_at_claim() {
    let connector = Arc::new(MemoryConnector::new());
    let manager = manager(&connector, 1, 1);
    manager.start();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let initializer: SessionInitializer = Arc::new(move |_: &SessionRef| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let future = manager.get_next_connect_future(Some(WorkerId::new(0)), Some(initializer));
    assert!(future.is_connected());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!future
        .session()
        .unwrap()
        .filter_chain()
        .contains(gatelink::pool::POOL_ENTRY_FILTER));
}

/// Test that a failed preconnect pauses the pool until the backend answers.
#[test]
fn test_preconnect_failure_pauses_pool() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let manager = manager(&connector, 1, 2);
    manager.start();

    let pool = manager.pool(WorkerId::new(0)).unwrap();
    assert!(!pool.is_active());
    assert_eq!(pool.current_prepared_count(), 0);
    assert_eq!(connector.attempts(), 1);
    assert!(!manager.is_service_connected());

    // Claims while paused connect on demand without refilling.
    let future = manager.get_next_connect_future(Some(WorkerId::new(0)), None);
    assert!(future.error().is_some());
    assert_eq!(connector.attempts(), 2);

    // The first success restarts the pool.
    connector.set_mode(ConnectMode::Accept);
    let future = manager.get_next_connect_future(Some(WorkerId::new(0)), None);
    assert!(future.is_connected());
    assert!(manager.is_service_connected());
    assert!(pool.is_active());
    assert_eq!(pool.current_prepared_count(), 2);
    assert_eq!(connector.attempts(), 5);
}

/// Test that a pooled session closed before it is claimed leaves the pool.
#[test]
fn test_closed_pooled_session_leaves_pool() {
    let connector = Arc::new(MemoryConnector::new());
    let manager = manager(&connector, 1, 2);
    manager.start();

    let sessions = connector.sessions();
    sessions[0].close(true);
    assert_eq!(manager.prepared_connection_count(), 1);

    let future = manager.get_next_connect_future(Some(WorkerId::new(0)), None);
    assert_eq!(future.session().unwrap().id(), sessions[1].id());
    assert_eq!(manager.prepared_connection_count(), 2);
}

/// Test that a shared pool serves callers from any worker.
#[test]
fn test_shared_pool() {
    let connector = Arc::new(MemoryConnector::new());
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .workers(Arc::new(InlineWorkers::new(4)))
        .prepared_connections(3)
        .thread_aligned(false)
        .build()
        .unwrap();
    manager.start();

    assert!(manager.shared_pool().is_some());
    assert!(manager.pool(WorkerId::new(0)).is_none());
    assert_eq!(manager.prepared_connection_count(), 3);

    let future = manager.get_next_connect_future(None, None);
    assert!(future.is_connected());
    assert_eq!(manager.prepared_connection_count(), 3);
    assert_eq!(connector.attempts(), 4);
}

/// Test that stopping the manager closes unclaimed sessions only.
#[test]
fn test_stop_closes_unclaimed_sessions() {
    let connector = Arc::new(MemoryConnector::new());
    let manager = manager(&connector, 1, 2);
    manager.start();

    let claimed = manager
        .get_next_connect_future(Some(WorkerId::new(0)), None)
        .session()
        .unwrap();
    assert_eq!(connector.open_sessions(), 3);

    manager.stop();
    assert_eq!(manager.prepared_connection_count(), 0);
    assert_eq!(connector.open_sessions(), 1);
    assert!(!claimed.is_closing());
}
