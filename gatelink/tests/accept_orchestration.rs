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

//! Integration tests for accept-side orchestration: obtaining a backend
//! session for each client, bridging the pair and tearing it down.

mod common;

use gatelink::service::{
    ConnectStrategyKind, ProxyConfig, ProxyService, ProxyServiceBuilder, ProxyServiceExtension,
    ServiceConnectManager,
};
use gatelink::transport::memory::{ConnectMode, MemoryConnector, MemorySession};
use gatelink::transport::{
    InlineWorkers, IoWorkers, ManualScheduler, Message, Session, SessionRef, Task,
    TransportError, WorkerId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn service(connector: &Arc<MemoryConnector>, config: ProxyConfig) -> ProxyService {
    common::init_tracing();
    let service = ProxyServiceBuilder::new("memory://backend")
        .with_connector(connector.clone())
        .with_workers(Arc::new(InlineWorkers::new(1)))
        .with_config(config)
        .build()
        .unwrap();
    service.start();
    service
}

fn client(service: &ProxyService) -> Arc<MemorySession> {
    MemorySession::new(Some(WorkerId::new(0)), service.accept_handler())
}

fn bytes(messages: &[&'static [u8]]) -> Vec<Message> {
    messages.iter().map(|message| Message::from(*message)).collect()
}

/// Test that messages sent before the backend connects arrive in order.
#[test]
fn test_queued_messages_flush_in_order() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Hold);
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();

    client.receive(&b"one"[..]);
    client.receive(&b"two"[..]);
    client.receive(&b"three"[..]);
    assert_eq!(service.metrics().messages_queued(), 3);

    assert!(connector.release_one());
    client.receive(&b"four"[..]);
    let backend = connector.sessions()[0].clone();
    assert_eq!(backend.written(), bytes(&[b"one", b"two", b"three", b"four"]));
    assert_eq!(service.metrics().active_pairs(), 1);
}

/// Test that a client closing before the backend connects fails the
/// connect and closes the late backend session.
#[test]
fn test_client_close_while_connecting() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Hold);
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();
    assert_eq!(connector.held_connects(), 1);

    client.close(false);
    assert!(connector.release_one());
    assert_eq!(connector.sessions().len(), 1);
    assert_eq!(connector.open_sessions(), 0);
    assert_eq!(service.proxy_handler().live_contexts(), 0);

    // The backend did answer, so the breaker stays closed.
    let statistics = service.statistics();
    assert!(statistics.service_connected);
    assert_eq!(statistics.connect_successes, 1);
    assert_eq!(service.metrics().active_pairs(), 0);
}

/// Test that a failed backend connect closes the client gracefully.
#[test]
fn test_connect_failure_closes_client() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Refuse);
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();

    assert!(client.is_closed());
    assert!(!client.was_closed_immediately());
    assert_eq!(service.proxy_handler().live_contexts(), 0);
    assert!(!service.statistics().service_connected);
}

/// Test that a held connect that fails closes the client.
#[test]
fn test_late_connect_failure_closes_client() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Hold);
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();
    client.receive(&b"queued"[..]);
    assert!(!client.is_closed());

    assert!(connector.fail_one());
    assert!(client.is_closed());
    assert_eq!(service.proxy_handler().live_contexts(), 0);
}

/// Test that closing the client closes the backend immediately.
#[test]
fn test_client_close_closes_backend() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();
    let backend = connector.sessions()[0].clone();

    client.close(false);
    assert!(backend.is_closed());
    assert!(backend.was_closed_immediately());
    assert_eq!(service.metrics().active_pairs(), 0);
    assert_eq!(service.proxy_handler().live_contexts(), 0);
    assert_eq!(service.connect_manager().open_sessions(), 0);
}

/// Test that the backend closing closes the client.
#[test]
fn test_backend_close_closes_client() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();
    let backend = connector.sessions()[0].clone();

    backend.close(false);
    assert!(client.is_closed());
    assert!(client.was_closed_immediately());
    assert_eq!(service.metrics().active_pairs(), 0);
    assert_eq!(service.proxy_handler().live_contexts(), 0);
}

/// Test that the deferred strategy connects only once the client shows
/// traffic, and still delivers that traffic.
#[test]
fn test_deferred_connect_waits_for_traffic() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(
        &connector,
        ProxyConfig::new().with_connect_strategy(ConnectStrategyKind::Deferred),
    );
    let client = client(&service);
    client.open();
    assert_eq!(connector.attempts(), 0);

    client.receive(&b"hello"[..]);
    assert_eq!(connector.attempts(), 1);
    let backend = connector.sessions()[0].clone();
    assert_eq!(backend.written(), bytes(&[b"hello"]));
}

/// Test that a deferred client that only idles still gets a backend.
#[test]
fn test_deferred_connect_on_idle() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(
        &connector,
        ProxyConfig::new().with_connect_strategy(ConnectStrategyKind::Deferred),
    );
    let client = client(&service);
    client.open();
    client.idle();
    assert_eq!(connector.attempts(), 1);
    assert_eq!(service.metrics().active_pairs(), 1);
}

/// Test that a deferred client closing without traffic never connects.
#[test]
fn test_deferred_client_close_without_traffic() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(
        &connector,
        ProxyConfig::new().with_connect_strategy(ConnectStrategyKind::Deferred),
    );
    let client = client(&service);
    client.open();
    client.close(false);
    assert_eq!(connector.attempts(), 0);
    assert_eq!(service.proxy_handler().live_contexts(), 0);
}

/// Test that a prepared service bridges clients to warm connections.
#[test]
fn test_prepared_strategy_uses_warm_connection() {
    let connector = Arc::new(MemoryConnector::new());
    let service = service(&connector, ProxyConfig::new().with_prepared_connection_count(1));
    assert_eq!(service.strategy().kind(), ConnectStrategyKind::Prepared);
    assert_eq!(connector.attempts(), 1);

    let client = client(&service);
    client.open();
    let backend = connector.sessions()[0].clone();
    client.receive(&b"warm"[..]);
    assert_eq!(backend.written(), bytes(&[b"warm"]));

    // The pool was refilled behind the claim.
    assert_eq!(connector.attempts(), 2);
    assert_eq!(service.statistics().prepared_connections, 1);
}

#[derive(Default)]
struct RecordingExtension {
    events: Mutex<Vec<&'static str>>,
}

impl ProxyServiceExtension for RecordingExtension {
    fn init_accept_session(&self, _accept: &SessionRef) {
        self.events.lock().push("init_accept_session");
    }

    fn init_connect_session(&self, _connect: &SessionRef) {
        self.events.lock().push("init_connect_session");
    }

    fn proxied_connection_established(&self, accept: &SessionRef, connect: &SessionRef) {
        assert!(!accept.is_closing());
        assert!(!connect.is_closing());
        self.events.lock().push("proxied_connection_established");
    }
}

/// Test that extension hooks run at each step, in order.
#[test]
fn test_extension_hooks_run_in_order() {
    let connector = Arc::new(MemoryConnector::new());
    let extension = Arc::new(RecordingExtension::default());
    common::init_tracing();
    let service = ProxyServiceBuilder::new("memory://backend")
        .with_connector(connector.clone())
        .with_extension(extension.clone())
        .build()
        .unwrap();
    service.start();

    client(&service).open();
    assert_eq!(
        *extension.events.lock(),
        vec![
            "init_accept_session",
            "init_connect_session",
            "proxied_connection_established"
        ]
    );
}

/// Workers that accept jobs and never run them.
struct StalledWorkers;

impl IoWorkers for StalledWorkers {
    fn worker_count(&self) -> usize {
        2
    }

    fn execute(&self, _worker: WorkerId, _job: Task) {}
}

/// Test that an off-worker caller times out when no worker hands off.
#[test]
fn test_hand_off_times_out() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .workers(Arc::new(StalledWorkers))
        .scheduler(scheduler.clone())
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    manager.start();

    let future = manager.get_next_connect_future(None, None);
    assert!(!future.is_done());
    assert_eq!(scheduler.next_delay(), Some(Duration::from_secs(5)));

    assert!(scheduler.run_next());
    let error = future.error().unwrap();
    assert!(matches!(
        *error,
        TransportError::Timeout { duration } if duration == Duration::from_secs(5)
    ));
    assert_eq!(connector.attempts(), 0);
    assert!(manager.is_service_connected());
}

/// Test that a completed hand-off cancels its timeout.
#[test]
fn test_hand_off_cancels_timeout() {
    let connector = Arc::new(MemoryConnector::new());
    let scheduler = Arc::new(ManualScheduler::new());
    common::init_tracing();
    let manager = ServiceConnectManager::builder("memory://backend")
        .connector(connector.clone())
        .workers(Arc::new(InlineWorkers::new(2)))
        .scheduler(scheduler.clone())
        .build()
        .unwrap();
    manager.start();

    let future = manager.get_next_connect_future(None, None);
    assert!(future.is_connected());
    assert_eq!(scheduler.pending(), 0);

    // A caller claiming a worker that does not exist is placed at random.
    let future = manager.get_next_connect_future(Some(WorkerId::new(7)), None);
    assert!(future.is_connected());
    assert_eq!(connector.attempts(), 2);
}

/// Test that a caller failing its future early is not counted as a backend
/// failure.
#[tokio::test]
async fn test_wait_reports_accept_closed() {
    let connector = Arc::new(MemoryConnector::new());
    connector.set_mode(ConnectMode::Hold);
    let service = service(&connector, ProxyConfig::new());
    let client = client(&service);
    client.open();

    let manager = service.connect_manager();
    let pending = manager.get_next_connect_future(Some(WorkerId::new(0)), None);
    assert!(pending.set_error(TransportError::AcceptClosed));
    let error = pending.wait().await.unwrap_err();
    assert!(matches!(*error, TransportError::AcceptClosed));

    while connector.release_one() {}
    assert!(manager.is_service_connected());
    assert_eq!(manager.connect_statistics().connect_failures(), 0);
    assert_eq!(manager.connect_statistics().connect_successes(), 2);
}
