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

//! Proxies in-memory clients to an in-memory backend on real Tokio workers.
//!
//! # Features Demonstrated
//! - Prepared connections spread over two workers
//! - Bridging a client to a warm backend connection
//! - Quiescing and restarting the service when the backend goes away
//!
//! # Running the Example
//! ```bash
//! RUST_LOG=gatelink=debug cargo run --example memory_proxy
//! ```

use gatelink::service::{ProxyConfig, ProxyServiceBuilder, ServiceLifecycle};
use gatelink::transport::memory::{ConnectMode, MemoryConnector, MemorySession};
use gatelink::transport::{Session, TokioScheduler, TokioWorkers, WorkerId};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct LoggingLifecycle;

#[async_trait::async_trait]
impl ServiceLifecycle for LoggingLifecycle {
    async fn quiesce(&self) {
        println!("lifecycle: quiesce");
    }

    async fn start(&self) {
        println!("lifecycle: start");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = Arc::new(MemoryConnector::new());
    let service = ProxyServiceBuilder::new("memory://backend")
        .with_connector(backend.clone())
        .with_workers(Arc::new(TokioWorkers::new(2)))
        .with_scheduler(Arc::new(TokioScheduler))
        .with_lifecycle(Arc::new(LoggingLifecycle))
        .with_config(
            ProxyConfig::new()
                .with_prepared_connection_count(2)
                .with_maximum_recovery_interval(Duration::from_secs(2)),
        )
        .build()?;
    service.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("prepared: {}", service.statistics().prepared_connections);

    let client = MemorySession::new(Some(WorkerId::new(0)), service.accept_handler());
    client.open();
    client.receive(&b"hello backend"[..]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("forwarded bytes: {}", service.metrics().bytes_forwarded());
    client.close(false);

    // Take the backend down and watch the heartbeat bring the service back.
    backend.set_mode(ConnectMode::Refuse);
    let client = MemorySession::new(None, service.accept_handler());
    client.open();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("state: {}", service.statistics().state);

    backend.set_mode(ConnectMode::Accept);
    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("state: {}", service.statistics().state);
    println!("{}", serde_json::to_string_pretty(&service.statistics())?);

    service.stop();
    Ok(())
}
