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

//! Hooks into the service that owns a proxy.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle of the service that accepts client sessions.
///
/// When the backend becomes unreachable the proxy quiesces its owning
/// service so it stops accepting work it cannot fulfil, and starts it again
/// once the backend answers.
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Stop accepting new sessions, letting existing ones drain.
    async fn quiesce(&self);

    /// Resume accepting sessions.
    async fn start(&self);
}

/// A lifecycle that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLifecycle;

#[async_trait]
impl ServiceLifecycle for NoopLifecycle {
    async fn quiesce(&self) {}

    async fn start(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleCommand {
    Quiesce,
    Start,
}

/// Runs lifecycle transitions one at a time, in the order requested.
///
/// Transitions are requested from I/O callbacks that must not block, so
/// they are queued to a task on the tokio runtime current at construction.
pub struct LifecycleDriver {
    commands: Option<mpsc::UnboundedSender<LifecycleCommand>>,
}

impl LifecycleDriver {
    /// Spawns the driver task for `lifecycle`.
    ///
    /// Without a current tokio runtime the driver is inert and requested
    /// transitions are dropped with a warning.
    pub fn new(lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime available, service lifecycle hooks are disabled");
            return Self { commands: None };
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        runtime.spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    LifecycleCommand::Quiesce => {
                        warn!("quiescing service, backend unreachable");
                        lifecycle.quiesce().await;
                    }
                    LifecycleCommand::Start => {
                        info!("starting service, backend reachable");
                        lifecycle.start().await;
                    }
                }
            }
            debug!("lifecycle driver stopped");
        });
        Self { commands: Some(tx) }
    }

    /// Requests that the service be quiesced.
    pub fn quiesce(&self) {
        self.send(LifecycleCommand::Quiesce);
    }

    /// Requests that the service be started.
    pub fn start(&self) {
        self.send(LifecycleCommand::Start);
    }

    fn send(&self, command: LifecycleCommand) {
        match &self.commands {
            Some(commands) => {
                if commands.send(command).is_err() {
                    warn!(?command, "lifecycle driver is gone, dropping transition");
                }
            }
            None => warn!(?command, "no lifecycle driver, dropping transition"),
        }
    }
}

impl fmt::Debug for LifecycleDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleDriver")
            .field("running", &self.commands.is_some())
            .finish()
    }
}
