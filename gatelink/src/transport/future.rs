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

//! Completion handle for an asynchronous connect.
//!
//! A [`ConnectFuture`] resolves exactly once, either with the new session or
//! with an error. Completion is first-writer-wins: a session delivered to a
//! future that has already completed is closed immediately, which is how a
//! backend connect that outlives its accept session gets torn down.

use crate::transport::{SessionRef, TransportError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

type Listener = Box<dyn FnOnce(&ConnectFuture) + Send + 'static>;

enum Outcome {
    Pending,
    Connected(SessionRef),
    Failed(Arc<TransportError>),
}

struct State {
    outcome: Outcome,
    listeners: Vec<Listener>,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// Shared handle to the result of a connect attempt.
///
/// Clones refer to the same underlying result. Listeners registered with
/// [`add_listener`](Self::add_listener) run exactly once, on the thread that
/// completes the future, or immediately if the future is already done.
///
/// # Examples
///
/// ```rust
/// use gatelink::transport::{ConnectFuture, TransportError};
///
/// let future = ConnectFuture::new();
/// assert!(!future.is_done());
///
/// assert!(future.set_error(TransportError::AcceptClosed));
/// assert!(future.is_done());
/// assert!(future.session().is_none());
///
/// // Later completions are ignored.
/// assert!(!future.set_error(TransportError::Closed));
/// ```
#[derive(Clone)]
pub struct ConnectFuture {
    inner: Arc<Inner>,
}

impl ConnectFuture {
    /// Creates a pending future.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    outcome: Outcome::Pending,
                    listeners: Vec::new(),
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Creates a future that has already failed with `error`.
    pub fn failed(error: TransportError) -> Self {
        let future = Self::new();
        future.set_error(error);
        future
    }

    /// Creates a future that has already connected.
    pub fn connected(session: SessionRef) -> Self {
        let future = Self::new();
        future.set_session(session);
        future
    }

    /// Returns `true` once the future has a result.
    pub fn is_done(&self) -> bool {
        !matches!(self.inner.state.lock().outcome, Outcome::Pending)
    }

    /// Returns `true` if the future completed with a session.
    pub fn is_connected(&self) -> bool {
        matches!(self.inner.state.lock().outcome, Outcome::Connected(_))
    }

    /// Returns the connected session, if any.
    pub fn session(&self) -> Option<SessionRef> {
        match &self.inner.state.lock().outcome {
            Outcome::Connected(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<Arc<TransportError>> {
        match &self.inner.state.lock().outcome {
            Outcome::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// Completes the future with `session`.
    ///
    /// Returns `false` if the future was already complete, in which case the
    /// session is closed immediately.
    pub fn set_session(&self, session: SessionRef) -> bool {
        let listeners = {
            let mut state = self.inner.state.lock();
            if !matches!(state.outcome, Outcome::Pending) {
                drop(state);
                session.close(true);
                return false;
            }
            state.outcome = Outcome::Connected(session);
            std::mem::take(&mut state.listeners)
        };
        self.complete(listeners);
        true
    }

    /// Completes the future with `error`.
    ///
    /// Returns `false` if the future was already complete.
    pub fn set_error(&self, error: impl Into<Arc<TransportError>>) -> bool {
        let listeners = {
            let mut state = self.inner.state.lock();
            if !matches!(state.outcome, Outcome::Pending) {
                return false;
            }
            state.outcome = Outcome::Failed(error.into());
            std::mem::take(&mut state.listeners)
        };
        self.complete(listeners);
        true
    }

    /// Registers `listener` to run once the future completes.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&ConnectFuture) + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if matches!(state.outcome, Outcome::Pending) {
                state.listeners.push(Box::new(listener));
                return;
            }
        }
        listener(self);
    }

    /// Forwards this future's result into `target` once it completes.
    ///
    /// If `target` has already completed by then, a session delivered here is
    /// closed rather than leaked.
    pub fn forward_to(&self, target: &ConnectFuture) {
        let target = target.clone();
        self.add_listener(move |future| match future.result() {
            Some(Ok(session)) => {
                target.set_session(session);
            }
            Some(Err(error)) => {
                target.set_error(error);
            }
            None => {}
        });
    }

    /// Waits for the future to complete.
    pub async fn wait(&self) -> Result<SessionRef, Arc<TransportError>> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(result) = self.result() {
                return result;
            }
            notified.await;
        }
    }

    fn result(&self) -> Option<Result<SessionRef, Arc<TransportError>>> {
        match &self.inner.state.lock().outcome {
            Outcome::Pending => None,
            Outcome::Connected(session) => Some(Ok(session.clone())),
            Outcome::Failed(error) => Some(Err(error.clone())),
        }
    }

    fn complete(&self, listeners: Vec<Listener>) {
        self.inner.notify.notify_waiters();
        for listener in listeners {
            listener(self);
        }
    }
}

impl Default for ConnectFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner.state.lock().outcome {
            Outcome::Pending => "pending".to_string(),
            Outcome::Connected(session) => format!("connected({})", session.id()),
            Outcome::Failed(error) => format!("failed({error})"),
        };
        f.debug_struct("ConnectFuture").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemorySession;
    use crate::transport::{NoopHandler, Session};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> Arc<MemorySession> {
        MemorySession::new(None, Arc::new(NoopHandler))
    }

    #[test]
    fn test_listener_runs_on_completion() {
        let future = ConnectFuture::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        future.add_listener(move |f| {
            assert!(f.is_connected());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(future.set_session(session()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_runs_immediately_when_done() {
        let future = ConnectFuture::failed(TransportError::Closed);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        future.add_listener(move |f| {
            assert!(f.error().is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_session_is_closed() {
        let future = ConnectFuture::new();
        assert!(future.set_error(TransportError::AcceptClosed));

        let late = session();
        assert!(!future.set_session(late.clone()));
        assert!(late.is_closed());
        assert!(future.session().is_none());
    }

    #[test]
    fn test_forward_to() {
        let source = ConnectFuture::new();
        let target = ConnectFuture::new();
        source.forward_to(&target);

        let s = session();
        source.set_session(s.clone());
        assert_eq!(target.session().map(|t| t.id()), Some(s.id()));
    }

    #[test]
    fn test_forward_to_completed_target_closes_session() {
        let source = ConnectFuture::new();
        let target = ConnectFuture::failed(TransportError::Timeout {
            duration: std::time::Duration::from_secs(1),
        });
        source.forward_to(&target);

        let s = session();
        source.set_session(s.clone());
        assert!(s.is_closed());
    }

    #[tokio::test]
    async fn test_wait() {
        let future = ConnectFuture::new();
        let completer = future.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            completer.set_error(TransportError::Closed);
        });

        match future.wait().await {
            Err(error) => assert!(matches!(*error, TransportError::Closed)),
            Ok(_) => panic!("expected the connect to fail"),
        }
    }
}
