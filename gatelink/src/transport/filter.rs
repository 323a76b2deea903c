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

//! Per-session filter chains.
//!
//! Every event a transport raises on a session travels through the session's
//! [`FilterChain`]: first through each named [`SessionFilter`] in insertion
//! order, then to the session's [`SessionHandler`]. A filter may forward the
//! event unchanged, swallow it, or inject additional events ahead of it.
//!
//! Filters can be added and removed while events are in flight. Each dispatch
//! works on a snapshot of the chain taken when the event entered it, so a
//! filter that removes itself still hands the current event on to the rest of
//! the chain.
//!
//! # Examples
//!
//! ```rust
//! use gatelink::transport::{
//!     FilterChain, NextFilter, NoopHandler, SessionEvent, SessionFilter, SessionRef,
//! };
//! use std::sync::Arc;
//!
//! struct SwallowIdle;
//!
//! impl SessionFilter for SwallowIdle {
//!     fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
//!         if !matches!(event, SessionEvent::Idle) {
//!             next.fire(session, event);
//!         }
//!     }
//! }
//!
//! let chain = FilterChain::new(Arc::new(NoopHandler));
//! assert!(chain.add_last("swallow-idle", Arc::new(SwallowIdle)));
//! assert!(chain.contains("swallow-idle"));
//! assert!(chain.remove("swallow-idle").is_some());
//! ```

use crate::transport::{Message, SessionHandler, SessionRef, TransportError};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// An event raised on a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session was created
    Created,
    /// The session is open for I/O
    Opened,
    /// A message was received
    MessageReceived(Message),
    /// A written message was flushed
    MessageSent(Message),
    /// The session went idle
    Idle,
    /// The session closed
    Closed,
    /// The transport reported an error
    Exception(Arc<TransportError>),
}

impl SessionEvent {
    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Created => "created",
            SessionEvent::Opened => "opened",
            SessionEvent::MessageReceived(_) => "message_received",
            SessionEvent::MessageSent(_) => "message_sent",
            SessionEvent::Idle => "idle",
            SessionEvent::Closed => "closed",
            SessionEvent::Exception(_) => "exception",
        }
    }
}

/// An interceptor on a session's event stream.
pub trait SessionFilter: Send + Sync {
    /// Handles `event`. The default forwards it to the rest of the chain.
    fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
        next.fire(session, event);
    }
}

type Entry = (String, Arc<dyn SessionFilter>);

/// The remainder of a chain, as seen from inside a filter.
pub struct NextFilter<'a> {
    entries: &'a [Entry],
    handler: &'a dyn SessionHandler,
}

impl NextFilter<'_> {
    /// Passes `event` to the next filter, or to the handler at the end.
    pub fn fire(&self, session: &SessionRef, event: SessionEvent) {
        match self.entries.split_first() {
            Some(((_, filter), rest)) => {
                let next = NextFilter {
                    entries: rest,
                    handler: self.handler,
                };
                filter.on_event(&next, session, event);
            }
            None => deliver(self.handler, session, event),
        }
    }
}

fn deliver(handler: &dyn SessionHandler, session: &SessionRef, event: SessionEvent) {
    match event {
        SessionEvent::Created => handler.session_created(session),
        SessionEvent::Opened => handler.session_opened(session),
        SessionEvent::MessageReceived(message) => handler.message_received(session, message),
        SessionEvent::MessageSent(message) => handler.message_sent(session, message),
        SessionEvent::Idle => handler.session_idle(session),
        SessionEvent::Closed => handler.session_closed(session),
        SessionEvent::Exception(error) => handler.exception_caught(session, &error),
    }
}

/// Ordered, named filters in front of a session handler.
pub struct FilterChain {
    entries: RwLock<Vec<Entry>>,
    handler: Arc<dyn SessionHandler>,
}

impl FilterChain {
    /// Creates an empty chain ending at `handler`.
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            handler,
        }
    }

    /// Appends `filter` under `name`.
    ///
    /// Returns `false` and leaves the chain untouched if `name` is taken.
    pub fn add_last(&self, name: impl Into<String>, filter: Arc<dyn SessionFilter>) -> bool {
        let name = name.into();
        let mut entries = self.entries.write();
        if entries.iter().any(|(existing, _)| *existing == name) {
            return false;
        }
        entries.push((name, filter));
        true
    }

    /// Removes the filter registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn SessionFilter>> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|(existing, _)| existing == name)?;
        Some(entries.remove(index).1)
    }

    /// Returns `true` if a filter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|(existing, _)| existing == name)
    }

    /// Returns the registered filter names in chain order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the handler at the end of the chain.
    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// Dispatches `event` through the chain.
    pub fn fire(&self, session: &SessionRef, event: SessionEvent) {
        let snapshot = self.entries.read().clone();
        NextFilter {
            entries: &snapshot,
            handler: self.handler.as_ref(),
        }
        .fire(session, event);
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemorySession;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl SessionHandler for Recorder {
        fn session_opened(&self, _session: &SessionRef) {
            self.events.lock().push("opened");
        }

        fn session_idle(&self, _session: &SessionRef) {
            self.events.lock().push("idle");
        }

        fn session_closed(&self, _session: &SessionRef) {
            self.events.lock().push("closed");
        }
    }

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl SessionFilter for Tag {
        fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
            self.1.lock().push(self.0);
            next.fire(session, event);
        }
    }

    struct RemoveSelf;

    impl SessionFilter for RemoveSelf {
        fn on_event(&self, next: &NextFilter<'_>, session: &SessionRef, event: SessionEvent) {
            session.filter_chain().remove("remove-self");
            next.fire(session, event);
        }
    }

    #[test]
    fn test_filters_run_in_order() {
        let recorder = Arc::new(Recorder::default());
        let session: SessionRef = MemorySession::new(None, recorder.clone());
        let trace = Arc::new(Mutex::new(Vec::new()));

        let chain = session.filter_chain();
        assert!(chain.add_last("a", Arc::new(Tag("a", trace.clone()))));
        assert!(chain.add_last("b", Arc::new(Tag("b", trace.clone()))));
        assert!(!chain.add_last("a", Arc::new(Tag("dup", trace.clone()))));

        chain.fire(&session, SessionEvent::Idle);

        assert_eq!(*trace.lock(), vec!["a", "b"]);
        assert_eq!(*recorder.events.lock(), vec!["idle"]);
        assert_eq!(chain.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_filter_can_remove_itself_mid_dispatch() {
        let recorder = Arc::new(Recorder::default());
        let session: SessionRef = MemorySession::new(None, recorder.clone());

        session
            .filter_chain()
            .add_last("remove-self", Arc::new(RemoveSelf));
        session.filter_chain().fire(&session, SessionEvent::Opened);

        assert!(!session.filter_chain().contains("remove-self"));
        assert_eq!(*recorder.events.lock(), vec!["opened"]);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(SessionEvent::Opened.name(), "opened");
        assert_eq!(
            SessionEvent::Exception(Arc::new(TransportError::Closed)).name(),
            "exception"
        );
    }
}
