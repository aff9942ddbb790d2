//! Test doubles for tether.
//!
//! Rust stand-ins for the ad hoc spies an event-binding test suite
//! needs: an engine wrapper that records the full dispatch log, a
//! counting handler, and an engine that refuses registrations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use tether_core::{DispatchEngine, Event, Handler, Matcher, SubscriptionToken};

/// Engine wrapper that records every dispatched event before forwarding
/// it to the wrapped engine.
pub struct RecordingEngine<E> {
    inner: E,
    log: Mutex<Vec<Event>>,
}

impl<E: DispatchEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Everything dispatched so far, in dispatch order.
    pub fn dispatched(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.lock().len()
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: DispatchEngine> DispatchEngine for RecordingEngine<E> {
    fn subscribe(&self, matcher: Matcher, handler: Handler) -> Result<SubscriptionToken> {
        self.inner.subscribe(matcher, handler)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.unsubscribe(token);
    }

    fn dispatch(&self, event: Event) {
        self.lock().push(event.clone());
        self.inner.dispatch(event);
    }
}

/// Counting handler: how many events a subscription saw, and which.
#[derive(Clone, Default)]
pub struct Spy {
    count: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Event>>>,
}

impl Spy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler to register with an engine; every match is recorded.
    pub fn handler(&self) -> Handler {
        let count = Arc::clone(&self.count);
        let seen = Arc::clone(&self.seen);
        Arc::new(move |event: &Event| {
            count.fetch_add(1, Ordering::SeqCst);
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        })
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Event> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Engine that refuses every registration, for exercising failure
/// paths in code that treats `subscribe` as fallible.
pub struct RefusingEngine {
    reason: String,
}

impl RefusingEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl DispatchEngine for RefusingEngine {
    fn subscribe(&self, _matcher: Matcher, _handler: Handler) -> Result<SubscriptionToken> {
        bail!("{}", self.reason)
    }

    fn unsubscribe(&self, _token: SubscriptionToken) {}

    fn dispatch(&self, _event: Event) {}
}
