//! The dispatch seam: the engine trait plus an in-memory reference bus.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use smallvec::SmallVec;
use tracing::trace;
use uuid::Uuid;

use crate::core::{Event, Matcher};

/// Callback invoked for every event a subscription matches.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque identity of one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(Uuid);

impl SubscriptionToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// The ordered, synchronous event dispatch seam.
///
/// Implementations must invoke matching handlers synchronously and in
/// subscription order, with a dispatch fully processed before
/// `dispatch` returns. Removal must take effect before the next
/// dispatch: an unsubscribed handler never fires again.
pub trait DispatchEngine: Send + Sync {
    /// Register a handler for events matching `matcher`.
    ///
    /// Registration is immediate: no event dispatched before this call
    /// returns can be observed by the new subscription.
    fn subscribe(&self, matcher: Matcher, handler: Handler) -> Result<SubscriptionToken>;

    /// Remove a subscription. Unknown tokens are ignored.
    fn unsubscribe(&self, token: SubscriptionToken);

    /// Deliver `event` to every matching subscription, in order.
    fn dispatch(&self, event: Event);
}

struct Subscriber {
    token: SubscriptionToken,
    matcher: Matcher,
    handler: Handler,
}

/// Process-local [`DispatchEngine`] with synchronous in-order delivery.
///
/// Handlers run outside the registry lock, so a handler may dispatch
/// further events or add and remove subscriptions. A handler removed by
/// an earlier handler of the *same* dispatch still sees that dispatch;
/// the removal is effective for every subsequent one.
#[derive(Default)]
pub struct MemoryBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DispatchEngine for MemoryBus {
    fn subscribe(&self, matcher: Matcher, handler: Handler) -> Result<SubscriptionToken> {
        let token = SubscriptionToken::new();
        self.lock().push(Subscriber {
            token,
            matcher,
            handler,
        });
        trace!(?token, "subscription registered");
        Ok(token)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.lock().retain(|s| s.token != token);
        trace!(?token, "subscription removed");
    }

    fn dispatch(&self, event: Event) {
        let matching: SmallVec<[Handler; 4]> = self
            .lock()
            .iter()
            .filter(|s| s.matcher.matches(&event))
            .map(|s| Arc::clone(&s.handler))
            .collect();
        trace!(id = %event.id, matched = matching.len(), "dispatch");
        for handler in matching {
            handler.as_ref()(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counting_handler() -> (Handler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: Handler = Arc::new(move |_event: &Event| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (handler, count)
    }

    #[test]
    fn delivers_to_matching_subscribers_in_subscription_order() {
        let bus = MemoryBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            bus.subscribe(
                "PING".into(),
                Arc::new(move |_event: &Event| order.lock().unwrap().push(tag)),
            )
            .unwrap();
        }

        bus.dispatch(Event::bare("PING"));

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn skips_non_matching_subscribers() {
        let bus = MemoryBus::new();
        let (handler, count) = counting_handler();
        bus.subscribe("PING".into(), handler).unwrap();

        bus.dispatch(Event::bare("PONG"));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn predicate_subscriptions_match_on_content() {
        let bus = MemoryBus::new();
        let (handler, count) = counting_handler();
        bus.subscribe(
            Matcher::predicate(|e| e.payload["kind"] == json!("good")),
            handler,
        )
        .unwrap();

        bus.dispatch(Event::new("ANY", json!({ "kind": "good" })));
        bus.dispatch(Event::new("ANY", json!({ "kind": "bad" })));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_takes_effect_before_the_next_dispatch() {
        let bus = MemoryBus::new();
        let (handler, count) = counting_handler();
        let token = bus.subscribe("PING".into(), handler).unwrap();

        bus.dispatch(Event::bare("PING"));
        bus.unsubscribe(token);
        bus.dispatch(Event::bare("PING"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let bus = MemoryBus::new();
        let (handler, _count) = counting_handler();
        let token = bus.subscribe("PING".into(), handler).unwrap();
        bus.unsubscribe(token);
        bus.unsubscribe(token);
    }

    #[test]
    fn handlers_may_reenter_the_bus() {
        let bus = Arc::new(MemoryBus::new());
        let (handler, count) = counting_handler();
        bus.subscribe("SECOND".into(), handler).unwrap();

        let chained = Arc::clone(&bus);
        bus.subscribe(
            "FIRST".into(),
            Arc::new(move |_event: &Event| chained.dispatch(Event::bare("SECOND"))),
        )
        .unwrap();

        bus.dispatch(Event::bare("FIRST"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
