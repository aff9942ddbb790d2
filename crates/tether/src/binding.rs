//! The binding factory and the bound async function it produces.
//!
//! A [`Binding`] is the live pairing of one configuration with its two
//! engine subscriptions. Settlement is keyed only by event identity:
//! there is no per-call correlation token, so a matching event settles
//! the earliest still-pending invocation and nothing else. This is the
//! inherited coarse correlation model, kept as-is.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use anyhow::{Context as _, Result};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::bus::{DispatchEngine, SubscriptionToken};
use crate::config::BindingConfig;
use crate::core::{Event, SetPayload};
use crate::error::InvocationError;

#[derive(Debug)]
enum Settled {
    Resolved(Value),
    Rejected(Value),
}

type PendingQueue = Arc<Mutex<VecDeque<oneshot::Sender<Settled>>>>;

fn lock(queue: &PendingQueue) -> MutexGuard<'_, VecDeque<oneshot::Sender<Settled>>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pop the earliest pending invocation and settle it.
///
/// An event matching with nothing pending is a no-op. A caller that
/// dropped its future still consumes the event: the FIFO position was
/// taken at invocation time.
fn settle_front(queue: &PendingQueue, outcome: impl FnOnce() -> Settled) {
    let front = lock(queue).pop_front();
    if let Some(tx) = front {
        let _ = tx.send(outcome());
    }
}

/// One live pairing of a configuration with its two engine
/// subscriptions.
///
/// Created by [`Binding::create`], removed by [`Binding::dispose`] or
/// drop. Disposal is immediate: no event dispatched afterwards can
/// settle an invocation made through this binding.
pub struct Binding {
    function: AsyncFunction,
    engine: Arc<dyn DispatchEngine>,
    resolve_token: SubscriptionToken,
    reject_token: SubscriptionToken,
    disposed: AtomicBool,
}

impl Binding {
    /// Register the resolve/reject subscription pair for `config` and
    /// produce the callable bound to them.
    ///
    /// Configuration problems are logged and tolerated; failures from
    /// the engine's `subscribe` propagate to the caller.
    pub fn create(engine: Arc<dyn DispatchEngine>, config: BindingConfig) -> Result<Self> {
        for issue in config.issues() {
            warn!(%issue, "binding configuration problem");
        }

        let pending: PendingQueue = Arc::new(Mutex::new(VecDeque::new()));

        let get_payload = config.get_payload_fn();
        let queue = Arc::clone(&pending);
        let resolve_token = engine
            .subscribe(
                config.resolve().clone(),
                Arc::new(move |event: &Event| {
                    settle_front(&queue, || Settled::Resolved(get_payload.as_ref()(event)));
                }),
            )
            .context("registering resolve subscription")?;

        let get_error = config.get_error_fn();
        let queue = Arc::clone(&pending);
        let reject_token = match engine.subscribe(
            config.reject().clone(),
            Arc::new(move |event: &Event| {
                settle_front(&queue, || Settled::Rejected(get_error.as_ref()(event)));
            }),
        ) {
            Ok(token) => token,
            Err(err) => {
                engine.unsubscribe(resolve_token);
                return Err(err.context("registering reject subscription"));
            }
        };

        let function = AsyncFunction {
            engine: Arc::clone(&engine),
            start: config.start().to_string(),
            set_payload: config.set_payload_fn(),
            pending,
        };
        debug!(start = function.start.as_str(), "binding created");

        Ok(Self {
            function,
            engine,
            resolve_token,
            reject_token,
            disposed: AtomicBool::new(false),
        })
    }

    /// Clonable handle to the bound callable.
    pub fn function(&self) -> AsyncFunction {
        self.function.clone()
    }

    /// Remove both subscriptions. Idempotent; also runs on drop.
    ///
    /// Invocations still pending at this point are abandoned: their
    /// futures stay pending for as long as any [`AsyncFunction`] handle
    /// is alive. Callers must not await across a disposal boundary.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.unsubscribe(self.resolve_token);
        self.engine.unsubscribe(self.reject_token);
        debug!(start = self.function.start.as_str(), "binding disposed");
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The callable produced by a [`Binding`].
///
/// Cheap to clone; every clone feeds the same FIFO queue of pending
/// invocations.
#[derive(Clone)]
pub struct AsyncFunction {
    engine: Arc<dyn DispatchEngine>,
    start: String,
    set_payload: Option<Arc<SetPayload>>,
    pending: PendingQueue,
}

impl AsyncFunction {
    /// Dispatch the start event and return the future for this call.
    ///
    /// The start event goes out synchronously, before the call joins
    /// the pending queue. Settlement comes later, from the first
    /// dispatch the binding's resolve or reject rule matches once this
    /// call reaches the front of the queue.
    pub fn invoke(&self, arg: impl Into<Value>) -> Invocation {
        let arg = arg.into();
        let payload = match self.set_payload.as_deref() {
            Some(map) => map(arg),
            None => arg,
        };
        self.engine.dispatch(Event::new(self.start.clone(), payload));

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).push_back(tx);
        Invocation { rx }
    }

    /// Number of invocations waiting to be settled.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl fmt::Debug for AsyncFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFunction")
            .field("start", &self.start)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// Future for one in-flight call.
///
/// Settles with the extracted payload of the first matching resolve
/// event, or [`InvocationError::Rejected`] for a reject event. If the
/// binding was disposed first, the future never settles while handles
/// to the binding's queue remain; once the last one is gone it fails
/// with [`InvocationError::Abandoned`].
#[derive(Debug)]
pub struct Invocation {
    rx: oneshot::Receiver<Settled>,
}

impl Future for Invocation {
    type Output = std::result::Result<Value, InvocationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Settled::Resolved(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Settled::Rejected(error))) => {
                Poll::Ready(Err(InvocationError::Rejected(error)))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(InvocationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::bus::MemoryBus;
    use crate::core::Matcher;

    fn save_config() -> BindingConfig {
        BindingConfig::new("SAVE", "SAVE_SUCCESS", "SAVE_ERROR")
    }

    fn setup() -> (Arc<MemoryBus>, Binding) {
        let bus = Arc::new(MemoryBus::new());
        let binding = Binding::create(bus.clone(), save_config()).unwrap();
        (bus, binding)
    }

    #[test]
    fn create_registers_exactly_two_subscriptions() {
        let bus = Arc::new(MemoryBus::new());
        assert_eq!(bus.subscription_count(), 0);
        let _binding = Binding::create(bus.clone(), save_config()).unwrap();
        assert_eq!(bus.subscription_count(), 2);
    }

    #[test]
    fn invoke_dispatches_the_start_event_before_returning() {
        let bus = Arc::new(MemoryBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            "SAVE".into(),
            Arc::new(move |event: &Event| sink.lock().unwrap().push(event.clone())),
        )
        .unwrap();

        let binding = Binding::create(bus.clone(), save_config()).unwrap();
        let _call = binding.function().invoke("hello");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Event::new("SAVE", "hello"));
    }

    #[test]
    fn set_payload_maps_the_callers_argument() {
        let bus = Arc::new(MemoryBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            "SAVE".into(),
            Arc::new(move |event: &Event| sink.lock().unwrap().push(event.payload.clone())),
        )
        .unwrap();

        let config = save_config().set_payload(|arg| json!({ "values": arg }));
        let binding = Binding::create(bus.clone(), config).unwrap();
        let _call = binding.function().invoke("hello");

        assert_eq!(*seen.lock().unwrap(), vec![json!({ "values": "hello" })]);
    }

    #[test]
    fn invoke_without_other_subscribers_still_dispatches() {
        let (_bus, binding) = setup();
        let function = binding.function();
        let call = function.invoke(());
        assert_eq!(function.pending_count(), 1);
        assert!(call.now_or_never().is_none());
    }

    #[tokio::test]
    async fn resolves_with_the_matched_event_payload() {
        let (bus, binding) = setup();
        let call = binding.function().invoke(());

        bus.dispatch(Event::new("SAVE_SUCCESS", "Awesome!"));

        assert_eq!(call.await, Ok(json!("Awesome!")));
    }

    #[tokio::test]
    async fn rejects_with_the_matched_event_payload() {
        let (bus, binding) = setup();
        let call = binding.function().invoke(());

        bus.dispatch(Event::new("SAVE_ERROR", "Bummer!"));

        assert_eq!(
            call.await,
            Err(InvocationError::Rejected(json!("Bummer!")))
        );
    }

    #[tokio::test]
    async fn extractors_shape_resolution_and_rejection_values() {
        let bus = Arc::new(MemoryBus::new());
        let config = save_config()
            .get_payload(|event| event.payload["body"].clone())
            .get_error(|event| event.payload["code"].clone());
        let binding = Binding::create(bus.clone(), config).unwrap();
        let function = binding.function();

        let ok = function.invoke(());
        bus.dispatch(Event::new("SAVE_SUCCESS", json!({ "body": 42 })));
        assert_eq!(ok.await, Ok(json!(42)));

        let bad = function.invoke(());
        bus.dispatch(Event::new("SAVE_ERROR", json!({ "code": 500 })));
        assert_eq!(bad.await, Err(InvocationError::Rejected(json!(500))));
    }

    #[tokio::test]
    async fn settles_concurrent_invocations_in_invocation_order() {
        let (bus, binding) = setup();
        let function = binding.function();
        let first = function.invoke(());
        let mut second = function.invoke(());

        bus.dispatch(Event::new("SAVE_SUCCESS", "one"));
        assert_eq!(first.await, Ok(json!("one")));
        assert!(futures::poll!(&mut second).is_pending());

        bus.dispatch(Event::new("SAVE_ERROR", "two"));
        assert_eq!(
            second.await,
            Err(InvocationError::Rejected(json!("two")))
        );
    }

    #[tokio::test]
    async fn predicate_rules_settle_on_event_content() {
        let bus = Arc::new(MemoryBus::new());
        let config = BindingConfig::new(
            "SAVE",
            Matcher::predicate(|e| e.id == "SAVE_DONE" && e.payload["ok"] == json!(true)),
            "SAVE_ERROR",
        );
        let binding = Binding::create(bus.clone(), config).unwrap();
        let mut call = binding.function().invoke(());

        bus.dispatch(Event::new("SAVE_DONE", json!({ "ok": false })));
        assert!(futures::poll!(&mut call).is_pending());

        bus.dispatch(Event::new("SAVE_DONE", json!({ "ok": true })));
        assert_eq!(call.await, Ok(json!({ "ok": true })));
    }

    #[test]
    fn matching_event_with_nothing_pending_is_a_no_op() {
        let (bus, _binding) = setup();
        bus.dispatch(Event::new("SAVE_SUCCESS", "ignored"));
        bus.dispatch(Event::new("SAVE_ERROR", "ignored"));
    }

    #[test]
    fn dispose_removes_both_subscriptions_and_is_idempotent() {
        let (bus, binding) = setup();
        assert_eq!(bus.subscription_count(), 2);

        binding.dispose();
        assert_eq!(bus.subscription_count(), 0);

        binding.dispose();
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn dropping_a_binding_disposes_it() {
        let (bus, binding) = setup();
        drop(binding);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn disposed_binding_abandons_pending_invocations() {
        let (bus, binding) = setup();
        let function = binding.function();
        let mut call = function.invoke(());

        binding.dispose();
        bus.dispatch(Event::new("SAVE_SUCCESS", "late"));

        // While a handle is alive the call just stays pending.
        assert!(futures::poll!(&mut call).is_pending());

        // Dropping the last handle is the only way the caller ever learns.
        drop(binding);
        drop(function);
        assert_eq!(call.await, Err(InvocationError::Abandoned));
    }

    #[test]
    fn invalid_config_still_creates_a_permissive_binding() {
        let bus = Arc::new(MemoryBus::new());
        let binding = Binding::create(bus.clone(), BindingConfig::new("", "OK", "")).unwrap();
        assert_eq!(bus.subscription_count(), 2);
        drop(binding);
    }
}
