//! Binding configuration: which events trigger, resolve, and reject an
//! async function, and how payloads move across each edge.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{Event, Extract, Matcher, SetPayload};
use crate::error::ConfigError;

/// Immutable description of one event-bound async function.
///
/// `start` is dispatched when the function is invoked; the first later
/// event matching `resolve` or `reject` settles the call. The three
/// optional mappers shape payloads at each edge. Both extractors default
/// to projecting the matched event's payload unchanged.
#[derive(Clone)]
pub struct BindingConfig {
    start: String,
    resolve: Matcher,
    reject: Matcher,
    set_payload: Option<Arc<SetPayload>>,
    get_payload: Option<Arc<Extract>>,
    get_error: Option<Arc<Extract>>,
}

impl BindingConfig {
    pub fn new(
        start: impl Into<String>,
        resolve: impl Into<Matcher>,
        reject: impl Into<Matcher>,
    ) -> Self {
        Self {
            start: start.into(),
            resolve: resolve.into(),
            reject: reject.into(),
            set_payload: None,
            get_payload: None,
            get_error: None,
        }
    }

    /// Map the caller's argument before it is attached to the start event.
    pub fn set_payload(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.set_payload = Some(Arc::new(f));
        self
    }

    /// Map a matched resolve event to the resolution value.
    pub fn get_payload(mut self, f: impl Fn(&Event) -> Value + Send + Sync + 'static) -> Self {
        self.get_payload = Some(Arc::new(f));
        self
    }

    /// Map a matched reject event to the rejection value.
    pub fn get_error(mut self, f: impl Fn(&Event) -> Value + Send + Sync + 'static) -> Self {
        self.get_error = Some(Arc::new(f));
        self
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn resolve(&self) -> &Matcher {
        &self.resolve
    }

    pub fn reject(&self) -> &Matcher {
        &self.reject
    }

    pub(crate) fn set_payload_fn(&self) -> Option<Arc<SetPayload>> {
        self.set_payload.clone()
    }

    pub(crate) fn get_payload_fn(&self) -> Arc<Extract> {
        self.get_payload
            .clone()
            .unwrap_or_else(|| Arc::new(|event: &Event| event.payload.clone()))
    }

    pub(crate) fn get_error_fn(&self) -> Arc<Extract> {
        self.get_error
            .clone()
            .unwrap_or_else(|| Arc::new(|event: &Event| event.payload.clone()))
    }

    /// Validation diagnostics. Empty identifiers are reported here and
    /// logged at binding creation; they do not abort it.
    pub fn issues(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();
        if self.start.is_empty() {
            issues.push(ConfigError::EmptyStart);
        }
        if self.resolve.is_empty_id() {
            issues.push(ConfigError::EmptyResolve);
        }
        if self.reject.is_empty_id() {
            issues.push(ConfigError::EmptyReject);
        }
        issues
    }

    /// Change detection across reconfigurations: only `start`, `resolve`,
    /// and `reject` participate. Mapper-only updates keep the existing
    /// binding, and therefore the existing mappers, in place.
    pub fn rebind_required(&self, previous: &BindingConfig) -> bool {
        self.start != previous.start
            || !self.resolve.same_rule(&previous.resolve)
            || !self.reject.same_rule(&previous.reject)
    }
}

impl fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingConfig")
            .field("start", &self.start)
            .field("resolve", &self.resolve)
            .field("reject", &self.reject)
            .finish_non_exhaustive()
    }
}
