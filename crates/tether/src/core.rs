//! Core value types: events, match rules, and payload mappers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One dispatched unit: an identifier plus an arbitrary JSON payload.
///
/// Payloads are dynamic by design. The binding layer never interprets
/// them; it only moves them between callers and mappers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub payload: Value,
}

impl Event {
    pub fn new(id: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// An event carrying no payload.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Value::Null,
        }
    }
}

/// Predicate form of a match rule.
pub type Predicate = dyn Fn(&Event) -> bool + Send + Sync;

/// Maps the caller's invocation argument to the start event payload.
pub type SetPayload = dyn Fn(Value) -> Value + Send + Sync;

/// Pulls a settlement value out of a matched event.
pub type Extract = dyn Fn(&Event) -> Value + Send + Sync;

/// Rule deciding which dispatched events a subscription fires for:
/// either exact identifier equality or an arbitrary predicate over the
/// whole event.
#[derive(Clone)]
pub enum Matcher {
    Id(String),
    Predicate(Arc<Predicate>),
}

impl Matcher {
    pub fn id(id: impl Into<String>) -> Self {
        Matcher::Id(id.into())
    }

    pub fn predicate(f: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Matcher::Id(id) => event.id == *id,
            Matcher::Predicate(f) => f.as_ref()(event),
        }
    }

    /// Change-detection comparison: identifiers compare by value,
    /// predicates by pointer identity. A freshly built closure is a new
    /// rule even if its body is textually identical.
    pub fn same_rule(&self, other: &Matcher) -> bool {
        match (self, other) {
            (Matcher::Id(a), Matcher::Id(b)) => a == b,
            (Matcher::Predicate(a), Matcher::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn is_empty_id(&self) -> bool {
        matches!(self, Matcher::Id(id) if id.is_empty())
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(id: &str) -> Self {
        Matcher::Id(id.to_string())
    }
}

impl From<String> for Matcher {
    fn from(id: String) -> Self {
        Matcher::Id(id)
    }
}
