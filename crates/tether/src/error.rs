//! Error taxonomy.

use serde_json::Value;
use thiserror::Error;

/// A problem found while validating a binding configuration.
///
/// These are reported as log diagnostics rather than hard failures, so a
/// partially filled-in configuration still yields a working binding for
/// its valid parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`start` must be a non-empty event id")]
    EmptyStart,
    #[error("`resolve` must be a non-empty event id or a predicate")]
    EmptyResolve,
    #[error("`reject` must be a non-empty event id or a predicate")]
    EmptyReject,
}

/// Why an invocation settled unsuccessfully.
#[derive(Debug, PartialEq, Error)]
pub enum InvocationError {
    /// A reject event matched; carries the extracted error value.
    #[error("invocation rejected: {0}")]
    Rejected(Value),
    /// Every owner of the binding's pending queue is gone, so the
    /// invocation can never settle.
    #[error("binding dropped with the invocation still pending")]
    Abandoned,
}

/// Misuse of a lifecycle that has already been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("lifecycle already deactivated")]
    Disposed,
}
