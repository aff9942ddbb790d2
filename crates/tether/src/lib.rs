//! # Tether
//!
//! Declarative bindings between one-shot async function calls and an
//! ordered event dispatch stream.
//!
//! ## Core Concepts
//!
//! Tether separates **calling** from **completing**:
//! - [`AsyncFunction`] = the calling side (dispatches a start event, returns a future)
//! - [`Matcher`] = the completing side (which later events settle that future)
//!
//! The key principle: **completion is an event, not a return value**.
//! The code that finishes an operation only dispatches; it never holds
//! the caller's future.
//!
//! ## Architecture
//!
//! ```text
//! BindingLifecycle ── activate(config) ──► Binding
//!        │                                    │ subscribe ×2 (resolve, reject)
//!        │                                    ▼
//!        │                             DispatchEngine
//!        │                                ▲       │
//!        ▼        invoke(arg)             │       │ matching dispatch
//! AsyncFunction ──────────── dispatch(start)      │
//!        │                                        ▼
//!        └─────► Invocation future ◄── settle front of FIFO queue
//! ```
//!
//! ## Key Invariants
//!
//! 1. **One live binding** - a lifecycle disposes the old binding before creating its replacement
//! 2. **Two subscriptions per binding** - one resolve rule, one reject rule, registered synchronously
//! 3. **Removal is immediate** - a disposed binding's subscriptions never fire again
//! 4. **FIFO settlement** - one matching event settles only the earliest pending invocation
//! 5. **Disposal abandons** - invocations pending at disposal are never settled
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_core::{BindingConfig, BindingLifecycle, Event, MemoryBus};
//!
//! let bus = Arc::new(MemoryBus::new());
//! let mut lifecycle = BindingLifecycle::new(bus.clone());
//!
//! let save = lifecycle.activate(BindingConfig::new("SAVE", "SAVE_SUCCESS", "SAVE_ERROR"))?;
//!
//! // Somewhere else, the thing that actually saves handles "SAVE" and
//! // answers by dispatching "SAVE_SUCCESS" (or "SAVE_ERROR") later.
//!
//! let saved = save.invoke(serde_json::json!({ "name": "Ada" })).await?;
//!
//! // Reconfigure: the old binding is disposed first, then replaced.
//! let save = lifecycle.activate(BindingConfig::new("SAVE", "OTHER_SAVE_SUCCESS", "SAVE_ERROR"))?;
//!
//! // Tear down: both subscriptions are removed, further activates fail.
//! lifecycle.deactivate();
//! ```
//!
//! ## What This Is Not
//!
//! Tether is **not**:
//! - A request/response protocol - there is no per-call correlation
//!   token; settlement is keyed only by event identity, FIFO across
//!   pending calls
//! - An event bus - [`MemoryBus`] is a reference engine; any ordered
//!   synchronous [`DispatchEngine`] will do
//! - A retry or cancellation layer - the only recovery is rebinding,
//!   and the only cancellation is disposal, which silently abandons
//!   whatever was in flight

// Core modules
mod binding;
mod bus;
mod config;
mod core;
mod error;
mod lifecycle;


// Re-export core types
pub use crate::core::{Event, Extract, Matcher, Predicate, SetPayload};

// Re-export the dispatch seam
pub use crate::bus::{DispatchEngine, Handler, MemoryBus, SubscriptionToken};

// Re-export configuration
pub use crate::config::BindingConfig;

// Re-export binding types
pub use crate::binding::{AsyncFunction, Binding, Invocation};

// Re-export lifecycle types
pub use crate::lifecycle::BindingLifecycle;

// Re-export error types
pub use crate::error::{ConfigError, InvocationError, LifecycleError};
