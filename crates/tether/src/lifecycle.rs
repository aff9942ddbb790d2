//! Ownership of the one live binding, and the rebind/teardown rules.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::binding::{AsyncFunction, Binding};
use crate::bus::DispatchEngine;
use crate::config::BindingConfig;
use crate::error::LifecycleError;

enum State {
    Uninitialized,
    Bound {
        binding: Binding,
        config: BindingConfig,
    },
    Disposed,
}

/// Owns at most one live [`Binding`] and swaps it on configuration
/// change.
///
/// `activate` is called once when the owner comes up and again on every
/// reconfiguration; a replacement binding is only created when `start`,
/// `resolve`, or `reject` actually changed. The old binding is always
/// disposed before the new one registers, so no two bindings are ever
/// subscribed at once.
pub struct BindingLifecycle {
    engine: Arc<dyn DispatchEngine>,
    state: State,
}

impl BindingLifecycle {
    pub fn new(engine: Arc<dyn DispatchEngine>) -> Self {
        Self {
            engine,
            state: State::Uninitialized,
        }
    }

    /// Bind `config`, reusing the current binding when its trigger and
    /// settlement rules are unchanged.
    ///
    /// Mapper-only updates do not take effect until one of the three
    /// rules changes too; this matches the inherited change-detection
    /// policy.
    pub fn activate(&mut self, config: BindingConfig) -> Result<AsyncFunction> {
        if matches!(self.state, State::Disposed) {
            return Err(LifecycleError::Disposed.into());
        }
        if let State::Bound {
            binding,
            config: current,
        } = &self.state
        {
            if !config.rebind_required(current) {
                return Ok(binding.function());
            }
        }

        // Dispose strictly before the replacement registers. On a create
        // failure the lifecycle is left unbound and activate can be
        // retried with a corrected configuration.
        if let State::Bound { binding, .. } =
            std::mem::replace(&mut self.state, State::Uninitialized)
        {
            binding.dispose();
            debug!("rebinding: trigger or settlement rules changed");
        }

        let binding = Binding::create(Arc::clone(&self.engine), config.clone())?;
        let function = binding.function();
        self.state = State::Bound { binding, config };
        Ok(function)
    }

    /// Tear down the current binding, if any.
    ///
    /// Idempotent, and a no-op when nothing was ever bound. Further
    /// `activate` calls fail with [`LifecycleError::Disposed`].
    pub fn deactivate(&mut self) {
        if let State::Bound { binding, .. } = std::mem::replace(&mut self.state, State::Disposed) {
            binding.dispose();
            debug!("lifecycle deactivated");
        }
    }

    /// The callable for the current binding, when one is live.
    pub fn function(&self) -> Option<AsyncFunction> {
        match &self.state {
            State::Bound { binding, .. } => Some(binding.function()),
            _ => None,
        }
    }

    /// True once `deactivate` has run.
    pub fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }
}
