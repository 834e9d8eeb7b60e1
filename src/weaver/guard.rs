//! Scoped suppression of one binding's interception
//!
//! While a [`Suppression`] is alive the binding's replacement is removed
//! from the patcher, so calls to the same selector skip this binding instead
//! of re-entering it. Other bindings are untouched.
//!
//! Release restores the binding only if it was enabled at acquisition and
//! nothing enabled or disabled it in between; an explicit `disable` made
//! while the original runs sticks.

use super::binding::AdviceBinding;
use super::WeaverState;
use crate::error::Result;

pub(crate) struct Suppression<'a> {
    state: &'a WeaverState,
    binding: &'a AdviceBinding,
    /// Re-enable on release (the binding was enabled when acquired)
    restore: bool,
    /// Binding generation right after the detach
    generation: u64,
    released: bool,
}

impl<'a> Suppression<'a> {
    pub(crate) fn acquire(state: &'a WeaverState, binding: &'a AdviceBinding) -> Result<Self> {
        let restore = binding.is_enabled();
        state.detach(binding)?;
        Ok(Self {
            state,
            binding,
            restore,
            generation: binding.generation(),
            released: false,
        })
    }

    fn should_restore(&self) -> bool {
        if self.restore && self.binding.generation() != self.generation {
            tracing::debug!(
                "Binding {} changed while suppressed; leaving it as is",
                self.binding.handle
            );
            return false;
        }
        self.restore
    }

    /// Reinstall interception, reporting failure to the caller
    pub(crate) fn release(mut self) -> Result<()> {
        self.released = true;
        if self.should_restore() {
            self.state.attach(self.binding)?;
        }
        Ok(())
    }
}

impl Drop for Suppression<'_> {
    fn drop(&mut self) {
        if self.released || !self.should_restore() {
            return;
        }
        if let Err(e) = self.state.attach(self.binding) {
            tracing::warn!(
                "Failed to re-enable binding {} ({}): {}",
                self.binding.handle,
                self.binding.selector,
                e
            );
        }
    }
}
