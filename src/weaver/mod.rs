//! The weaver: registry of advice bindings
//!
//! Every registration creates one binding, identified by a [`Handle`], and
//! asks the patcher to route its selector through the dispatch engine.
//! Bindings can be disabled (replacement removed, calls reach the original)
//! and enabled again, individually or for every binding on a selector.
//!
//! # Example Usage
//! ```
//! use patchweave::{advice, FunctionTable, Weaver};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let table = Rc::new(FunctionTable::new());
//! table.define_method("Calculator", "add", |_, inv| {
//!     let sum: i64 = inv.args.iter().filter_map(|v| v.as_i64()).sum();
//!     Ok(json!(sum))
//! })?;
//!
//! let weaver = Weaver::new(table.clone());
//! weaver.add_after("Calculator::add", advice::from_fn(|jp| {
//!     let doubled = jp.return_value().as_i64().unwrap_or(0) * 2;
//!     jp.set_return_value(json!(doubled));
//!     Ok(())
//! }))?;
//!
//! let sum = table.call_method("Calculator::add", json!({}), vec![json!(2), json!(3)])?;
//! assert_eq!(sum, json!(10));
//! # Ok::<(), patchweave::WeaverError>(())
//! ```

mod binding;
mod dispatch;
mod guard;

pub use binding::{Binder, BindingInfo, Handle};

use crate::advice::{merge_options, Advice, AdviceOptions};
use crate::config::WeaverConfig;
use crate::error::{Result, WeaverError};
use crate::joinpoint::CallState;
use crate::kind::AdviceKind;
use crate::patcher::CodePatcher;
use crate::selector::Selector;
use binding::AdviceBinding;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Which bindings an enable/disable call applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One binding
    Handle(Handle),
    /// Every binding registered on the selector
    Selector(String),
}

impl From<Handle> for Target {
    fn from(handle: Handle) -> Self {
        Target::Handle(handle)
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

impl From<&Selector> for Target {
    fn from(selector: &Selector) -> Self {
        Target::Selector(selector.as_str().to_string())
    }
}

/// Enabled-state filter for [`Weaver::find_handles`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Enabled,
    Disabled,
    Any,
}

impl StatusFilter {
    fn matches(self, enabled: bool) -> bool {
        match self {
            StatusFilter::Enabled => enabled,
            StatusFilter::Disabled => !enabled,
            StatusFilter::Any => true,
        }
    }
}

/// Shared registry state; replacements reach it through a `Weak`
pub(crate) struct WeaverState {
    patcher: Rc<dyn CodePatcher>,
    bindings: RefCell<BTreeMap<Handle, Rc<AdviceBinding>>>,
    last_handle: Cell<u64>,
    config: WeaverConfig,
}

impl WeaverState {
    fn next_handle(&self) -> Handle {
        let id = self.last_handle.get() + 1;
        self.last_handle.set(id);
        Handle::new(id)
    }

    pub(crate) fn binding(&self, handle: Handle) -> Result<Rc<AdviceBinding>> {
        self.bindings
            .borrow()
            .get(&handle)
            .cloned()
            .ok_or(WeaverError::UnknownHandle(handle))
    }

    /// Bindings on `selector`, in handle order
    fn matching(&self, selector: &str) -> Vec<Rc<AdviceBinding>> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.bindings
            .borrow()
            .values()
            .filter(|b| b.selector == selector)
            .cloned()
            .collect()
    }

    fn resolve(&self, target: Target) -> Result<Vec<Rc<AdviceBinding>>> {
        match target {
            Target::Handle(handle) => Ok(vec![self.binding(handle)?]),
            Target::Selector(selector) => Ok(self.matching(&selector)),
        }
    }

    /// Install a fresh replacement and bind the advice
    ///
    /// A still-installed patch is removed once the new one is in, so enabling
    /// an enabled binding repairs it instead of stacking a second
    /// replacement. A refused install leaves the binding as it was.
    pub(crate) fn attach(&self, binding: &AdviceBinding) -> Result<()> {
        let patch = self
            .patcher
            .install(&binding.selector, Rc::clone(&binding.replacement))?;
        if let Some(stale) = binding.patch() {
            // Already gone if it was removed behind our back
            if let Err(e) = self.patcher.remove(stale) {
                tracing::debug!("Stale {} for binding {}: {}", stale, binding.handle, e);
            }
        }
        binding.mark_enabled(patch);
        Ok(())
    }

    /// Remove the replacement and bind the original code
    pub(crate) fn detach(&self, binding: &AdviceBinding) -> Result<()> {
        if let Some(patch) = binding.patch() {
            if let Err(e) = self.patcher.remove(patch) {
                tracing::debug!("Stale {} for binding {}: {}", patch, binding.handle, e);
            }
        }
        binding.mark_disabled();
        Ok(())
    }
}

/// Registry of advice bindings
///
/// Cloning is cheap and yields another handle to the same registry, so
/// advice can hold a `Weaver` and enable or disable bindings from inside a
/// dispatch.
#[derive(Clone)]
pub struct Weaver {
    state: Rc<WeaverState>,
}

impl Weaver {
    pub fn new(patcher: Rc<dyn CodePatcher>) -> Self {
        Self::with_config(patcher, WeaverConfig::default())
    }

    pub fn with_config(patcher: Rc<dyn CodePatcher>, config: WeaverConfig) -> Self {
        Self {
            state: Rc::new(WeaverState {
                patcher,
                bindings: RefCell::new(BTreeMap::new()),
                last_handle: Cell::new(0),
                config,
            }),
        }
    }

    pub fn patcher(&self) -> &Rc<dyn CodePatcher> {
        &self.state.patcher
    }

    /// Register `advice` on `selector` with the given base kind
    ///
    /// Configured default options are merged with `options` (which win) and
    /// applied to the advice when non-empty.
    ///
    /// # Errors
    /// - `WeaverError::Kind` for `AdviceKind::Around`
    /// - `WeaverError::Pointcut` for an empty or malformed selector
    /// - whatever the patcher returns if it refuses the install
    pub fn register<A>(
        &self,
        kind: AdviceKind,
        selector: &str,
        mut advice: A,
        options: &AdviceOptions,
    ) -> Result<Handle>
    where
        A: Advice + 'static,
    {
        if kind == AdviceKind::Around {
            return Err(WeaverError::kind("register", AdviceKind::Around));
        }
        let selector = Selector::parse(selector)?;

        let options = merge_options(&self.state.config.advice_options, options);
        if !options.is_empty() {
            advice.add_options(&options);
        }

        let handle = self.state.next_handle();
        let replacement = dispatch::replacement(Rc::downgrade(&self.state), handle);
        let binding = Rc::new(AdviceBinding::new(
            handle,
            selector,
            kind,
            Box::new(advice),
            replacement,
        ));

        self.state
            .bindings
            .borrow_mut()
            .insert(handle, Rc::clone(&binding));
        if let Err(e) = self.state.attach(&binding) {
            self.state.bindings.borrow_mut().remove(&handle);
            return Err(e);
        }

        tracing::debug!(
            "Registered {} advice on {} as binding {}",
            kind,
            binding.selector,
            handle
        );
        Ok(handle)
    }

    /// Run advice before the original
    pub fn add_before<A: Advice + 'static>(&self, selector: &str, advice: A) -> Result<Handle> {
        self.register(AdviceKind::Before, selector, advice, &AdviceOptions::new())
    }

    /// Run advice after the original returns
    pub fn add_after<A: Advice + 'static>(&self, selector: &str, advice: A) -> Result<Handle> {
        self.register(AdviceKind::After, selector, advice, &AdviceOptions::new())
    }

    /// Same dispatch as [`Weaver::add_after`]
    pub fn add_after_return<A: Advice + 'static>(
        &self,
        selector: &str,
        advice: A,
    ) -> Result<Handle> {
        self.register(AdviceKind::AfterReturn, selector, advice, &AdviceOptions::new())
    }

    /// Run advice only when the original raises
    pub fn add_after_throw<A: Advice + 'static>(
        &self,
        selector: &str,
        advice: A,
    ) -> Result<Handle> {
        self.register(AdviceKind::AfterThrow, selector, advice, &AdviceOptions::new())
    }

    /// Around advice is not supported by this interceptor
    pub fn add_around<A: Advice + 'static>(&self, _selector: &str, _advice: A) -> Result<Handle> {
        Err(WeaverError::kind("add_around", AdviceKind::Around))
    }

    /// Enable a binding, or every binding on a selector
    ///
    /// Never skipped for bindings that are already enabled: the replacement
    /// is reinstalled, which repairs interception removed behind the
    /// weaver's back.
    pub fn enable(&self, target: impl Into<Target>) -> Result<&Self> {
        for binding in self.state.resolve(target.into())? {
            self.state.attach(&binding)?;
            tracing::debug!("Enabled binding {} ({})", binding.handle, binding.selector);
        }
        Ok(self)
    }

    /// Disable a binding, or every binding on a selector
    pub fn disable(&self, target: impl Into<Target>) -> Result<&Self> {
        for binding in self.state.resolve(target.into())? {
            self.state.detach(&binding)?;
            tracing::debug!("Disabled binding {} ({})", binding.handle, binding.selector);
        }
        Ok(self)
    }

    pub fn is_enabled(&self, handle: Handle) -> Result<bool> {
        Ok(self.state.binding(handle)?.is_enabled())
    }

    /// Enabled flag of the last binding (in handle order) on `selector`
    ///
    /// `None` if no binding matches.
    pub fn is_selector_enabled(&self, selector: &str) -> Option<bool> {
        let mut enabled = None;
        for binding in self.state.matching(selector) {
            enabled = Some(binding.is_enabled());
        }
        enabled
    }

    /// Selector the binding intercepts
    pub fn get_pointcut(&self, handle: Handle) -> Result<Selector> {
        Ok(self.state.binding(handle)?.selector.clone())
    }

    /// Handles on `selector` whose enabled flag passes `status`
    pub fn find_handles(&self, selector: &str, status: StatusFilter) -> Vec<Handle> {
        self.state
            .matching(selector)
            .into_iter()
            .filter(|b| status.matches(b.is_enabled()))
            .map(|b| b.handle)
            .collect()
    }

    pub fn binding_info(&self, handle: Handle) -> Result<BindingInfo> {
        Ok(self.state.binding(handle)?.info())
    }

    pub fn was_called(&self, handle: Handle) -> Result<bool> {
        Ok(self.state.binding(handle)?.was_called())
    }

    /// Snapshot of the state captured from the binding's most recent call
    pub fn call_state(&self, handle: Handle) -> Result<CallState> {
        let binding = self.state.binding(handle)?;
        let state = binding.call.borrow().clone();
        Ok(state)
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.state.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.bindings.borrow().is_empty()
    }
}

impl std::fmt::Debug for Weaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Weaver")
            .field("bindings", &self.len())
            .field("last_handle", &self.state.last_handle.get())
            .finish()
    }
}
