use crate::advice::Advice;
use crate::joinpoint::CallState;
use crate::kind::AdviceKind;
use crate::patcher::{PatchHandle, Replacement};
use crate::selector::Selector;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Stable identity of an advice binding
///
/// Handles start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active dispatch behavior of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binder {
    /// Run the user advice
    Advice,
    /// Pass through to the original code
    OriginalCode,
}

/// The enabled/binder/patch triple, always updated as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lifecycle {
    enabled: bool,
    binder: Binder,
    patch: Option<PatchHandle>,
}

impl Lifecycle {
    fn enabled(patch: PatchHandle) -> Self {
        Self {
            enabled: true,
            binder: Binder::Advice,
            patch: Some(patch),
        }
    }

    fn disabled() -> Self {
        Self {
            enabled: false,
            binder: Binder::OriginalCode,
            patch: None,
        }
    }
}

/// Registry record for one registered interception
pub(crate) struct AdviceBinding {
    pub(crate) handle: Handle,
    pub(crate) selector: Selector,
    pub(crate) kind: AdviceKind,
    pub(crate) advice: Box<dyn Advice>,

    /// Most recent call; borrowed (never copied) by join points
    pub(crate) call: RefCell<CallState>,

    /// Closure handed to the patcher, reinstalled on every enable
    pub(crate) replacement: Replacement,

    lifecycle: Cell<Lifecycle>,
    /// Bumped on every lifecycle change
    generation: Cell<u64>,
    called: Cell<bool>,
}

impl AdviceBinding {
    pub(crate) fn new(
        handle: Handle,
        selector: Selector,
        kind: AdviceKind,
        advice: Box<dyn Advice>,
        replacement: Replacement,
    ) -> Self {
        Self {
            handle,
            selector,
            kind,
            advice,
            call: RefCell::new(CallState::default()),
            replacement,
            lifecycle: Cell::new(Lifecycle::disabled()),
            generation: Cell::new(0),
            called: Cell::new(false),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.lifecycle.get().enabled
    }

    pub(crate) fn binder(&self) -> Binder {
        self.lifecycle.get().binder
    }

    pub(crate) fn patch(&self) -> Option<PatchHandle> {
        self.lifecycle.get().patch
    }

    pub(crate) fn mark_enabled(&self, patch: PatchHandle) {
        self.set_lifecycle(Lifecycle::enabled(patch));
    }

    pub(crate) fn mark_disabled(&self) {
        self.set_lifecycle(Lifecycle::disabled());
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.lifecycle.set(lifecycle);
        self.generation.set(self.generation.get() + 1);
    }

    /// Changes whenever the binding is enabled or disabled
    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub(crate) fn was_called(&self) -> bool {
        self.called.get()
    }

    pub(crate) fn mark_called(&self) {
        self.called.set(true);
    }

    pub(crate) fn info(&self) -> BindingInfo {
        let lifecycle = self.lifecycle.get();
        BindingInfo {
            handle: self.handle,
            selector: self.selector.clone(),
            kind: self.kind,
            enabled: lifecycle.enabled,
            binder: lifecycle.binder,
            patch: lifecycle.patch,
            called: self.called.get(),
        }
    }
}

/// Read-only snapshot of a binding's registry record
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub handle: Handle,
    pub selector: Selector,
    pub kind: AdviceKind,
    pub enabled: bool,
    pub binder: Binder,
    pub patch: Option<PatchHandle>,
    /// Whether dispatch has ever observed this binding fire
    pub called: bool,
}
