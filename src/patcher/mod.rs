//! Code-patcher collaborator
//!
//! The weaver never rewrites code itself. It consumes a [`CodePatcher`] that
//! can install a replacement for a selector, remove it again, invoke whatever
//! the selector resolves to underneath, and report the call currently
//! executing.
//!
//! [`FunctionTable`] is an in-memory patcher: a table of named callables that
//! routes every call through the top-most installed replacement.

mod table;

pub use table::{Callable, FunctionTable};

use crate::error::Result;
use crate::selector::Selector;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Replacement closure installed for a selector
///
/// Invoked by the patcher in place of the original with the live call.
pub type Replacement = Rc<dyn Fn(&Invocation) -> Result<Value>>;

/// Opaque token identifying one installed replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchHandle(u64);

impl PatchHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch#{}", self.0)
    }
}

/// Live arguments (and receiver, for methods) of an intercepted call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub receiver: Option<Value>,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn function(args: Vec<Value>) -> Self {
        Self {
            receiver: None,
            args,
        }
    }

    pub fn method(receiver: Value, args: Vec<Value>) -> Self {
        Self {
            receiver: Some(receiver),
            args,
        }
    }
}

/// One entry of the patcher's active call stack
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Callable being executed
    pub selector: Selector,
    /// Receiver for method calls
    pub receiver: Option<Value>,
    /// Arguments the call was made with
    pub args: Vec<Value>,
}

/// Capability to replace the implementation that runs for a callable
///
/// All methods take `&self`: the weaver calls back into the patcher while
/// the patcher is itself executing a replacement, so implementations use
/// interior mutability and must not hold borrows across calls to a
/// replacement or to an original.
pub trait CodePatcher {
    /// Install `replacement` for `selector`
    ///
    /// May be called before the selector is defined (the replacement then
    /// takes effect once it is).
    ///
    /// # Errors
    /// `WeaverError::Patcher` if the selector cannot take a replacement.
    fn install(&self, selector: &Selector, replacement: Replacement) -> Result<PatchHandle>;

    /// Remove a previously installed replacement
    fn remove(&self, patch: PatchHandle) -> Result<()>;

    /// Invoke the implementation `selector` currently resolves to
    ///
    /// Callers remove their own replacement first, so this reaches the next
    /// replacement still installed for the selector, or the genuine original
    /// once none remain. Stacked replacements therefore all run, newest first.
    fn invoke_original(
        &self,
        selector: &Selector,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> Result<Value>;

    /// The call currently executing, if any
    fn current_frame(&self) -> Option<Frame>;

    fn current_receiver(&self) -> Option<Value> {
        self.current_frame().and_then(|frame| frame.receiver)
    }

    fn current_callable_name(&self) -> Option<String> {
        self.current_frame()
            .map(|frame| frame.selector.member().to_string())
    }

    fn current_class_name(&self) -> Option<String> {
        self.current_frame()
            .and_then(|frame| frame.selector.type_name().map(str::to_string))
    }

    fn current_args(&self) -> Vec<Value> {
        self.current_frame()
            .map(|frame| frame.args)
            .unwrap_or_default()
    }
}
