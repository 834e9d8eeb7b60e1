//! Join points: the advice's view of one intercepted call
//!
//! A [`JoinPoint`] is built fresh for every dispatch. It does not copy the
//! binding's call state; it borrows the same [`CallState`] cell the binding
//! owns, so `set_args` before the original runs changes what the original
//! receives, and `set_return_value` after it runs changes what the caller
//! receives.
//!
//! Property access and `proceed()` are not available from this interceptor
//! and always fail with `WeaverError::Kind`.

use crate::error::{Exception, Result, WeaverError};
use crate::kind::{AdviceKind, ResolvedKind, Shape};
use crate::patcher::CodePatcher;
use crate::selector::Selector;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;

/// State captured from the most recent call through a binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallState {
    /// Arguments of the most recent call (None before the first call)
    pub args: Option<Vec<Value>>,
    /// Return value, rewritable by advice
    pub return_value: Value,
    /// Exception raised by the original (after-throw bindings only)
    pub exception: Option<Exception>,
}

impl CallState {
    /// Start a new call: store its arguments and forget the previous outcome
    pub(crate) fn capture(&mut self, args: Vec<Value>) {
        self.args = Some(args);
        self.return_value = Value::Null;
        self.exception = None;
    }
}

/// Capability-restricted view of an in-flight intercepted call
pub struct JoinPoint<'a> {
    kind: ResolvedKind,
    pointcut: &'a Selector,
    state: &'a RefCell<CallState>,
    patcher: &'a dyn CodePatcher,
}

impl<'a> JoinPoint<'a> {
    /// Build a join point over a binding's call state
    ///
    /// # Errors
    /// `WeaverError::Configuration` if the state has not captured a call.
    pub fn new(
        kind: ResolvedKind,
        pointcut: &'a Selector,
        state: &'a RefCell<CallState>,
        patcher: &'a dyn CodePatcher,
    ) -> Result<Self> {
        if state.borrow().args.is_none() {
            return Err(WeaverError::Configuration(
                "call state is required".to_string(),
            ));
        }

        Ok(Self {
            kind,
            pointcut,
            state,
            patcher,
        })
    }

    pub fn kind(&self) -> ResolvedKind {
        self.kind
    }

    /// The intercepted selector
    pub fn pointcut(&self) -> &Selector {
        self.pointcut
    }

    pub fn args(&self) -> Vec<Value> {
        self.state.borrow().args.clone().unwrap_or_default()
    }

    /// Replace the arguments the original will be invoked with
    pub fn set_args(&self, args: Vec<Value>) {
        self.state.borrow_mut().args = Some(args);
    }

    /// Class of the active call, from the patcher's call stack
    pub fn class_name(&self) -> Option<String> {
        self.patcher.current_class_name()
    }

    /// Receiver of the active call (None for plain functions)
    pub fn object(&self) -> Option<Value> {
        self.patcher.current_receiver()
    }

    pub fn method_name(&self) -> Option<String> {
        self.patcher.current_callable_name()
    }

    pub fn function_name(&self) -> Option<String> {
        self.patcher.current_callable_name()
    }

    pub fn exception(&self) -> Option<Exception> {
        self.state.borrow().exception.clone()
    }

    pub fn return_value(&self) -> Value {
        self.state.borrow().return_value.clone()
    }

    /// Edit in place the return value the caller will receive
    ///
    /// The value is moved out of the call state while `f` runs, so `f` may
    /// use the join point freely; inside it `return_value()` reads `null`.
    pub fn with_return_value_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut value = std::mem::take(&mut self.state.borrow_mut().return_value);
        let result = f(&mut value);
        self.state.borrow_mut().return_value = value;
        result
    }

    pub fn set_return_value(&self, value: Value) {
        self.state.borrow_mut().return_value = value;
    }

    pub fn property_name(&self) -> Result<String> {
        Err(WeaverError::kind("property_name", Shape::Property))
    }

    pub fn property_value(&self) -> Result<Value> {
        Err(WeaverError::kind("property_value", Shape::Property))
    }

    pub fn set_property_value(&self, _value: Value) -> Result<()> {
        Err(WeaverError::kind("set_property_value", Shape::Property))
    }

    /// Around advice only; never produced by this interceptor
    pub fn proceed(&self) -> Result<Value> {
        Err(WeaverError::kind("proceed", AdviceKind::Around))
    }
}

impl fmt::Debug for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("kind", &self.kind)
            .field("pointcut", &self.pointcut.as_str())
            .field("state", &self.state)
            .finish()
    }
}
