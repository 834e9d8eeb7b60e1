//! Dispatch engine
//!
//! The patcher calls a binding's replacement in place of the intercepted
//! callable. The replacement captures the call into the binding, resolves
//! the join point kind and runs the kind's sequence:
//!
//! | Kind          | Sequence                                           |
//! |---------------|----------------------------------------------------|
//! | Before        | binder, original                                   |
//! | After         | original, binder                                   |
//! | AfterReturn   | original, binder                                   |
//! | AfterThrow    | original; binder only if the original raised       |
//!
//! The caller receives the binding's captured return value, which advice may
//! have rewritten.
//!
//! "Original" is whatever the selector resolves to once this binding's
//! replacement is out of the way. With several bindings on one selector the
//! newest dispatches first and each reaches the next one down, so every
//! enabled binding fires once per call.

use super::binding::{AdviceBinding, Binder, Handle};
use super::guard::Suppression;
use super::WeaverState;
use crate::error::{Result, WeaverError};
use crate::joinpoint::JoinPoint;
use crate::kind::{combine, ResolvedKind};
use crate::patcher::{Invocation, Replacement};
use serde_json::Value;
use std::rc::{Rc, Weak};

/// Build the replacement the patcher installs for `handle`
///
/// Holds the weaver weakly: the patcher owns the replacement and the weaver
/// owns the patcher.
pub(crate) fn replacement(state: Weak<WeaverState>, handle: Handle) -> Replacement {
    Rc::new(move |invocation: &Invocation| -> Result<Value> {
        let state = state.upgrade().ok_or_else(|| {
            WeaverError::Configuration(format!(
                "weaver owning binding {} has been dropped",
                handle
            ))
        })?;
        dispatch(&state, handle, invocation)
    })
}

fn dispatch(state: &WeaverState, handle: Handle, invocation: &Invocation) -> Result<Value> {
    let binding = state.binding(handle)?;

    binding.mark_called();
    binding.call.borrow_mut().capture(invocation.args.clone());

    let kind = combine(binding.kind, binding.selector.shape())?;
    let join_point = JoinPoint::new(kind, &binding.selector, &binding.call, &*state.patcher)?;

    tracing::trace!(
        "Dispatching {} on {} (binding {}, binder {:?})",
        kind,
        binding.selector,
        handle,
        binding.binder()
    );

    use ResolvedKind as R;
    match kind {
        R::BeforeFunction | R::BeforeMethod => {
            run_binder(&binding, &join_point)?;
            invoke_original(state, &binding)?;
        }
        R::AfterFunction | R::AfterMethod | R::AfterFunctionReturn | R::AfterMethodReturn => {
            invoke_original(state, &binding)?;
            run_binder(&binding, &join_point)?;
        }
        R::AfterFunctionThrow | R::AfterMethodThrow => match invoke_original(state, &binding) {
            Ok(()) => {}
            Err(WeaverError::Raised(exception)) => {
                tracing::trace!("Captured {} from {}", exception, binding.selector);
                binding.call.borrow_mut().exception = Some(exception);
                run_binder(&binding, &join_point)?;
            }
            Err(e) => return Err(e),
        },
    }

    let value = binding.call.borrow().return_value.clone();
    Ok(value)
}

/// Run whichever binder is currently active
fn run_binder(binding: &AdviceBinding, join_point: &JoinPoint<'_>) -> Result<()> {
    match binding.binder() {
        Binder::Advice => binding.advice.invoke(join_point),
        Binder::OriginalCode => {
            if join_point.kind().is_after() {
                let _ = join_point.return_value();
            }
            Ok(())
        }
    }
}

/// Invoke the selector underneath this binding, with its interception suppressed
///
/// Uses the active call's receiver and the (possibly advice-rewritten)
/// captured arguments; stores the result as the captured return value.
fn invoke_original(state: &WeaverState, binding: &AdviceBinding) -> Result<()> {
    let receiver = state.patcher.current_receiver();
    let args = binding.call.borrow().args.clone().unwrap_or_default();

    let guard = Suppression::acquire(state, binding)?;
    let outcome = state
        .patcher
        .invoke_original(&binding.selector, receiver.as_ref(), &args);
    guard.release()?;

    binding.call.borrow_mut().return_value = outcome?;
    Ok(())
}
