//! User-supplied advice
//!
//! Advice is anything implementing [`Advice`]. Closures are adapted with
//! [`from_fn`]; types that accept configuration override
//! [`Advice::add_options`], which the weaver calls once before registering.

use crate::error::Result;
use crate::joinpoint::JoinPoint;
use serde_json::{Map, Value};

/// Configuration options handed to advice at registration
pub type AdviceOptions = Map<String, Value>;

/// Behavior run at a join point
pub trait Advice {
    /// Run the advice for one intercepted call
    ///
    /// Returning an error aborts the call; advice re-raises a captured
    /// exception by returning `WeaverError::Raised`.
    fn invoke(&self, join_point: &JoinPoint<'_>) -> Result<()>;

    /// Apply configuration options; the default ignores them
    fn add_options(&mut self, _options: &AdviceOptions) {}
}

/// Advice backed by a closure
pub struct FnAdvice<F> {
    callback: F,
    options: AdviceOptions,
}

/// Adapt a closure into [`Advice`]
///
/// ```
/// use patchweave::advice;
///
/// let log = advice::from_fn(|jp| {
///     tracing::info!("entering {}", jp.pointcut());
///     Ok(())
/// });
/// # let _ = log;
/// ```
pub fn from_fn<F>(callback: F) -> FnAdvice<F>
where
    F: Fn(&JoinPoint<'_>) -> Result<()>,
{
    FnAdvice {
        callback,
        options: AdviceOptions::new(),
    }
}

impl<F> FnAdvice<F> {
    /// Options applied so far
    pub fn options(&self) -> &AdviceOptions {
        &self.options
    }
}

impl<F> Advice for FnAdvice<F>
where
    F: Fn(&JoinPoint<'_>) -> Result<()>,
{
    fn invoke(&self, join_point: &JoinPoint<'_>) -> Result<()> {
        (self.callback)(join_point)
    }

    fn add_options(&mut self, options: &AdviceOptions) {
        for (key, value) in options {
            self.options.insert(key.clone(), value.clone());
        }
    }
}

/// Merge default options with per-registration overrides
pub(crate) fn merge_options(defaults: &AdviceOptions, overrides: &AdviceOptions) -> AdviceOptions {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
