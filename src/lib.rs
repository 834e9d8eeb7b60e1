//! Patchweave - advice binding and join point dispatch over a code patcher
//!
//! This library intercepts calls to selected functions or methods and routes
//! them through user-supplied advice, then continues to the original
//! implementation. Code replacement itself is delegated to a
//! [`CodePatcher`]; [`FunctionTable`] is an in-memory one.
//!
//! Supported advice kinds: before, after, after-return and after-throw.
//! Around advice and property access fail with `WeaverError::Kind`.

pub mod advice;
pub mod config;
pub mod error;
pub mod joinpoint;
pub mod kind;
pub mod patcher;
pub mod selector;
pub mod weaver;

pub use advice::{Advice, AdviceOptions};
pub use config::WeaveConfig;
pub use error::{Exception, Result, WeaverError};
pub use joinpoint::{CallState, JoinPoint};
pub use kind::{AdviceKind, ResolvedKind, Shape};
pub use patcher::{CodePatcher, FunctionTable, Invocation, PatchHandle};
pub use selector::Selector;
pub use weaver::{Binder, BindingInfo, Handle, StatusFilter, Target, Weaver};
