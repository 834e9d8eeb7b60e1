//! Advice kinds and join point shapes
//!
//! A binding is registered with a base [`AdviceKind`]. At dispatch time the
//! selector's [`Shape`] is combined with it to produce a [`ResolvedKind`],
//! which is what join points report and what capability gates match on.
//! `Around` and `Property` exist so they can be named in errors; `combine`
//! never produces a resolved kind from either.

use crate::error::{Result, WeaverError};
use std::fmt;

/// Base advice kind, as chosen by the registration entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    Before,
    After,
    AfterReturn,
    AfterThrow,
    /// Not supported by this interceptor
    Around,
}

impl AdviceKind {
    pub fn name(self) -> &'static str {
        match self {
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturn => "after_return",
            AdviceKind::AfterThrow => "after_throw",
            AdviceKind::Around => "around",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target shape modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Function,
    Method,
    /// Property access; never intercepted by this core
    Property,
}

impl Shape {
    pub fn name(self) -> &'static str {
        match self {
            Shape::Function => "function",
            Shape::Method => "method",
            Shape::Property => "property",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully resolved join point kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedKind {
    BeforeFunction,
    BeforeMethod,
    AfterFunction,
    AfterMethod,
    AfterFunctionReturn,
    AfterMethodReturn,
    AfterFunctionThrow,
    AfterMethodThrow,
}

/// Combine a base kind with a shape modifier
///
/// Idempotent: the same inputs always resolve to the same kind, so
/// resolving again on every dispatch has no cumulative effect.
///
/// # Errors
/// `WeaverError::Kind` for `Around` or `Property`.
pub fn combine(base: AdviceKind, shape: Shape) -> Result<ResolvedKind> {
    use ResolvedKind as R;

    let resolved = match (base, shape) {
        (AdviceKind::Around, _) => return Err(WeaverError::kind("combine", AdviceKind::Around)),
        (_, Shape::Property) => return Err(WeaverError::kind("combine", Shape::Property)),
        (AdviceKind::Before, Shape::Function) => R::BeforeFunction,
        (AdviceKind::Before, Shape::Method) => R::BeforeMethod,
        (AdviceKind::After, Shape::Function) => R::AfterFunction,
        (AdviceKind::After, Shape::Method) => R::AfterMethod,
        (AdviceKind::AfterReturn, Shape::Function) => R::AfterFunctionReturn,
        (AdviceKind::AfterReturn, Shape::Method) => R::AfterMethodReturn,
        (AdviceKind::AfterThrow, Shape::Function) => R::AfterFunctionThrow,
        (AdviceKind::AfterThrow, Shape::Method) => R::AfterMethodThrow,
    };

    Ok(resolved)
}

impl ResolvedKind {
    /// Base kind this was resolved from
    pub fn base(self) -> AdviceKind {
        use ResolvedKind as R;
        match self {
            R::BeforeFunction | R::BeforeMethod => AdviceKind::Before,
            R::AfterFunction | R::AfterMethod => AdviceKind::After,
            R::AfterFunctionReturn | R::AfterMethodReturn => AdviceKind::AfterReturn,
            R::AfterFunctionThrow | R::AfterMethodThrow => AdviceKind::AfterThrow,
        }
    }

    pub fn shape(self) -> Shape {
        use ResolvedKind as R;
        match self {
            R::BeforeFunction | R::AfterFunction | R::AfterFunctionReturn | R::AfterFunctionThrow => {
                Shape::Function
            }
            R::BeforeMethod | R::AfterMethod | R::AfterMethodReturn | R::AfterMethodThrow => {
                Shape::Method
            }
        }
    }

    /// True for After, AfterReturn and AfterThrow kinds
    pub fn is_after(self) -> bool {
        match self.base() {
            AdviceKind::After | AdviceKind::AfterReturn | AdviceKind::AfterThrow => true,
            AdviceKind::Before | AdviceKind::Around => false,
        }
    }

    pub fn name(self) -> &'static str {
        use ResolvedKind as R;
        match self {
            R::BeforeFunction => "before_function",
            R::BeforeMethod => "before_method",
            R::AfterFunction => "after_function",
            R::AfterMethod => "after_method",
            R::AfterFunctionReturn => "after_function_return",
            R::AfterMethodReturn => "after_method_return",
            R::AfterFunctionThrow => "after_function_throw",
            R::AfterMethodThrow => "after_method_throw",
        }
    }
}

impl fmt::Display for ResolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
