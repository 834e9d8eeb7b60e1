//! Selectors identify the callable a binding intercepts
//!
//! Two forms are accepted:
//! - Plain function: `greet`
//! - Method: `Calculator::add`

use crate::error::{Result, WeaverError};
use crate::kind::Shape;
use std::fmt;

/// Separator between type name and member in a method selector
pub const METHOD_SEPARATOR: &str = "::";

/// Immutable identifier of an interceptable function or method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector {
    raw: String,
    /// Byte offset of the `::` separator (None for plain functions)
    split: Option<usize>,
}

impl Selector {
    /// Parse a selector string
    ///
    /// # Errors
    /// Returns `WeaverError::Pointcut` if the selector is empty or blank,
    /// carries leading or trailing whitespace, or is a method selector with
    /// an empty type or member part. Accepted text is stored unchanged.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(WeaverError::Pointcut("selector is required".to_string()));
        }
        if raw.trim() != raw {
            return Err(WeaverError::Pointcut(format!(
                "Invalid selector '{}': surrounding whitespace is not allowed",
                raw
            )));
        }

        let split = raw.find(METHOD_SEPARATOR);
        if let Some(pos) = split {
            let type_name = &raw[..pos];
            let member = &raw[pos + METHOD_SEPARATOR.len()..];
            if type_name.is_empty() || member.is_empty() {
                return Err(WeaverError::Pointcut(format!(
                    "Invalid method selector: {}. Expected format: Type::member",
                    raw
                )));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            split,
        })
    }

    /// Build a method selector from its parts
    pub fn method(type_name: &str, member: &str) -> Result<Self> {
        Self::parse(&format!("{}{}{}", type_name, METHOD_SEPARATOR, member))
    }

    /// Full selector text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Join point shape: `Function` without a separator, `Method` with one
    pub fn shape(&self) -> Shape {
        match self.split {
            None => Shape::Function,
            Some(_) => Shape::Method,
        }
    }

    pub fn is_method(&self) -> bool {
        self.split.is_some()
    }

    /// Type part of a method selector
    pub fn type_name(&self) -> Option<&str> {
        self.split.map(|pos| &self.raw[..pos])
    }

    /// Function name, or the member part of a method selector
    pub fn member(&self) -> &str {
        match self.split {
            None => &self.raw,
            Some(pos) => &self.raw[pos + METHOD_SEPARATOR.len()..],
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Selector {
    type Err = WeaverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq<str> for Selector {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for Selector {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}
