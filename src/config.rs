//! TOML configuration for the weaver and the in-memory patcher
//!
//! # Example TOML
//! ```toml
//! [weaver]
//! advice_options = { label = "audit" }
//!
//! [patcher]
//! blacklist = ["exit", "Kernel::halt"]
//! ```

use crate::advice::AdviceOptions;
use crate::selector::Selector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Weaver section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaverConfig {
    /// Options merged into every advice before registration
    ///
    /// Options passed to an individual registration override these keys.
    pub advice_options: AdviceOptions,
}

/// Patcher section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Selectors that refuse a replacement
    pub blacklist: Vec<String>,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub weaver: WeaverConfig,
    pub patcher: PatcherConfig,
}

impl WeaveConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file doesn't exist, has invalid TOML syntax, or
    /// fails validation.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read weave config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WeaveConfig =
            toml::from_str(content).context("Failed to parse TOML weave config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for raw in &self.patcher.blacklist {
            Selector::parse(raw)
                .with_context(|| format!("Invalid blacklist selector '{}'", raw))?;
        }
        Ok(())
    }
}
