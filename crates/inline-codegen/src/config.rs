//! Inliner configuration
//!
//! Limits and switches for inline expansion. Loaded from TOML or built in
//! code:
//!
//! ```rust,ignore
//! use inlinegen::InlineConfig;
//!
//! let config = InlineConfig::new()
//!     .with_max_inline_depth(8)
//!     .with_recursive_inline(false);
//! ```
//!
//! ```toml
//! max_inline_depth = 8
//! reuse_locals = false
//! ```

use serde::Deserialize;
use std::path::Path;

/// Configuration for inline expansion
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InlineConfig {
    /// Maximum nesting of inline expansions before the driver gives up
    pub max_inline_depth: usize,

    /// Allow a callee to be expanded while it is already being expanded.
    ///
    /// Only the depth limit stops runaway expansion when this is on.
    pub allow_recursive_inline: bool,

    /// Reuse a local that already holds an argument of the expected type
    /// instead of copying it into a fresh slot
    pub reuse_locals: bool,

    /// Verify the operand stack depth after every expansion
    pub check_stack_balance: bool,
}

impl Default for InlineConfig {
    fn default() -> Self {
        InlineConfig {
            max_inline_depth: 32,
            allow_recursive_inline: false,
            reuse_locals: true,
            check_stack_balance: true,
        }
    }
}

impl InlineConfig {
    /// Create a configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: InlineConfig = toml::from_str(toml_str)
            .map_err(|e| format!("Failed to parse inline config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub fn with_max_inline_depth(mut self, depth: usize) -> Self {
        self.max_inline_depth = depth;
        self
    }

    pub fn with_recursive_inline(mut self, allow: bool) -> Self {
        self.allow_recursive_inline = allow;
        self
    }

    pub fn with_reuse_locals(mut self, reuse: bool) -> Self {
        self.reuse_locals = reuse;
        self
    }

    pub fn with_stack_balance_check(mut self, check: bool) -> Self {
        self.check_stack_balance = check;
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_inline_depth == 0 {
            return Err("max_inline_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InlineConfig::default();
        assert_eq!(config.max_inline_depth, 32);
        assert!(!config.allow_recursive_inline);
        assert!(config.reuse_locals);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InlineConfig::from_toml("max_inline_depth = 4").unwrap();
        assert_eq!(config.max_inline_depth, 4);
        assert!(config.reuse_locals);
        assert!(config.check_stack_balance);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = InlineConfig::from_toml("max_depth = 4").unwrap_err();
        assert!(err.contains("Failed to parse inline config"));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = InlineConfig::from_toml("max_inline_depth = 0").unwrap_err();
        assert!(err.contains("at least 1"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow_recursive_inline = true").unwrap();
        writeln!(file, "reuse_locals = false").unwrap();

        let config = InlineConfig::load(file.path()).unwrap();
        assert!(config.allow_recursive_inline);
        assert!(!config.reuse_locals);
    }

    #[test]
    fn test_builder() {
        let config = InlineConfig::new()
            .with_max_inline_depth(2)
            .with_recursive_inline(true)
            .with_reuse_locals(false)
            .with_stack_balance_check(false);
        assert_eq!(config.max_inline_depth, 2);
        assert!(config.allow_recursive_inline);
        assert!(!config.reuse_locals);
        assert!(!config.check_stack_balance);
    }
}
