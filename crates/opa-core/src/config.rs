//! Runtime configuration for policy sessions.
//!
//! # Examples
//!
//! ```
//! use opa_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::default();
//! assert_eq!(config.initial_memory_pages, 5);
//! assert_eq!(config.memory_limit.megabytes(), 256);
//! assert!(config.validate().is_ok());
//!
//! let custom = RuntimeConfig::builder()
//!     .memory_limit_mb(64)
//!     .max_fuel(50_000_000)
//!     .strict_builtin_errors(true)
//!     .build()
//!     .unwrap();
//! assert_eq!(custom.max_fuel, Some(50_000_000));
//! ```

use crate::{Error, MemoryLimit, Result};
use serde::{Deserialize, Serialize};

/// Size of one wasm page in bytes.
const WASM_PAGE_BYTES: usize = 64 * 1024;

/// Configuration shared by every session a runtime creates.
///
/// Deserializes from TOML or JSON; missing keys take their defaults.
///
/// # Examples
///
/// ```
/// use opa_core::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{"max_fuel": 1000}"#).unwrap();
/// assert_eq!(config.max_fuel, Some(1000));
/// assert_eq!(config.initial_memory_pages, RuntimeConfig::DEFAULT_INITIAL_PAGES);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Pages the host allocates for the shared linear memory.
    ///
    /// Must cover the minimum the policy module declares for its
    /// imported memory. Default: 5
    pub initial_memory_pages: u32,

    /// Maximum size linear memory may grow to.
    ///
    /// Enforced on every growth request. Default: 256MB
    pub memory_limit: MemoryLimit,

    /// Fuel budget for each session operation.
    ///
    /// Refilled before every `set_data` or evaluation, covering the
    /// builtin calls the guest makes during it. `None` disables fuel
    /// metering. Default: None
    pub max_fuel: Option<u64>,

    /// Fail calls when a builtin rejects its arguments.
    ///
    /// When `false`, a rejecting builtin yields "no value" and the
    /// expression that used it is undefined. Default: false
    pub strict_builtin_errors: bool,

    /// Number of compiled modules the runtime keeps cached.
    ///
    /// Default: 16
    pub module_cache_capacity: usize,
}

impl RuntimeConfig {
    /// Default initial memory: 5 pages (320KB).
    pub const DEFAULT_INITIAL_PAGES: u32 = 5;

    /// Default compiled module cache capacity.
    pub const DEFAULT_CACHE_CAPACITY: usize = 16;

    /// Largest page count a wasm32 memory can have.
    pub const MAX_PAGES: u32 = 65_536;

    /// Creates a new configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Returns the initial memory size in bytes.
    #[inline]
    #[must_use]
    pub const fn initial_memory_bytes(&self) -> usize {
        self.initial_memory_pages as usize * WASM_PAGE_BYTES
    }

    /// Validates configuration consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if:
    /// - `initial_memory_pages` is zero or above [`Self::MAX_PAGES`]
    /// - the initial memory does not fit the memory limit
    /// - `module_cache_capacity` is zero
    pub fn validate(&self) -> Result<()> {
        if self.initial_memory_pages == 0 || self.initial_memory_pages > Self::MAX_PAGES {
            return Err(Error::ConfigError {
                message: format!(
                    "initial_memory_pages must be between 1 and {}, got {}",
                    Self::MAX_PAGES,
                    self.initial_memory_pages
                ),
            });
        }

        if self.initial_memory_bytes() > self.memory_limit.bytes() {
            return Err(Error::ConfigError {
                message: format!(
                    "initial memory ({} pages) exceeds memory limit {}",
                    self.initial_memory_pages, self.memory_limit
                ),
            });
        }

        if self.module_cache_capacity == 0 {
            return Err(Error::ConfigError {
                message: "module_cache_capacity must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_memory_pages: Self::DEFAULT_INITIAL_PAGES,
            memory_limit: MemoryLimit::default(),
            max_fuel: None,
            strict_builtin_errors: false,
            module_cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    initial_memory_pages: Option<u32>,
    memory_limit_mb: Option<usize>,
    max_fuel: Option<u64>,
    strict_builtin_errors: Option<bool>,
    module_cache_capacity: Option<usize>,
}

impl RuntimeConfigBuilder {
    /// Sets the initial linear memory size in pages.
    #[must_use]
    pub fn initial_memory_pages(mut self, pages: u32) -> Self {
        self.initial_memory_pages = Some(pages);
        self
    }

    /// Sets the memory limit in megabytes.
    #[must_use]
    pub fn memory_limit_mb(mut self, mb: usize) -> Self {
        self.memory_limit_mb = Some(mb);
        self
    }

    /// Sets the fuel budget per host-to-guest call.
    #[must_use]
    pub fn max_fuel(mut self, fuel: u64) -> Self {
        self.max_fuel = Some(fuel);
        self
    }

    /// Sets whether builtin argument errors fail the call.
    #[must_use]
    pub fn strict_builtin_errors(mut self, strict: bool) -> Self {
        self.strict_builtin_errors = Some(strict);
        self
    }

    /// Sets the compiled module cache capacity.
    #[must_use]
    pub fn module_cache_capacity(mut self, capacity: usize) -> Self {
        self.module_cache_capacity = Some(capacity);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the memory limit is out of range
    /// or [`RuntimeConfig::validate`] fails.
    pub fn build(self) -> Result<RuntimeConfig> {
        let defaults = RuntimeConfig::default();
        let memory_limit = match self.memory_limit_mb {
            Some(mb) => MemoryLimit::from_mb(mb)?,
            None => defaults.memory_limit,
        };

        let config = RuntimeConfig {
            initial_memory_pages: self
                .initial_memory_pages
                .unwrap_or(defaults.initial_memory_pages),
            memory_limit,
            max_fuel: self.max_fuel,
            strict_builtin_errors: self
                .strict_builtin_errors
                .unwrap_or(defaults.strict_builtin_errors),
            module_cache_capacity: self
                .module_cache_capacity
                .unwrap_or(defaults.module_cache_capacity),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.initial_memory_pages, 5);
        assert_eq!(config.initial_memory_bytes(), 5 * 64 * 1024);
        assert_eq!(config.memory_limit.megabytes(), 256);
        assert_eq!(config.max_fuel, None);
        assert!(!config.strict_builtin_errors);
        assert_eq!(config.module_cache_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::builder()
            .initial_memory_pages(2)
            .memory_limit_mb(8)
            .max_fuel(1_000)
            .strict_builtin_errors(true)
            .module_cache_capacity(4)
            .build()
            .unwrap();

        assert_eq!(config.initial_memory_pages, 2);
        assert_eq!(config.memory_limit.bytes(), 8 * 1024 * 1024);
        assert_eq!(config.max_fuel, Some(1_000));
        assert!(config.strict_builtin_errors);
        assert_eq!(config.module_cache_capacity, 4);
    }

    #[test]
    fn test_zero_pages_rejected() {
        let err = RuntimeConfig::builder()
            .initial_memory_pages(0)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_initial_memory_above_limit_rejected() {
        // 32 pages = 2MB
        let err = RuntimeConfig::builder()
            .initial_memory_pages(32)
            .memory_limit_mb(1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds memory limit"));
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let config = RuntimeConfig {
            module_cache_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_config() {
        let config: RuntimeConfig = toml::from_str(
            r"
            memory_limit = 64
            strict_builtin_errors = true
            ",
        )
        .unwrap();

        assert_eq!(config.memory_limit.megabytes(), 64);
        assert!(config.strict_builtin_errors);
        assert_eq!(config.initial_memory_pages, 5);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let result: std::result::Result<RuntimeConfig, _> = toml::from_str("memory_pages = 3");
        assert!(result.is_err());
    }
}
