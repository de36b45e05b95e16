//! Scheduler Configuration
//!
//! Configuration for a weft scheduler instance. Values can be set
//! programmatically through the builder or loaded from environment
//! variables.
//!
//! # Environment Variables
//!
//! All environment variables use the `WEFT_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEFT_STACK_LIMIT` | Shared stack capacity in bytes | 8388608 (8 MiB) |
//! | `WEFT_INITIAL_SLOTS` | Initial coroutine table capacity | 128 |
//! | `WEFT_MAX_SLOTS` | Hard ceiling on table capacity | 8192 |
//! | `WEFT_LOG_LEVEL` | Log level (off/error/warn/info/debug/trace) | info |
//!
//! # Example
//!
//! ```rust,ignore
//! use weft::config::SchedulerConfig;
//!
//! // Load from environment with defaults.
//! let config = SchedulerConfig::from_env()?;
//!
//! // Or use the builder pattern.
//! let config = SchedulerConfig::builder()
//!     .stack_limit(4 * 1024 * 1024)
//!     .max_slots(1024)
//!     .build()?;
//! ```

use std::env;

use crate::log::LogLevel;

/// Default shared stack capacity: 8 MiB.
pub const DEFAULT_STACK_LIMIT: usize = 8 * 1024 * 1024;

/// Default initial coroutine table capacity.
pub const DEFAULT_INITIAL_SLOTS: usize = 128;

/// Default hard ceiling on table capacity.
pub const DEFAULT_MAX_SLOTS: usize = 8192;

/// Smallest accepted shared stack capacity: 64 KiB.
pub const MIN_STACK_LIMIT: usize = 64 * 1024;

/// Configuration for a scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Capacity of the shared scratch stack in bytes.
    pub stack_limit: usize,
    /// Initial capacity of the coroutine slot table.
    pub initial_slots: usize,
    /// Hard ceiling on slot table capacity; `spawn` fails beyond this.
    pub max_slots: usize,
    /// Log level applied when the scheduler is opened.
    pub log_level: LogLevel,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stack_limit: DEFAULT_STACK_LIMIT,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            max_slots: DEFAULT_MAX_SLOTS,
            log_level: LogLevel::default(),
        }
    }
}

impl SchedulerConfig {
    /// Create a builder with default values.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::new()
    }

    /// Load configuration from `WEFT_*` environment variables.
    ///
    /// Unset variables keep their defaults; a variable that is set but
    /// unparsable is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = read_env("WEFT_STACK_LIMIT")? {
            config.stack_limit = v;
        }
        if let Some(v) = read_env("WEFT_INITIAL_SLOTS")? {
            config.initial_slots = v;
        }
        if let Some(v) = read_env("WEFT_MAX_SLOTS")? {
            config.max_slots = v;
        }
        if let Ok(s) = env::var("WEFT_LOG_LEVEL") {
            config.log_level = LogLevel::parse(&s).ok_or_else(|| ConfigError::EnvParse {
                var: "WEFT_LOG_LEVEL".into(),
                message: format!("unknown log level '{}'", s),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_limit < MIN_STACK_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "stack_limit".into(),
                message: format!("must be at least {} bytes", MIN_STACK_LIMIT),
            });
        }
        if self.initial_slots == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_slots".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.max_slots < self.initial_slots {
            return Err(ConfigError::InvalidValue {
                field: "max_slots".into(),
                message: "must be at least initial_slots".into(),
            });
        }
        Ok(())
    }
}

/// Read a numeric environment variable, `None` if unset.
fn read_env(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(var) {
        Ok(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::EnvParse {
                var: var.into(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration error.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value.
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },
    /// Environment variable parse error.
    EnvParse {
        /// Variable name.
        var: String,
        /// Error message.
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, message } => {
                write!(f, "invalid configuration for '{}': {}", field, message)
            }
            ConfigError::EnvParse { var, message } => {
                write!(f, "failed to parse environment variable '{}': {}", var, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared stack capacity in bytes.
    pub fn stack_limit(mut self, bytes: usize) -> Self {
        self.config.stack_limit = bytes;
        self
    }

    /// Set the initial slot table capacity.
    pub fn initial_slots(mut self, slots: usize) -> Self {
        self.config.initial_slots = slots;
        self
    }

    /// Set the hard ceiling on slot table capacity.
    pub fn max_slots(mut self, slots: usize) -> Self {
        self.config.max_slots = slots;
        self
    }

    /// Set the log level applied when the scheduler is opened.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<SchedulerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
