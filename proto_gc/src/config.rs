//! Collector configuration parameters.
//!
//! The collector itself has no tuning knobs that affect correctness; these
//! settings control when the scheduler is told to collect, and how much
//! checking happens around a pass.

use std::env;
use thiserror::Error;

/// Environment variable overriding [`CollectorConfig::root_buffer_trigger`].
pub const ENV_ROOT_TRIGGER: &str = "PROTO_GC_ROOT_TRIGGER";
/// Environment variable overriding [`CollectorConfig::initial_root_capacity`].
pub const ENV_ROOT_CAPACITY: &str = "PROTO_GC_ROOT_CAPACITY";
/// Environment variable overriding [`CollectorConfig::collect_on_drop`].
pub const ENV_COLLECT_ON_DROP: &str = "PROTO_GC_COLLECT_ON_DROP";
/// Environment variable overriding [`CollectorConfig::verify_roots`].
pub const ENV_VERIFY_ROOTS: &str = "PROTO_GC_VERIFY_ROOTS";

/// Largest ratio of initial root capacity to the collection trigger.
const MAX_CAPACITY_RATIO: usize = 16;

/// Configuration for the cycle collector.
///
/// # Example
///
/// ```ignore
/// use proto_gc::CollectorConfig;
///
/// // Collect rarely; the interpreter runs long batch jobs
/// let config = CollectorConfig {
///     root_buffer_trigger: 64 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    // =========================================================================
    // Collection Triggers
    // =========================================================================
    /// Number of buffered suspect roots at which `should_collect()` starts
    /// returning true.
    ///
    /// The scheduler polls this between task activations; the collector
    /// never starts a pass on its own.
    ///
    /// Default: 1024
    pub root_buffer_trigger: usize,

    /// Capacity preallocated for the root set.
    ///
    /// Default: 256
    pub initial_root_capacity: usize,

    // =========================================================================
    // Teardown
    // =========================================================================
    /// Run a final collection pass when the owning `Heap` is dropped.
    ///
    /// Default: true
    pub collect_on_drop: bool,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Check root set invariants after each pass.
    ///
    /// Default: false (enabled in debug builds)
    pub verify_roots: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            root_buffer_trigger: 1024,
            initial_root_capacity: 256,
            collect_on_drop: true,
            verify_roots: cfg!(debug_assertions),
        }
    }
}

impl CollectorConfig {
    /// Create a configuration that collects often, keeping pauses short.
    pub fn low_latency() -> Self {
        Self {
            root_buffer_trigger: 128,
            initial_root_capacity: 128,
            ..Default::default()
        }
    }

    /// Create a configuration that collects rarely, amortizing pass cost.
    pub fn high_throughput() -> Self {
        Self {
            root_buffer_trigger: 16 * 1024,
            initial_root_capacity: 4 * 1024,
            ..Default::default()
        }
    }

    /// Build a configuration from the defaults, overridden by `PROTO_GC_*`
    /// environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(trigger) = env_parse::<usize>(ENV_ROOT_TRIGGER)? {
            config.root_buffer_trigger = trigger;
        }
        if let Some(capacity) = env_parse::<usize>(ENV_ROOT_CAPACITY)? {
            config.initial_root_capacity = capacity;
        }
        if let Some(collect) = env_bool(ENV_COLLECT_ON_DROP)? {
            config.collect_on_drop = collect;
        }
        if let Some(verify) = env_bool(ENV_VERIFY_ROOTS)? {
            config.verify_roots = verify;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_buffer_trigger == 0 {
            return Err(ConfigError::ZeroRootTrigger);
        }
        let max_capacity = self.root_buffer_trigger.saturating_mul(MAX_CAPACITY_RATIO);
        if self.initial_root_capacity > max_capacity {
            return Err(ConfigError::RootCapacityTooLarge {
                capacity: self.initial_root_capacity,
                max: max_capacity,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The root trigger must be at least 1.
    #[error("root buffer trigger must be at least 1")]
    ZeroRootTrigger,

    /// The preallocated root capacity is out of proportion to the trigger.
    #[error("initial root capacity {capacity} exceeds maximum {max}")]
    RootCapacityTooLarge {
        /// Requested capacity.
        capacity: usize,
        /// Largest accepted capacity for the configured trigger.
        max: usize,
    },

    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

fn env_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv { var, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CollectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preset_configs_are_valid() {
        assert!(CollectorConfig::low_latency().validate().is_ok());
        assert!(CollectorConfig::high_throughput().validate().is_ok());
    }

    #[test]
    fn test_zero_trigger_rejected() {
        let config = CollectorConfig {
            root_buffer_trigger: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRootTrigger));
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        let config = CollectorConfig {
            root_buffer_trigger: 4,
            initial_root_capacity: 1000,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RootCapacityTooLarge {
                capacity: 1000,
                max: 64
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::InvalidEnv {
            var: ENV_ROOT_TRIGGER,
            value: "lots".into(),
        };
        assert_eq!(err.to_string(), "invalid value \"lots\" for PROTO_GC_ROOT_TRIGGER");
        assert_eq!(
            ConfigError::ZeroRootTrigger.to_string(),
            "root buffer trigger must be at least 1"
        );
    }
}
