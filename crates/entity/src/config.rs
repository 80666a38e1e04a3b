//! Entity layer configuration
//!
//! Controls how relation targets are resolved during a load and which
//! relations take part in the owner's save and delete lifecycle.

use std::env;
use std::str::FromStr;

const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

/// Configuration error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// How a relation load resolves its target entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetResolution {
    /// One `find_one` at a time, in link-row order
    Sequential,
    /// Up to `limit` lookups in flight; results keep link-row order
    Concurrent { limit: usize },
}

impl Default for TargetResolution {
    fn default() -> Self {
        TargetResolution::Sequential
    }
}

/// Entity layer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EntityConfig {
    pub target_resolution: TargetResolution,
    /// Default for relations that don't set `auto_save` themselves
    pub auto_save_relations: bool,
    /// Default for relations that don't set `auto_delete` themselves
    pub auto_delete_links: bool,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            target_resolution: TargetResolution::Sequential,
            auto_save_relations: true,
            auto_delete_links: false,
        }
    }
}

impl EntityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve targets with up to `limit` concurrent lookups
    pub fn with_concurrent_lookups(mut self, limit: usize) -> Self {
        self.target_resolution = TargetResolution::Concurrent { limit };
        self
    }

    /// Resolve targets one at a time
    pub fn with_sequential_lookups(mut self) -> Self {
        self.target_resolution = TargetResolution::Sequential;
        self
    }

    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save_relations = auto_save;
        self
    }

    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete_links = auto_delete;
        self
    }

    /// Load configuration from `ELIF_ENTITY_*` environment variables,
    /// falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any `ELIF_ENTITY_*` key lookup.
    ///
    /// A concurrency limit without an explicit resolution selects concurrent
    /// lookups; `concurrent` without a limit uses 8.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let limit = lookup("ELIF_ENTITY_LOOKUP_CONCURRENCY")
            .map(|value| {
                parse_var::<usize>("ELIF_ENTITY_LOOKUP_CONCURRENCY", &value, "a positive integer")
            })
            .transpose()?;

        if let Some(value) = lookup("ELIF_ENTITY_TARGET_RESOLUTION") {
            config.target_resolution = match value.trim().to_lowercase().as_str() {
                "sequential" => TargetResolution::Sequential,
                "concurrent" => TargetResolution::Concurrent {
                    limit: limit.unwrap_or(DEFAULT_LOOKUP_CONCURRENCY),
                },
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "ELIF_ENTITY_TARGET_RESOLUTION".to_string(),
                        value,
                        expected: "sequential or concurrent".to_string(),
                    })
                }
            };
        } else if let Some(limit) = limit {
            config.target_resolution = TargetResolution::Concurrent { limit };
        }

        if let Some(value) = lookup("ELIF_ENTITY_AUTO_SAVE") {
            config.auto_save_relations = parse_bool("ELIF_ENTITY_AUTO_SAVE", &value)?;
        }
        if let Some(value) = lookup("ELIF_ENTITY_AUTO_DELETE") {
            config.auto_delete_links = parse_bool("ELIF_ENTITY_AUTO_DELETE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let TargetResolution::Concurrent { limit: 0 } = self.target_resolution {
            return Err(ConfigError::InvalidValue {
                field: "target_resolution.limit".to_string(),
                value: "0".to_string(),
                expected: "a positive integer".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(field: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}
