//! Configuration management module for the controller.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (TOML or YAML)
//! - Environment variable overrides
//! - Component-wise validation
mod controller;
mod informer;
mod log;
mod monitoring;
mod notifier;
mod queue;
mod retry;
mod staleness;
pub use controller::*;
pub use informer::*;
pub use log::*;
pub use monitoring::*;
pub use notifier::*;
pub use queue::*;
pub use retry::*;
pub use staleness::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Env var naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "CONVOY_CONFIG";

const ENV_PREFIX: &str = "CONVOY";

/// Main configuration container for the controller components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONVOY_CONFIG`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ConvoyConfig {
    /// Worker pool and startup gate
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Work queue backoff and rate limits
    #[serde(default)]
    pub queue: QueueConfig,
    /// Stale event policy
    #[serde(default)]
    pub staleness: StalenessConfig,
    /// Watch/cache synchronizer behaviour
    #[serde(default)]
    pub informer: InformerConfig,
    /// Alerting sink target
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Metrics exposition
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

impl Debug for ConvoyConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConvoyConfig")
            .field("controller", &self.controller)
            .field("queue", &self.queue)
            .finish()
    }
}

impl ConvoyConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONVOY_CONFIG` environment variable (if set)
    /// 3. Environment variables with `CONVOY__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Validation is deferred to allow
    /// further overrides via `with_override_config()`. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONVOY_CONFIG", "config.yml");
    /// std::env::set_var("CONVOY__CONTROLLER__WORKERS", "4");
    /// let cfg = ConvoyConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns validation errors from any subsystem:
    /// - Zero workers
    /// - Inverted backoff bounds
    /// - Invalid metrics port
    pub fn validate(self) -> Result<Self> {
        self.controller.validate()?;
        self.queue.validate()?;
        self.staleness.validate()?;
        self.informer.validate()?;
        self.notifier.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
