//! # Netsight Configuration System
//!
//! Layered configuration for the capture pipeline.
//!
//! ## Features
//! - **Unified Configuration**: one typed tree shared by capture, aggregation,
//!   history and logging
//! - **Validation**: ranges and formats checked with `validator` after every load
//! - **Environment Awareness**: per-environment overrides and `NETSIGHT_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod aggregate;
mod capture;
mod error;
mod history;
mod telemetry;
mod validation;

pub use aggregate::AggregateConfig;
pub use aggregate::ManagerConfig;
pub use capture::default_local_networks;
pub use capture::CaptureConfig;
pub use error::ConfigError;
pub use history::HistoryConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/netsight.yaml";
const ENV_PREFIX: &str = "NETSIGHT_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct NetsightConfig {
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    #[validate(nested)]
    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[validate(nested)]
    #[serde(default)]
    pub manager: ManagerConfig,

    #[validate(nested)]
    #[serde(default)]
    pub history: HistoryConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl NetsightConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/netsight.yaml`, if present
    /// 3. `config/<NETSIGHT_ENV>.yaml`, if present (`NETSIGHT_ENV` defaults to `production`)
    /// 4. `NETSIGHT_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(NetsightConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            debug!("{BASE_FILE} not found, using default configuration");
        }

        let env = std::env::var("NETSIGHT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, still honouring `NETSIGHT_*`
    /// overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(NetsightConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_validation() {
        let config = NetsightConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn environment_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("NETSIGHT_CAPTURE__INTERFACE", "eth1");
            jail.set_env("NETSIGHT_HISTORY__SAVE_INTERVAL_SECS", "60");
            let config = NetsightConfig::load().expect("config should load");
            assert_eq!(config.capture.interface, "eth1");
            assert_eq!(config.history.save_interval_secs, 60);
            assert_eq!(config.aggregate.flush_interval_ms, 1000);
            Ok(())
        });
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/netsight.yaml",
                r#"
capture:
  interface: en0
  local_networks: ["10.0.0.0/8"]
history:
  data_dir: /var/lib/netsight
"#,
            )?;
            let config = NetsightConfig::load().expect("config should load");
            assert_eq!(config.capture.interface, "en0");
            assert_eq!(config.capture.local_networks.len(), 1);
            assert_eq!(config.history.data_dir, std::path::PathBuf::from("/var/lib/netsight"));
            assert!(config.capture.promiscuous);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_fail_validation() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "aggregate:\n  flush_interval_ms: 1\n")?;
            let err = NetsightConfig::load_from_path("bad.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = NetsightConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
