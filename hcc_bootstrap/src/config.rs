// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Every process (three stage workers, the gateway, the watcher) is
//! configured from the same layered source, per §7.2: built-in defaults,
//! then an optional config file, then environment variable overrides — the
//! environment always wins. Configuration is validated eagerly at startup;
//! a missing required value is a startup failure, never a lazily
//! discovered runtime error.
//!
//! Environment variables use the `HCC__` prefix with `__` as the nesting
//! separator (e.g. `HCC__DATABASE__URL`, `HCC__LLM__TIMEOUT_SECS`), the
//! convention the `config` crate's `Environment` source expects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::exit_code::BootstrapError;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_exchange() -> String {
    "hcc-extractor".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactBackend {
    Local,
    S3,
    Gcs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactStoreConfig {
    pub backend: ArtifactBackend,
    /// Root directory for the `local` backend.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Bucket name for the `s3`/`gcs` backends.
    pub bucket: Option<String>,
    pub region: Option<String>,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./artifacts")
}

#[derive(Debug, Clone, Deserialize)]
pub struct HccReferenceConfig {
    pub csv_path: PathBuf,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl HccReferenceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "default".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Settings for `hcc-watcher`, the alternate filesystem upload source
/// (§10 of the expanded spec). Every other process ignores this section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_watch_dir() -> PathBuf {
    PathBuf::from("./watch")
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Files already enqueued are moved here so a restart never replays
    /// them; the original source's watchers do the equivalent by deleting
    /// or renaming the source object after a successful publish.
    pub fn processed_dir(&self) -> PathBuf {
        self.watch_dir.join(".processed")
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `"plain"` for local runs, `"json"` for production, per §7.1.
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> String {
    "plain".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

/// The complete, validated configuration for any of the five processes.
/// Fields a given process doesn't need (e.g. `http` for a stage worker)
/// are simply unused by that process, rather than splitting this into five
/// near-identical structs — every process is deployed from the same image
/// and config source, per §7.2.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub artifact_store: ArtifactStoreConfig,
    pub hcc_reference: HccReferenceConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from built-in defaults, an optional file, then
    /// the environment, in that order, with each layer overriding the
    /// last. Returns `BootstrapError::Configuration` (a non-zero exit
    /// startup failure) if a required field is still missing once every
    /// layer has been applied.
    pub fn load(config_file: Option<&Path>) -> Result<Self, BootstrapError> {
        let mut builder = config::Config::builder()
            .set_default("database.max_connections", 10i64)
            .map_err(config_err)?
            .set_default("broker.exchange", "hcc-extractor")
            .map_err(config_err)?
            .set_default("artifact_store.backend", "local")
            .map_err(config_err)?
            .set_default("artifact_store.local_root", "./artifacts")
            .map_err(config_err)?
            .set_default("hcc_reference.ttl_secs", 3600i64)
            .map_err(config_err)?
            .set_default("llm.model", "default")
            .map_err(config_err)?
            .set_default("llm.timeout_secs", 30i64)
            .map_err(config_err)?
            .set_default("http.bind_address", "0.0.0.0:8080")
            .map_err(config_err)?
            .set_default("watcher.watch_dir", "./watch")
            .map_err(config_err)?
            .set_default("watcher.poll_interval_secs", 10i64)
            .map_err(config_err)?
            .set_default("logging.format", "plain")
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix("HCC").separator("__"));

        let config = builder.build().map_err(config_err)?;
        config
            .try_deserialize()
            .map_err(|e| BootstrapError::Configuration(format!("invalid configuration: {e}")))
    }
}

fn config_err(e: config::ConfigError) -> BootstrapError {
    BootstrapError::Configuration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_fields_is_a_configuration_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "HCC__DATABASE__URL",
            "HCC__BROKER__URL",
            "HCC__HCC_REFERENCE__CSV_PATH",
            "HCC__LLM__ENDPOINT",
            "HCC__LLM__API_KEY",
        ] {
            env::remove_var(key);
        }
        let err = AppConfig::load(None).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn environment_overrides_supply_required_fields() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("HCC__DATABASE__URL", "postgres://localhost/hcc");
        env::set_var("HCC__BROKER__URL", "amqp://localhost");
        env::set_var("HCC__HCC_REFERENCE__CSV_PATH", "/data/hcc_codes.csv");
        env::set_var("HCC__LLM__ENDPOINT", "https://llm.example.com");
        env::set_var("HCC__LLM__API_KEY", "secret");

        let config = AppConfig::load(None).expect("all required fields supplied via environment");
        assert_eq!(config.database.url, "postgres://localhost/hcc");
        assert_eq!(config.hcc_reference.ttl_secs, 3600);

        for key in [
            "HCC__DATABASE__URL",
            "HCC__BROKER__URL",
            "HCC__HCC_REFERENCE__CSV_PATH",
            "HCC__LLM__ENDPOINT",
            "HCC__LLM__API_KEY",
        ] {
            env::remove_var(key);
        }
    }
}
