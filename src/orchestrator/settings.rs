use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::retry_policy::RemovalPolicy;
use crate::orchestrator::worker::WorkerContext;
use crate::{
    DEFAULT_KILL_WAIT_SECS, DEFAULT_REMOVAL_POLL_MS, DEFAULT_REMOVAL_SETTLE_MS,
    DEFAULT_RETRY_INTERVAL_MS,
};

pub const DEFAULT_CONFIG_FILE: &str = "config/deployer";
pub const ENV_PREFIX: &str = "DEPLOYER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub artifact: ArtifactSettings,
    #[serde(default)]
    pub deployment: DeploymentSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Cluster configuration entries, merged over the built-in defaults
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub config_dir: PathBuf,
    pub jar: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("conf/cluster"),
            jar: "topology.jar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSettings {
    pub retry_interval_ms: u64,
    pub jitter: bool,
    pub kill_wait_secs: u64,
    pub removal_poll_ms: u64,
    pub removal_settle_ms: u64,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            jitter: false,
            kill_wait_secs: DEFAULT_KILL_WAIT_SECS,
            removal_poll_ms: DEFAULT_REMOVAL_POLL_MS,
            removal_settle_ms: DEFAULT_REMOVAL_SETTLE_MS,
        }
    }
}

fn default_cluster_config() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("control_host".to_string(), json!("localhost")),
        ("control_port".to_string(), json!(6627)),
        ("topology_workers".to_string(), json!(1)),
        ("topology_debug".to_string(), json!(false)),
        ("topology_message_timeout_secs".to_string(), json!(30)),
    ])
}

impl Settings {
    /// Load `config/deployer.*` if present, overlaid with `DEPLOYER__*` env vars
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    /// Load from `path` (which must exist) or the default location, then env vars.
    ///
    /// Env vars use `__` between path segments, e.g.
    /// `DEPLOYER__DEPLOYMENT__RETRY_INTERVAL_MS=500`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read deployer configuration")?
            .try_deserialize()
            .context("Failed to parse deployer configuration")?;

        settings
            .validate()
            .with_context(|| "Configuration validation failed")?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deployment.retry_interval_ms == 0 {
            return Err(anyhow::anyhow!("retry_interval_ms must be greater than 0"));
        }

        if self.deployment.removal_poll_ms == 0 {
            return Err(anyhow::anyhow!("removal_poll_ms must be greater than 0"));
        }

        if self.artifact.jar.trim().is_empty() {
            return Err(anyhow::anyhow!("artifact jar name must not be empty"));
        }

        Ok(())
    }

    /// Built-in cluster defaults with the configured entries applied on top
    pub fn effective_cluster_config(&self) -> BTreeMap<String, Value> {
        let mut merged = default_cluster_config();
        merged.extend(
            self.cluster
                .config
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        merged
    }

    pub fn serialized_cluster_config(&self) -> Result<String> {
        serde_json::to_string(&self.effective_cluster_config())
            .context("Failed to serialize cluster configuration")
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.artifact.config_dir.join(&self.artifact.jar)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.deployment.retry_interval_ms)
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy {
            kill_wait_secs: self.deployment.kill_wait_secs,
            poll_interval: Duration::from_millis(self.deployment.removal_poll_ms),
            settle_delay: Duration::from_millis(self.deployment.removal_settle_ms),
        }
    }

    pub fn worker_context(&self) -> Result<WorkerContext> {
        Ok(WorkerContext {
            artifact_path: self.artifact_path(),
            serialized_config: self.serialized_cluster_config()?,
            removal: self.removal_policy(),
            jitter: self.deployment.jitter,
        })
    }
}

/// Write the default settings to `path` as TOML
pub fn create_sample_config(path: &Path) -> Result<()> {
    let mut settings = Settings::default();
    settings.cluster.config = default_cluster_config();
    let toml_content =
        toml::to_string_pretty(&settings).context("Failed to serialize default config")?;

    fs::write(path, toml_content)
        .with_context(|| format!("Failed to write sample config to: {}", path.display()))?;

    log::info!("Sample configuration written to: {}", path.display());
    Ok(())
}
