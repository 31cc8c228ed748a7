//! Daemon configuration
//!
//! A TOML file (`PROCMAN_CONFIG`, default `~/.procman/config.toml`) layered
//! under `PROCMAN__SECTION__KEY` environment overrides.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Source};
use procman_api_rpc::RpcServerConfig;
use procman_core::application::{ManagerSettings, TargetEntry};
use procman_infra_system::ConnectorSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "~/.procman/config.toml";
const ENV_PREFIX: &str = "PROCMAN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: RpcServerConfig,
    pub settings: ManagerSettings,
    pub channel: ConnectorSettings,
    pub targets: BTreeMap<String, TargetEntry>,
}

/// Location of the configuration file
pub fn config_path() -> PathBuf {
    let raw = std::env::var("PROCMAN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Load `path` (optional) plus environment overrides
pub fn load(path: &Path) -> Result<DaemonConfig> {
    let file = File::from(path).format(FileFormat::Toml).required(false);
    from_sources(file, environment())
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn from_sources<F>(file: F, env: Environment) -> Result<DaemonConfig>
where
    F: Source + Send + Sync + 'static,
{
    let config = Config::builder().add_source(file).add_source(env).build()?;
    Ok(config.try_deserialize()?)
}
