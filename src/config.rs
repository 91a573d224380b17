//! Application configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use config::Config as ConfigBuilder;
use serde::{Deserialize, Serialize};

use crate::serde_types::Config;

pub const SITES_FILE_NAME: &str = "sharenix.json";

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_plugin_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("sharenix/{}", crate::VERSION)
}

/// Application configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(default = "default_plugin_timeout")]
    pub plugin_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sites document path. Skips the search path when set.
    #[serde(default)]
    pub sites: Option<PathBuf>,
    /// Storage directory. Defaults to `$HOME/<SaveFolder>`.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            plugin_timeout: default_plugin_timeout(),
            user_agent: default_user_agent(),
            sites: None,
            storage_dir: None,
        }
    }
}

/// Load application configuration.
pub fn load_config(config_path: &Option<PathBuf>) -> Result<AppConfig> {
    let mut config_builder = ConfigBuilder::builder().add_source(
        config::Environment::with_prefix("SHARENIX")
            .separator("__")
            .list_separator(","),
    );

    if let Some(path) = config_path {
        config_builder = config_builder.add_source(config::File::from(path.clone()).required(true));
    }

    let config = config_builder.build().context("failed to load config")?;

    debug!("Raw configuration: {:#?}", config);

    let app: AppConfig = config
        .try_deserialize()
        .context("failed to deserialize config")?;

    debug!("Loaded application configuration: {:#?}", app);

    Ok(app)
}

/// Candidate locations of the sites document, highest precedence first.
pub fn sites_search_path() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{SITES_FILE_NAME}")));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(exe_dir.join(SITES_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc").join(SITES_FILE_NAME));
    paths
}

/// Load the sites document. The first readable candidate wins.
pub fn load_sites(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::from_file(path)
            .with_context(|| format!("failed to load sites file {}", path.display()));
    }

    for path in candidates {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping sites file {}: {}", path.display(), e);
                continue;
            }
        };
        info!("Loading sites from {}", path.display());
        return Config::from_json(&data)
            .with_context(|| format!("failed to parse sites file {}", path.display()));
    }

    Err(anyhow!(
        "no readable sites file found, tried: {}",
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ))
}
