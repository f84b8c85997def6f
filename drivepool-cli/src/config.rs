//! CLI configuration handling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use drivepool_core::{CredentialSet, ManagerConfig};
use drivepool_graph::DEFAULT_GRAPH_URL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Token endpoint, TTLs and sweep interval.
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Base URL for Graph calls.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Credential sets keyed by pool name, registered on demand.
    #[serde(default)]
    pub pools: BTreeMap<String, CredentialSet>,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            graph_base_url: default_graph_base_url(),
            pools: BTreeMap::new(),
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    /// Credentials configured for `pool`.
    pub fn pool(&self, pool: &str) -> Result<&CredentialSet> {
        self.pools.get(pool).with_context(|| {
            format!(
                "Pool {:?} is not configured in {:?}",
                pool, self.config_path
            )
        })
    }
}

/// Load configuration from `path`, or from the default location.
///
/// An explicit path must exist. A missing file at the default location
/// yields the defaults with no pools.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let (config_path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    let mut config = if required || config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("drivepool.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "drivepool")
}
