use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::query::{Parameter, SearchKind};
use crate::rewrite::code_insights_query_defaults;

const APP_NAME: &str = "qrw";
const CONFIG_FILE: &str = "config.json";

/// CLI configuration stored in the platform config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// How bare patterns are read when a query has no `patterntype:`
    #[serde(default)]
    pub search_kind: SearchKind,

    /// Whether insight defaults exclude forks and archived repositories
    /// (an insight over every repository) or include them (an insight over
    /// repositories picked by hand)
    #[serde(default = "default_all_repos")]
    pub all_repos: bool,
}

fn default_all_repos() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_kind: SearchKind::default(),
            all_repos: default_all_repos(),
        }
    }
}

impl AppConfig {
    /// Load config from the config directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load config from an explicit file, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to an explicit file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Defaults applied to insight queries
    pub fn insight_defaults(&self) -> Vec<Parameter> {
        code_insights_query_defaults(self.all_repos)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(APP_NAME).join(CONFIG_FILE))
}
