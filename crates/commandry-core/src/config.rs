use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub setup: SetupDefaults,
    #[serde(default)]
    pub log: LogConfig,
}

/// Defaults for `cmdry setup`; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupDefaults {
    pub bin_dir: Option<PathBuf>,
    pub no_path: Option<bool>,
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
}

pub fn config_path(config_root: &Path) -> PathBuf {
    config_root.join(CONFIG_FILE_NAME)
}

pub fn load_config(config_root: &Path) -> Result<AppConfig> {
    let path = config_path(config_root);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file: {}", path.display()));
        }
    };

    parse_config(&raw).with_context(|| format!("failed parsing config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config = toml::from_str::<AppConfig>(content)?;
    Ok(config)
}
