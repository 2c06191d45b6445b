use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs_utils::{read_optional_string, remove_file_if_exists};

pub const STATE_SCHEMA_VERSION: u32 = 1;
pub const STATE_FILE_NAME: &str = "setup-state.json";

/// A file that carries one of our marker blocks, identified by its begin marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchedFile {
    pub path: String,
    pub marker: String,
}

/// Record of the changes a successful apply owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub installed_bin_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path_entry_added: String,
    #[serde(default)]
    pub files_touched: Vec<TouchedFile>,
    #[serde(default)]
    pub created_dirs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Fields written by other versions, kept so a rewrite does not drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

pub fn default_state_path() -> Result<PathBuf> {
    let root = commandry_core::resolve_config_root()?;
    Ok(root.join(STATE_FILE_NAME))
}

pub fn load_state(path: &Path) -> Result<Option<StateFile>> {
    let Some(raw) = read_optional_string(path)
        .with_context(|| format!("failed to read setup state: {}", path.display()))?
    else {
        return Ok(None);
    };

    let mut state: StateFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing setup state: {}", path.display()))?;
    if state.schema_version == 0 {
        state.schema_version = STATE_SCHEMA_VERSION;
    }
    Ok(Some(state))
}

/// Persist `state` atomically and return what was written.
pub fn save_state(path: &Path, state: &StateFile) -> Result<StateFile> {
    let mut state = state.clone();
    if state.schema_version == 0 {
        state.schema_version = STATE_SCHEMA_VERSION;
    }
    if state.timestamp.is_none() {
        state.timestamp = Some(Utc::now());
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_private_dir_all(parent)
            .with_context(|| format!("failed to create state dir: {}", parent.display()))?;
    }

    let mut payload =
        serde_json::to_vec_pretty(&state).context("failed to serialize setup state")?;
    payload.push(b'\n');

    let tmp_path = temp_state_path(path);
    if let Err(err) = write_private_file(&tmp_path, &payload) {
        let _ = remove_file_if_exists(&tmp_path);
        return Err(err)
            .with_context(|| format!("failed to write setup state: {}", tmp_path.display()));
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = remove_file_if_exists(&tmp_path);
        return Err(err).with_context(|| {
            format!(
                "failed to replace setup state {} -> {}",
                tmp_path.display(),
                path.display()
            )
        });
    }

    Ok(state)
}

pub fn delete_state(path: &Path) -> Result<bool> {
    remove_file_if_exists(path)
        .with_context(|| format!("failed to remove setup state: {}", path.display()))
}

fn temp_state_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| STATE_FILE_NAME.into());
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

fn create_private_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn write_private_file(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(payload)?;
    file.sync_all()
}
