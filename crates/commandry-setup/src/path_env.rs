use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use commandry_core::{locate, remove, upsert};
use tracing::debug;

use crate::fs_utils::{read_optional_string, write_file_atomic};
use crate::paths::{
    home_dir, normalize_path_for_compare, path_contains_dir, split_path_list,
    validate_no_control_chars,
};
use crate::state::TouchedFile;
use crate::HostOs;

pub const PATH_BLOCK_BEGIN: &str = "# >>> commandry PATH (v1) >>>";
pub const PATH_BLOCK_END: &str = "# <<< commandry PATH (v1) <<<";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub begin: &'static str,
    pub end: &'static str,
}

pub const PATH_MARKERS: MarkerPair = MarkerPair {
    begin: PATH_BLOCK_BEGIN,
    end: PATH_BLOCK_END,
};

/// Marker pair whose begin line matches a recorded touched-file marker.
pub fn marker_pair_for(begin: &str) -> Option<MarkerPair> {
    [PATH_MARKERS]
        .into_iter()
        .find(|pair| pair.begin == begin.trim())
}

/// Persistent per-user PATH value on Windows.
pub trait UserPathStore {
    fn read_user_path(&self) -> Result<String>;
    fn write_user_path(&self, value: &str) -> Result<()>;
}

/// Shell profile that receives the POSIX PATH block.
pub trait ProfileLocator {
    fn resolve_profile(&self) -> Result<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PowerShellUserPathStore;

impl UserPathStore for PowerShellUserPathStore {
    fn read_user_path(&self) -> Result<String> {
        let stdout = run_powershell(
            "[Console]::OutputEncoding = [Text.Encoding]::UTF8; \
             [Environment]::GetEnvironmentVariable('Path', 'User')",
            "failed to read user PATH",
        )?;
        Ok(stdout.trim_end_matches(['\r', '\n']).to_string())
    }

    fn write_user_path(&self, value: &str) -> Result<()> {
        validate_no_control_chars("user PATH", value)?;
        let script = format!(
            "[Environment]::SetEnvironmentVariable('Path', '{}', 'User')",
            escape_ps_single_quote(value)
        );
        run_powershell(&script, "failed to write user PATH")?;
        Ok(())
    }
}

fn powershell_exe() -> PathBuf {
    let system_root = std::env::var("SystemRoot")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "C:\\Windows".to_string());
    PathBuf::from(system_root)
        .join("System32")
        .join("WindowsPowerShell")
        .join("v1.0")
        .join("powershell.exe")
}

fn run_powershell(script: &str, context_message: &str) -> Result<String> {
    let output = Command::new(powershell_exe())
        .arg("-NoProfile")
        .arg("-NonInteractive")
        .arg("-Command")
        .arg(script)
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return decode_powershell_output(output.stdout).context(context_message.to_string());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

/// PATH read back from PowerShell is written back verbatim, so undecodable output is an error
/// rather than a lossy string.
pub(crate) fn decode_powershell_output(stdout: Vec<u8>) -> Result<String> {
    String::from_utf8(stdout).context("PowerShell output is not valid UTF-8")
}

fn escape_ps_single_quote(value: &str) -> String {
    value.replace('\'', "''")
}

#[derive(Debug, Clone, Default)]
pub struct ShellProfileLocator {
    home: Option<PathBuf>,
    shell: Option<String>,
    profile_override: Option<PathBuf>,
}

impl ShellProfileLocator {
    pub fn from_env() -> Self {
        Self {
            home: dirs::home_dir(),
            shell: std::env::var("SHELL").ok(),
            profile_override: None,
        }
    }

    pub fn with_override(mut self, profile: Option<PathBuf>) -> Self {
        self.profile_override = profile;
        self
    }
}

impl ProfileLocator for ShellProfileLocator {
    fn resolve_profile(&self) -> Result<PathBuf> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => home_dir()?,
        };

        if let Some(profile) = &self.profile_override {
            let raw = profile.to_string_lossy();
            if let Some(rest) = raw.strip_prefix("~/") {
                return Ok(home.join(rest));
            }
            return Ok(profile.clone());
        }

        Ok(profile_for_shell(
            &home,
            self.shell.as_deref(),
            cfg!(target_os = "macos"),
        ))
    }
}

pub fn profile_for_shell(home: &Path, shell: Option<&str>, macos: bool) -> PathBuf {
    let shell_name = shell
        .map(str::trim)
        .and_then(|shell| shell.rsplit('/').next())
        .unwrap_or_default();
    match shell_name {
        "zsh" => home.join(".zshrc"),
        "bash" if macos => home.join(".bash_profile"),
        "bash" => home.join(".bashrc"),
        _ => home.join(".profile"),
    }
}

/// Outcome of making a directory reachable through PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub changed: bool,
    pub path_entry: String,
    pub touched_file: Option<TouchedFile>,
    pub(crate) revert: Option<PathRevert>,
}

/// How to put PATH back the way it was before a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathRevert {
    UserPath(String),
    Profile {
        path: PathBuf,
        previous: Option<String>,
    },
}

/// New user PATH value: `bin_dir` first, then every other non-empty entry that is not an
/// equivalent of `bin_dir`, in original order.
pub fn build_windows_user_path_value(current: &str, bin_dir: &str) -> String {
    let os = HostOs::Windows;
    let target = normalize_path_for_compare(os, bin_dir);
    let mut entries = vec![bin_dir.trim().to_string()];
    entries.extend(
        split_path_list(os, current)
            .filter(|entry| normalize_path_for_compare(os, entry) != target)
            .map(str::to_string),
    );
    entries.join(";")
}

pub fn ensure_windows_user_path(store: &dyn UserPathStore, bin_dir: &str) -> Result<PathChange> {
    validate_no_control_chars("bin dir", bin_dir)?;
    let current = store.read_user_path()?;
    if path_contains_dir(HostOs::Windows, &current, bin_dir) {
        debug!(bin_dir, "user PATH already contains bin dir");
        return Ok(PathChange {
            changed: false,
            path_entry: bin_dir.to_string(),
            touched_file: None,
            revert: None,
        });
    }

    let next = build_windows_user_path_value(&current, bin_dir);
    store.write_user_path(&next)?;
    debug!(bin_dir, "prepended bin dir to user PATH");
    Ok(PathChange {
        changed: true,
        path_entry: bin_dir.to_string(),
        touched_file: None,
        revert: Some(PathRevert::UserPath(current)),
    })
}

/// Drop every equivalent of `entry` from the user PATH. Returns `true` when PATH was rewritten.
pub fn remove_windows_user_path_entry(store: &dyn UserPathStore, entry: &str) -> Result<bool> {
    Ok(drop_windows_user_path_entry(store, entry)?.is_some())
}

/// Like [`remove_windows_user_path_entry`], returning the value PATH had before the rewrite.
pub(crate) fn drop_windows_user_path_entry(
    store: &dyn UserPathStore,
    entry: &str,
) -> Result<Option<PathRevert>> {
    if entry.trim().is_empty() {
        return Ok(None);
    }
    let os = HostOs::Windows;
    let current = store.read_user_path()?;
    if !path_contains_dir(os, &current, entry) {
        return Ok(None);
    }

    let target = normalize_path_for_compare(os, entry);
    let next = split_path_list(os, &current)
        .filter(|candidate| normalize_path_for_compare(os, candidate) != target)
        .collect::<Vec<_>>()
        .join(";");
    store.write_user_path(&next)?;
    debug!(entry, "removed entry from user PATH");
    Ok(Some(PathRevert::UserPath(current)))
}

pub fn posix_path_block(bin_dir: &str) -> String {
    format!(
        "{PATH_BLOCK_BEGIN}\n\
         # Added by `cmdry setup`; remove with `cmdry setup undo`.\n\
         export PATH={}:\"$PATH\"\n\
         {PATH_BLOCK_END}",
        escape_single_quote_shell(bin_dir)
    )
}

fn escape_single_quote_shell(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

pub fn ensure_posix_user_path(profiles: &dyn ProfileLocator, bin_dir: &str) -> Result<PathChange> {
    validate_no_control_chars("bin dir", bin_dir)?;
    let profile = profiles.resolve_profile()?;
    validate_no_control_chars("profile path", &profile.to_string_lossy())?;

    let previous = read_optional_string(&profile)?;
    let edit = upsert(
        previous.as_deref().unwrap_or_default(),
        PATH_BLOCK_BEGIN,
        PATH_BLOCK_END,
        &posix_path_block(bin_dir),
    )
    .with_context(|| format!("failed to update PATH block in {}", profile.display()))?;

    if edit.changed {
        if let Some(parent) = profile.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create profile directory: {}", parent.display())
            })?;
        }
        write_file_atomic(&profile, &edit.content)
            .with_context(|| format!("failed to write profile: {}", profile.display()))?;
        debug!(profile = %profile.display(), "wrote PATH block");
    }

    Ok(PathChange {
        changed: edit.changed,
        path_entry: bin_dir.to_string(),
        touched_file: Some(TouchedFile {
            path: profile.to_string_lossy().into_owned(),
            marker: PATH_BLOCK_BEGIN.to_string(),
        }),
        revert: edit.changed.then(|| PathRevert::Profile {
            path: profile,
            previous,
        }),
    })
}

pub fn remove_posix_path_block(profile: &Path) -> Result<bool> {
    remove_marker_block(profile, PATH_MARKERS)
}

/// Strip the marker block from `path`. Missing files are left alone. Returns `true` when the
/// file was rewritten.
pub fn remove_marker_block(path: &Path, markers: MarkerPair) -> Result<bool> {
    let Some(content) = read_optional_string(path)? else {
        return Ok(false);
    };
    let edit = remove(&content, markers.begin, markers.end)
        .with_context(|| format!("failed to remove marker block from {}", path.display()))?;
    if !edit.changed {
        return Ok(false);
    }
    write_file_atomic(path, &edit.content)?;
    Ok(true)
}

/// Whether `path` still carries a well-formed block for `markers`.
pub fn file_has_marker_block(path: &Path, markers: MarkerPair) -> bool {
    match read_optional_string(path) {
        Ok(Some(content)) => matches!(locate(&content, markers.begin, markers.end), Ok(Some(_))),
        _ => false,
    }
}
