use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::{CompletionMode, HostOs, Scope, SetupError};

pub const BINARY_NAME: &str = "cmdry";
const VENDOR_DIR_NAME: &str = "Commandry";

pub fn resolve_scope(value: &str) -> Result<Scope, SetupError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "user" => Ok(Scope::User),
        "system" => Ok(Scope::System),
        _ => Err(SetupError::UnsupportedScope(value.to_string())),
    }
}

pub fn require_user_scope(scope: Scope) -> Result<(), SetupError> {
    match scope {
        Scope::User => Ok(()),
        Scope::System => Err(SetupError::ScopeUnavailable(scope)),
    }
}

pub fn resolve_completion(value: &str) -> Result<CompletionMode, SetupError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(CompletionMode::None),
        _ => Err(SetupError::UnsupportedCompletion(value.to_string())),
    }
}

pub fn default_bin_dir(os: HostOs) -> Result<PathBuf> {
    if os.is_windows() {
        if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
            let local_app_data = local_app_data.trim();
            if !local_app_data.is_empty() {
                return Ok(PathBuf::from(local_app_data)
                    .join(VENDOR_DIR_NAME)
                    .join("bin"));
            }
        }
        let home = home_dir()?;
        return Ok(home
            .join("AppData")
            .join("Local")
            .join(VENDOR_DIR_NAME)
            .join("bin"));
    }

    Ok(home_dir()?.join(".local").join("bin"))
}

pub fn current_executable() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to resolve executable path")?;
    Ok(exe.components().collect())
}

pub fn target_binary_path(os: HostOs, bin_dir: &Path) -> PathBuf {
    if os.is_windows() {
        bin_dir.join(format!("{BINARY_NAME}.exe"))
    } else {
        bin_dir.join(BINARY_NAME)
    }
}

pub fn split_path_list(os: HostOs, value: &str) -> impl Iterator<Item = &str> {
    value
        .split(os.path_list_separator())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

pub fn path_contains_dir(os: HostOs, path_env: &str, target: &str) -> bool {
    if target.trim().is_empty() {
        return false;
    }
    let normalized_target = normalize_path_for_compare(os, target);
    split_path_list(os, path_env)
        .any(|entry| normalize_path_for_compare(os, entry) == normalized_target)
}

/// Comparable form of a PATH entry: lexically cleaned, no trailing separators, and on Windows
/// backslash-separated and lowercased.
pub fn normalize_path_for_compare(os: HostOs, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if os.is_windows() {
        let cleaned = clean_lexical(&trimmed.replace('/', "\\"), '\\');
        return cleaned.trim_end_matches(['/', '\\']).to_lowercase();
    }

    let cleaned = clean_lexical(trimmed, '/');
    cleaned.trim_end_matches(['/', '\\']).to_string()
}

pub fn validate_no_control_chars(field: &'static str, value: &str) -> Result<(), SetupError> {
    if value.contains(['\0', '\n', '\r']) {
        return Err(SetupError::ControlCharacters { field });
    }
    Ok(())
}

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("failed to resolve home dir"))
}

fn clean_lexical(value: &str, separator: char) -> String {
    let rooted = value.starts_with(separator);
    let unc = separator == '\\' && value.starts_with("\\\\");

    let mut parts: Vec<&str> = Vec::new();
    for part in value.split(separator) {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&"..") => parts.push(".."),
                Some(last) if last.ends_with(':') => {}
                Some(_) => {
                    parts.pop();
                }
                None if rooted => {}
                None => parts.push(".."),
            },
            _ => parts.push(part),
        }
    }

    let body = parts.join(&separator.to_string());
    let prefix = if unc {
        "\\\\".to_string()
    } else if rooted {
        separator.to_string()
    } else {
        String::new()
    };
    let cleaned = format!("{prefix}{body}");
    if cleaned.is_empty() {
        ".".to_string()
    } else {
        cleaned
    }
}
