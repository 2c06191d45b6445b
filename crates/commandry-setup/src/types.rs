use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    User,
    System,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    #[default]
    None,
}

impl CompletionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
        }
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform family whose PATH and binary conventions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Windows,
    Posix,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Posix if cfg!(windows) => "posix",
            Self::Posix => std::env::consts::OS,
        }
    }

    pub fn path_list_separator(self) -> char {
        match self {
            Self::Windows => ';',
            Self::Posix => ':',
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("unsupported scope {0:?} (use user)")]
    UnsupportedScope(String),
    #[error("scope {0} is not available: only user scope is available")]
    ScopeUnavailable(Scope),
    #[error("unsupported completion mode {0:?} (use none)")]
    UnsupportedCompletion(String),
    #[error("{field} contains unsupported control characters")]
    ControlCharacters { field: &'static str },
}

/// Shared input of plan and apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyInput {
    pub scope: Scope,
    pub bin_dir: Option<PathBuf>,
    pub no_path: bool,
    pub completion: CompletionMode,
    pub source_binary_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub os: String,
    pub scope: Scope,
    pub current_executable_path: PathBuf,
    pub target_bin_dir: PathBuf,
    pub target_binary_path: PathBuf,
    pub actions: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub installed_bin_path: PathBuf,
    pub state_path: PathBuf,
    pub path_entry_added: String,
    pub path_changed: bool,
    pub created_dirs: Vec<PathBuf>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub state_path: PathBuf,
    pub changed: bool,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub os: String,
    pub scope: Scope,
    pub current_exe: PathBuf,
    pub bin_dir: PathBuf,
    pub target_binary_path: PathBuf,
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_matches_current: Option<bool>,
    pub path_ok: bool,
    pub state_found: bool,
    pub pending_finalize: bool,
    pub state_path: PathBuf,
}
