mod activation;
mod apply;
mod context;
mod fs_utils;
mod path_env;
mod paths;
mod plan;
mod state;
mod status;
mod types;
mod undo;

pub use activation::{
    backup_path, finalize_binary, retire_binary, stage_binary, staging_path, Activation,
    ActivationFs, StdActivationFs,
};
pub use apply::apply;
pub use context::SetupContext;
pub use fs_utils::{remove_dir_if_empty, write_file_atomic, DirRemoval};
pub use path_env::{
    build_windows_user_path_value, ensure_posix_user_path, ensure_windows_user_path,
    marker_pair_for, posix_path_block, profile_for_shell, remove_posix_path_block,
    remove_windows_user_path_entry, MarkerPair, PathChange, PowerShellUserPathStore,
    ProfileLocator, ShellProfileLocator, UserPathStore, PATH_BLOCK_BEGIN, PATH_BLOCK_END,
    PATH_MARKERS,
};
pub use paths::{
    current_executable, default_bin_dir, normalize_path_for_compare, path_contains_dir,
    require_user_scope, resolve_completion, resolve_scope, target_binary_path,
    validate_no_control_chars, BINARY_NAME,
};
pub use plan::build_plan;
pub use state::{
    default_state_path, delete_state, load_state, save_state, StateFile, TouchedFile,
    STATE_FILE_NAME, STATE_SCHEMA_VERSION,
};
pub use status::build_status;
pub use types::{
    ApplyInput, ApplyResult, CompletionMode, HostOs, Plan, Scope, SetupError, SetupStatus,
    UndoResult,
};
pub use undo::undo;
