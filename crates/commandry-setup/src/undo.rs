use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::context::SetupContext;
use crate::fs_utils::{remove_dir_if_empty, remove_file_if_exists, DirRemoval};
use crate::path_env::{marker_pair_for, remove_marker_block, remove_windows_user_path_entry};
use crate::state::{delete_state, load_state};
use crate::UndoResult;

/// Reverse everything the recorded state says setup changed.
pub fn undo(ctx: &SetupContext) -> Result<UndoResult> {
    let mut result = UndoResult {
        state_path: ctx.state_path().to_path_buf(),
        ..UndoResult::default()
    };
    let Some(state) = load_state(ctx.state_path())? else {
        debug!(state = %ctx.state_path().display(), "no setup state, nothing to undo");
        return Ok(result);
    };

    if !state.installed_bin_path.trim().is_empty() {
        let binary = Path::new(&state.installed_bin_path);
        let removed = remove_file_if_exists(binary)
            .with_context(|| format!("failed to remove installed binary: {}", binary.display()))?;
        if removed {
            result.record(format!("Removed {}.", binary.display()));
        }
    }

    if ctx.os().is_windows()
        && remove_windows_user_path_entry(ctx.user_path(), &state.path_entry_added)?
    {
        result.record(format!(
            "Removed {} from the user PATH.",
            state.path_entry_added
        ));
    }

    for file in &state.files_touched {
        let Some(markers) = marker_pair_for(&file.marker) else {
            warn!(
                file = %file.path,
                marker = %file.marker,
                "skipping file with unknown marker"
            );
            continue;
        };
        if remove_marker_block(Path::new(&file.path), markers)? {
            result.record(format!("Removed PATH block from {}.", file.path));
        }
    }

    for dir in state.created_dirs.iter().rev() {
        match remove_dir_if_empty(Path::new(dir))? {
            DirRemoval::Removed => result.record(format!("Removed {dir}.")),
            DirRemoval::Missing => {}
            DirRemoval::NotEmpty => debug!(dir = %dir, "kept non-empty directory"),
            DirRemoval::Denied => debug!(dir = %dir, "kept directory: permission denied"),
        }
    }

    if delete_state(ctx.state_path())? {
        result.record(format!("Removed {}.", ctx.state_path().display()));
    }

    Ok(result)
}

impl UndoResult {
    fn record(&mut self, action: String) {
        self.changed = true;
        self.actions.push(action);
    }
}
