use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::activation::{finalize_binary, retire_binary, stage_binary, staging_path, Activation};
use crate::context::SetupContext;
use crate::fs_utils::{
    create_dir_chain, remove_dir_if_empty, remove_file_if_exists, write_file_atomic,
};
use crate::path_env::{
    drop_windows_user_path_entry, ensure_posix_user_path, ensure_windows_user_path,
    file_has_marker_block, marker_pair_for, PathRevert,
};
use crate::paths::normalize_path_for_compare;
use crate::plan::{resolve_install_target, InstallTarget};
use crate::state::{load_state, save_state, StateFile, TouchedFile, STATE_SCHEMA_VERSION};
use crate::{ApplyInput, ApplyResult, HostOs};

/// Undo step for one change apply has already made.
enum Compensation {
    RemoveCreatedDir(PathBuf),
    RestoreBinary(Activation),
    RestoreUserPath(String),
    RestoreProfile {
        path: PathBuf,
        previous: Option<String>,
    },
}

impl From<PathRevert> for Compensation {
    fn from(revert: PathRevert) -> Self {
        match revert {
            PathRevert::UserPath(previous) => Self::RestoreUserPath(previous),
            PathRevert::Profile { path, previous } => Self::RestoreProfile { path, previous },
        }
    }
}

#[derive(Default)]
struct ApplyJournal {
    steps: Vec<Compensation>,
}

impl ApplyJournal {
    fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Binary swaps to commit once the whole apply has succeeded.
    fn into_activations(self) -> Vec<Activation> {
        self.steps
            .into_iter()
            .filter_map(|step| match step {
                Compensation::RestoreBinary(activation) => Some(activation),
                _ => None,
            })
            .collect()
    }

    /// Run compensations newest first; failures are collected, not fatal.
    fn unwind(self, ctx: &SetupContext) -> Vec<String> {
        let mut failures = Vec::new();
        for step in self.steps.into_iter().rev() {
            let outcome = match step {
                Compensation::RemoveCreatedDir(dir) => remove_dir_if_empty(&dir).map(|_| ()),
                Compensation::RestoreBinary(activation) => activation.rollback(ctx.fs()),
                Compensation::RestoreUserPath(previous) => {
                    ctx.user_path().write_user_path(&previous)
                }
                Compensation::RestoreProfile { path, previous } => {
                    restore_profile(&path, previous.as_deref())
                }
            };
            if let Err(err) = outcome {
                warn!("apply rollback step failed: {err:#}");
                failures.push(format!("{err:#}"));
            }
        }
        failures
    }
}

fn restore_profile(path: &Path, previous: Option<&str>) -> Result<()> {
    match previous {
        Some(content) => write_file_atomic(path, content)
            .with_context(|| format!("failed to restore profile: {}", path.display())),
        None => remove_file_if_exists(path)
            .map(|_| ())
            .with_context(|| format!("failed to remove created profile: {}", path.display())),
    }
}

/// Install the binary, make it reachable through PATH, and record what was changed. Any
/// failure puts back every change made so far.
pub fn apply(ctx: &SetupContext, input: &ApplyInput) -> Result<ApplyResult> {
    let install = resolve_install_target(ctx, input)?;
    let metadata = fs::metadata(&install.source).with_context(|| {
        format!(
            "failed to inspect source binary: {}",
            install.source.display()
        )
    })?;
    if !metadata.is_file() {
        bail!("source binary is not a file: {}", install.source.display());
    }

    let prior = load_state(ctx.state_path())?;
    let mut journal = ApplyJournal::default();
    match run_apply(ctx, input, &install, prior.as_ref(), &mut journal) {
        Ok(result) => {
            for activation in journal.into_activations() {
                if let Err(err) = activation.commit(ctx.fs()) {
                    warn!("setup completed but the old binary backup remains: {err:#}");
                }
            }
            info!(
                binary = %result.installed_bin_path.display(),
                path_changed = result.path_changed,
                "setup applied"
            );
            Ok(result)
        }
        Err(err) => {
            let failures = journal.unwind(ctx);
            if failures.is_empty() {
                return Err(err);
            }
            Err(err.context(format!(
                "apply rollback incomplete: {}",
                failures.join("; ")
            )))
        }
    }
}

fn run_apply(
    ctx: &SetupContext,
    input: &ApplyInput,
    install: &InstallTarget,
    prior: Option<&StateFile>,
    journal: &mut ApplyJournal,
) -> Result<ApplyResult> {
    let os = ctx.os();
    let mut actions = Vec::new();

    let created = create_dir_chain(&install.bin_dir)?;
    for dir in &created {
        debug!(dir = %dir.display(), "created directory");
        journal.record(Compensation::RemoveCreatedDir(dir.clone()));
        actions.push(format!("Created {}.", dir.display()));
    }

    let staging = staging_path(&install.target);
    stage_binary(&install.source, &staging)?;
    debug!(staging = %staging.display(), "staged binary");
    let activation = finalize_binary(ctx.fs(), &staging, &install.target)?;
    let replaced = activation.backup().is_some();
    journal.record(Compensation::RestoreBinary(activation));
    if replaced {
        actions.push(format!("Replaced {}.", install.target.display()));
    } else {
        actions.push(format!("Installed {}.", install.target.display()));
    }

    if let Some(previous) = prior.and_then(|state| moved_binary(os, state, install)) {
        if let Some(retired) = retire_binary(ctx.fs(), &previous)? {
            journal.record(Compensation::RestoreBinary(retired));
            actions.push(format!("Removed previous install {}.", previous.display()));
        }
    }

    let mut path_changed = false;
    let mut path_entry_added = prior
        .map(|state| state.path_entry_added.clone())
        .unwrap_or_default();
    let mut touched_now = None;
    if !input.no_path {
        let change = if os.is_windows() {
            ensure_windows_user_path(ctx.user_path(), &install.bin_dir_text)?
        } else {
            ensure_posix_user_path(ctx.profiles(), &install.bin_dir_text)?
        };
        if let Some(revert) = change.revert.clone() {
            journal.record(revert.into());
        }
        path_changed = change.changed;
        path_entry_added = if owns_path_entry(os, change.changed, &change.path_entry, prior) {
            change.path_entry.clone()
        } else {
            String::new()
        };
        actions.push(path_action(
            os,
            &change.path_entry,
            change.changed,
            change.touched_file.as_ref(),
        ));
        touched_now = change.touched_file;

        let stale_entry = prior
            .map(|state| state.path_entry_added.as_str())
            .filter(|entry| os.is_windows() && !same_path(os, entry, &change.path_entry));
        if let Some(entry) = stale_entry {
            if let Some(revert) = drop_windows_user_path_entry(ctx.user_path(), entry)? {
                journal.record(revert.into());
                actions.push(format!("Removed previous entry {entry} from the user PATH."));
            }
        }
    }

    let state = derive_state(prior, install, path_entry_added, touched_now, &created);
    let saved = save_state(ctx.state_path(), &state)?;
    actions.push(format!("Wrote {}.", ctx.state_path().display()));

    Ok(ApplyResult {
        installed_bin_path: install.target.clone(),
        state_path: ctx.state_path().to_path_buf(),
        path_entry_added: saved.path_entry_added,
        path_changed,
        created_dirs: created,
        actions,
    })
}

/// Binary recorded by an earlier apply that this run no longer installs.
fn moved_binary(os: HostOs, prior: &StateFile, install: &InstallTarget) -> Option<PathBuf> {
    let previous = prior.installed_bin_path.trim();
    if previous.is_empty() || same_path(os, previous, &install.target.to_string_lossy()) {
        return None;
    }
    Some(PathBuf::from(previous))
}

fn same_path(os: HostOs, left: &str, right: &str) -> bool {
    normalize_path_for_compare(os, left) == normalize_path_for_compare(os, right)
}

/// On Windows an entry belongs to us only when this run added it or a previous run already
/// recorded an equivalent entry. The POSIX block is always ours.
fn owns_path_entry(os: HostOs, changed: bool, entry: &str, prior: Option<&StateFile>) -> bool {
    if !os.is_windows() || changed {
        return true;
    }
    prior.is_some_and(|state| {
        !state.path_entry_added.trim().is_empty() && same_path(os, &state.path_entry_added, entry)
    })
}

fn path_action(os: HostOs, entry: &str, changed: bool, touched: Option<&TouchedFile>) -> String {
    match (os.is_windows(), changed, touched) {
        (true, true, _) => format!("Added {entry} to the user PATH."),
        (false, true, Some(file)) => format!("Added PATH block for {entry} to {}.", file.path),
        _ => format!("PATH already includes {entry}."),
    }
}

fn derive_state(
    prior: Option<&StateFile>,
    install: &InstallTarget,
    path_entry_added: String,
    touched_now: Option<TouchedFile>,
    created: &[PathBuf],
) -> StateFile {
    let mut files_touched: Vec<TouchedFile> = touched_now.into_iter().collect();
    let mut created_dirs: Vec<String> = Vec::new();

    if let Some(prior) = prior {
        for file in &prior.files_touched {
            if files_touched.iter().any(|existing| existing.path == file.path) {
                continue;
            }
            let still_marked = marker_pair_for(&file.marker)
                .is_some_and(|markers| file_has_marker_block(Path::new(&file.path), markers));
            if still_marked {
                files_touched.push(file.clone());
            }
        }
        for dir in &prior.created_dirs {
            if Path::new(dir).is_dir() && !created_dirs.contains(dir) {
                created_dirs.push(dir.clone());
            }
        }
    }
    for dir in created {
        let dir = dir.to_string_lossy().into_owned();
        if !created_dirs.contains(&dir) {
            created_dirs.push(dir);
        }
    }

    StateFile {
        schema_version: STATE_SCHEMA_VERSION,
        installed_bin_path: install.target.to_string_lossy().into_owned(),
        path_entry_added,
        files_touched,
        created_dirs,
        timestamp: None,
        extra: prior.map(|state| state.extra.clone()).unwrap_or_default(),
    }
}
