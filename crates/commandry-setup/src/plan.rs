use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::activation::{backup_path, staging_path};
use crate::context::SetupContext;
use crate::fs_utils::missing_ancestors;
use crate::paths::{
    current_executable, default_bin_dir, path_contains_dir, require_user_scope,
    target_binary_path, validate_no_control_chars,
};
use crate::{ApplyInput, CompletionMode, Plan};

/// Resolved locations for one install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstallTarget {
    pub(crate) bin_dir: PathBuf,
    pub(crate) bin_dir_text: String,
    pub(crate) target: PathBuf,
    pub(crate) source: PathBuf,
}

pub(crate) fn resolve_install_target(
    ctx: &SetupContext,
    input: &ApplyInput,
) -> Result<InstallTarget> {
    require_user_scope(input.scope)?;

    let bin_dir = match input
        .bin_dir
        .as_deref()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        Some(dir) => absolutize(dir)?,
        None => default_bin_dir(ctx.os())?,
    };
    let bin_dir_text = bin_dir
        .to_str()
        .ok_or_else(|| anyhow!("bin dir is not valid UTF-8: {}", bin_dir.display()))?
        .to_string();
    validate_no_control_chars("bin dir", &bin_dir_text)?;

    let source = match input.source_binary_path.as_deref() {
        Some(source) => absolutize(source)?,
        None => current_executable()?,
    };

    Ok(InstallTarget {
        target: target_binary_path(ctx.os(), &bin_dir),
        bin_dir,
        bin_dir_text,
        source,
    })
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}

/// Describe what apply would do without touching anything.
pub fn build_plan(ctx: &SetupContext, input: &ApplyInput) -> Result<Plan> {
    let install = resolve_install_target(ctx, input)?;
    let mut actions = Vec::new();
    let mut notes = Vec::new();

    if !missing_ancestors(&install.bin_dir).is_empty() {
        actions.push(format!("Create directory {}.", install.bin_dir.display()));
    }

    let staging = staging_path(&install.target);
    actions.push(format!(
        "Copy {} to {}.",
        install.source.display(),
        staging.display()
    ));
    if install.target.exists() {
        actions.push(format!(
            "Replace {} (previous binary kept at {} until setup completes).",
            install.target.display(),
            backup_path(&install.target).display()
        ));
    } else {
        actions.push(format!("Activate {}.", install.target.display()));
    }

    if input.no_path {
        notes.push("PATH will not be modified (--no-path).".to_string());
    } else if ctx.os().is_windows() {
        match ctx.user_path().read_user_path() {
            Ok(current) if path_contains_dir(ctx.os(), &current, &install.bin_dir_text) => {
                actions.push(format!(
                    "Keep user PATH unchanged ({} is already present).",
                    install.bin_dir_text
                ));
            }
            Ok(_) => actions.push(format!(
                "Prepend {} to the user PATH.",
                install.bin_dir_text
            )),
            Err(err) => {
                actions.push(format!(
                    "Ensure {} is on the user PATH.",
                    install.bin_dir_text
                ));
                notes.push(format!("Could not read the user PATH: {err:#}"));
            }
        }
        notes.push("Open a new terminal to pick up user PATH changes.".to_string());
    } else {
        let profile = ctx.profiles().resolve_profile()?;
        actions.push(format!(
            "Add a PATH block for {} to {}.",
            install.bin_dir_text,
            profile.display()
        ));
        notes.push(format!(
            "Open a new shell or run `. {}` to pick up PATH changes.",
            profile.display()
        ));
    }

    actions.push(format!(
        "Write setup state to {}.",
        ctx.state_path().display()
    ));

    match input.completion {
        CompletionMode::None => {
            notes.push("Shell completion is not configured (--completion none).".to_string())
        }
    }

    Ok(Plan {
        os: ctx.os().label().to_string(),
        scope: input.scope,
        current_executable_path: install.source,
        target_bin_dir: install.bin_dir,
        target_binary_path: install.target,
        actions,
        notes,
    })
}
