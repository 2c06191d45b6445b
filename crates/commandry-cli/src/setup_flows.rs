use anyhow::{Context, Result};
use commandry_core::AppConfig;
use commandry_setup::{
    apply, build_plan, build_status, resolve_completion, resolve_scope, undo, ApplyInput,
    ApplyResult, CompletionMode, Plan, Scope, SetupContext, SetupStatus, ShellProfileLocator,
    UndoResult,
};
use serde::Serialize;
use tracing::debug;

use crate::render::{
    current_output_style, render_section_header, render_status_line, OutputStyle,
};
use crate::{SetupArgs, SetupCommands};

pub(crate) fn run_setup_command(args: SetupArgs, config: &AppConfig) -> Result<()> {
    let scope = resolve_scope(&args.scope)?;
    let completion = resolve_completion(&args.completion)?;
    let input = build_apply_input(&args, config, scope, completion);
    let ctx = SetupContext::from_environment()?.with_profile_locator(
        ShellProfileLocator::from_env().with_override(config.setup.profile.clone()),
    );
    let style = current_output_style();
    debug!(
        state = %ctx.state_path().display(),
        os = ctx.os().label(),
        "resolved setup context"
    );

    match args.command {
        None => {
            let plan = build_plan(&ctx, &input)?;
            emit(args.json, &plan, || format_plan_lines(&plan, style))
        }
        Some(SetupCommands::Apply) => {
            let result = apply(&ctx, &input)?;
            emit(args.json, &result, || format_apply_lines(&result, style))
        }
        Some(SetupCommands::Undo) => {
            let result = undo(&ctx)?;
            emit(args.json, &result, || format_undo_lines(&result, style))
        }
        Some(SetupCommands::Status) => {
            let status = build_status(&ctx, scope, input.bin_dir.as_deref())?;
            emit(args.json, &status, || format_status_lines(&status, style))
        }
    }
}

/// Command-line flags win over `[setup]` defaults from the config file; `--path` overrides a
/// configured `no_path`.
pub(crate) fn build_apply_input(
    args: &SetupArgs,
    config: &AppConfig,
    scope: Scope,
    completion: CompletionMode,
) -> ApplyInput {
    ApplyInput {
        scope,
        bin_dir: args.bin_dir.clone().or_else(|| config.setup.bin_dir.clone()),
        no_path: if args.path {
            false
        } else {
            args.no_path || config.setup.no_path.unwrap_or(false)
        },
        completion,
        source_binary_path: None,
    }
}

fn emit<T, F>(json: bool, value: &T, lines: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> Vec<String>,
{
    if json {
        let rendered =
            serde_json::to_string_pretty(value).context("failed to serialize setup output")?;
        println!("{rendered}");
        return Ok(());
    }

    for line in lines() {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn format_plan_lines(plan: &Plan, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![
        render_status_line(
            style,
            "note",
            "Dry-run only: nothing was changed. Run `cmdry setup apply` to perform these actions.",
        ),
        format!("binary: {}", plan.current_executable_path.display()),
        format!("target: {}", plan.target_binary_path.display()),
        format!("scope: {} ({})", plan.scope, plan.os),
        render_section_header(style, "Planned actions"),
    ];
    lines.extend(plan.actions.iter().enumerate().map(|(index, action)| {
        render_status_line(style, "step", &format!("{}. {action}", index + 1))
    }));
    if !plan.notes.is_empty() {
        lines.push(render_section_header(style, "Notes"));
        lines.extend(
            plan.notes
                .iter()
                .map(|note| render_status_line(style, "note", &format!("- {note}"))),
        );
    }
    lines
}

pub(crate) fn format_apply_lines(result: &ApplyResult, style: OutputStyle) -> Vec<String> {
    let mut lines: Vec<String> = result
        .actions
        .iter()
        .map(|action| render_status_line(style, "step", action))
        .collect();
    lines.push(render_status_line(
        style,
        "ok",
        &format!(
            "cmdry installed at {}",
            result.installed_bin_path.display()
        ),
    ));
    if result.path_changed {
        lines.push(render_status_line(
            style,
            "note",
            "PATH was updated; open a new shell to use `cmdry` directly.",
        ));
    }
    lines
}

pub(crate) fn format_undo_lines(result: &UndoResult, style: OutputStyle) -> Vec<String> {
    if !result.changed {
        return vec![render_status_line(
            style,
            "ok",
            &format!(
                "Nothing to undo (no setup state at {}).",
                result.state_path.display()
            ),
        )];
    }

    let mut lines: Vec<String> = result
        .actions
        .iter()
        .map(|action| render_status_line(style, "step", action))
        .collect();
    lines.push(render_status_line(style, "ok", "setup undone"));
    lines
}

pub(crate) fn format_status_lines(status: &SetupStatus, style: OutputStyle) -> Vec<String> {
    let matches = match status.installed_matches_current {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    };
    vec![
        render_section_header(style, "Setup status"),
        format!("os: {}", status.os),
        format!("scope: {}", status.scope),
        format!("current exe: {}", status.current_exe.display()),
        format!("bin dir: {}", status.bin_dir.display()),
        format!("target: {}", status.target_binary_path.display()),
        format!("installed: {}", yes_no(status.installed)),
        format!("matches current: {matches}"),
        format!("path ok: {}", yes_no(status.path_ok)),
        format!(
            "state: {} ({})",
            if status.state_found { "found" } else { "missing" },
            status.state_path.display()
        ),
        format!("pending finalize: {}", yes_no(status.pending_finalize)),
    ]
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
