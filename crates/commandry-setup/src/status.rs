use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::activation::staging_path;
use crate::context::SetupContext;
use crate::fs_utils::file_sha256_hex;
use crate::paths::path_contains_dir;
use crate::plan::resolve_install_target;
use crate::state::load_state;
use crate::{ApplyInput, Scope, SetupStatus};

pub fn build_status(
    ctx: &SetupContext,
    scope: Scope,
    bin_dir: Option<&Path>,
) -> Result<SetupStatus> {
    let input = ApplyInput {
        scope,
        bin_dir: bin_dir.map(Path::to_path_buf),
        ..ApplyInput::default()
    };
    let install = resolve_install_target(ctx, &input)?;

    let installed = install.target.is_file();
    let installed_matches_current = if installed {
        Some(file_sha256_hex(&install.target)? == file_sha256_hex(&install.source)?)
    } else {
        None
    };

    let os = ctx.os();
    let mut path_ok = ctx
        .process_path()
        .is_some_and(|path| path_contains_dir(os, path, &install.bin_dir_text));
    if !path_ok && os.is_windows() {
        match ctx.user_path().read_user_path() {
            Ok(user_path) => path_ok = path_contains_dir(os, &user_path, &install.bin_dir_text),
            Err(err) => debug!("could not read user PATH: {err:#}"),
        }
    }

    let state_found = load_state(ctx.state_path())?.is_some();

    Ok(SetupStatus {
        os: os.label().to_string(),
        scope,
        current_exe: install.source,
        pending_finalize: staging_path(&install.target).exists(),
        target_binary_path: install.target,
        bin_dir: install.bin_dir,
        installed,
        installed_matches_current,
        path_ok,
        state_found,
        state_path: ctx.state_path().to_path_buf(),
    })
}
