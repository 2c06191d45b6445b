use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

pub const CURRENT_DIR_NAME: &str = "commandry";
pub const LEGACY_DIR_NAME: &str = "infratrack";

/// Resolve the persistent config root, moving a legacy `infratrack` directory to its current
/// name the first time it is seen.
pub fn resolve_config_root() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow!("failed to resolve user config dir: no platform config location"))?;
    Ok(config_root_in(&base))
}

pub fn config_root_in(base: &Path) -> PathBuf {
    let current = base.join(CURRENT_DIR_NAME);
    let legacy = base.join(LEGACY_DIR_NAME);
    if current.exists() {
        return current;
    }
    if !legacy.exists() {
        return current;
    }

    match migrate_legacy_dir(&legacy, &current) {
        Ok(_) => current,
        Err(err) => {
            warn!(
                legacy = %legacy.display(),
                "legacy config dir left in place: {err:#}"
            );
            legacy
        }
    }
}

/// Returns `true` when the legacy directory was moved.
pub fn migrate_legacy_dir(legacy_dir: &Path, current_dir: &Path) -> Result<bool> {
    if same_path(legacy_dir, current_dir) {
        return Ok(false);
    }

    match current_dir.try_exists() {
        Ok(true) => return Ok(false),
        Ok(false) => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to stat current config dir: {}", current_dir.display())
            });
        }
    }

    match std::fs::metadata(legacy_dir) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(legacy = %legacy_dir.display(), "no legacy config dir to migrate");
            return Ok(false);
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to stat legacy config dir: {}", legacy_dir.display())
            });
        }
    }

    std::fs::rename(legacy_dir, current_dir).with_context(|| {
        format!(
            "failed to migrate legacy config dir {} -> {}",
            legacy_dir.display(),
            current_dir.display()
        )
    })?;
    info!(
        from = %legacy_dir.display(),
        to = %current_dir.display(),
        "migrated legacy config dir"
    );
    Ok(true)
}

fn same_path(left: &Path, right: &Path) -> bool {
    left.components().eq(right.components())
}
