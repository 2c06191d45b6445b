use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs_utils::remove_file_if_exists;

/// Filesystem operations used to swap a staged binary into place.
pub trait ActivationFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdActivationFs;

impl ActivationFs for StdActivationFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// `cmdry.exe` stages as `cmdry.new.exe`, `cmdry` as `cmdry.new`.
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_default();
    name.push(".new");
    if let Some(extension) = target.extension() {
        name.push(".");
        name.push(extension);
    }
    target.with_file_name(name)
}

pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    target.with_file_name(name)
}

/// Copy `source` to the staging path. A partial copy is removed on failure.
pub fn stage_binary(source: &Path, staging: &Path) -> Result<()> {
    if let Err(err) = fs::copy(source, staging) {
        let _ = remove_file_if_exists(staging);
        return Err(err).with_context(|| {
            format!(
                "failed to stage binary {} -> {}",
                source.display(),
                staging.display()
            )
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging, fs::Permissions::from_mode(0o755)).with_context(|| {
            format!(
                "failed to mark staged binary executable: {}",
                staging.display()
            )
        })?;
    }

    Ok(())
}

/// An activated binary whose previous version, if any, is still parked at the backup path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl Activation {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Drop the backup of the replaced binary.
    pub fn commit(self, fs: &dyn ActivationFs) -> Result<()> {
        let Some(backup) = self.backup else {
            return Ok(());
        };
        match fs.remove_file(&backup) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove binary backup: {}", backup.display())),
        }
    }

    /// Put the replaced binary back, or remove the new one when nothing was replaced.
    pub fn rollback(self, fs: &dyn ActivationFs) -> Result<()> {
        match fs.remove_file(&self.target) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to remove activated binary: {}", self.target.display())
                });
            }
        }
        if let Some(backup) = &self.backup {
            fs.rename(backup, &self.target).with_context(|| {
                format!(
                    "failed to restore {} from {}",
                    self.target.display(),
                    backup.display()
                )
            })?;
        }
        Ok(())
    }
}

/// Move `staging` over `target`, parking any existing target at its backup path first. On
/// failure the original target is restored and the staged copy removed.
pub fn finalize_binary(fs: &dyn ActivationFs, staging: &Path, target: &Path) -> Result<Activation> {
    let backup = backup_path(target);
    let replacing = fs.exists(target);

    if replacing {
        match fs.remove_file(&backup) {
            Ok(()) => debug!(backup = %backup.display(), "removed stale binary backup"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to remove stale binary backup: {}", backup.display())
                });
            }
        }
        if let Err(err) = fs.rename(target, &backup) {
            let _ = fs.remove_file(staging);
            return Err(err).with_context(|| {
                format!(
                    "failed to move existing binary aside {} -> {}",
                    target.display(),
                    backup.display()
                )
            });
        }
    }

    if let Err(err) = fs.rename(staging, target) {
        let activation_err = anyhow::Error::new(err).context(format!(
            "failed to activate staged binary {} -> {}",
            staging.display(),
            target.display()
        ));
        if replacing {
            if let Err(restore_err) = fs.rename(&backup, target) {
                warn!(
                    target = %target.display(),
                    "failed to restore previous binary after activation error"
                );
                return Err(combine_activation_restore_errors(
                    activation_err,
                    restore_err,
                    &backup,
                    target,
                ));
            }
        }
        let _ = fs.remove_file(staging);
        return Err(activation_err);
    }

    Ok(Activation {
        target: target.to_path_buf(),
        backup: replacing.then_some(backup),
    })
}

/// Park a binary this tool no longer installs at its backup path. Rolling the returned
/// activation back puts it in place again; committing deletes it.
pub fn retire_binary(fs: &dyn ActivationFs, target: &Path) -> Result<Option<Activation>> {
    if !fs.exists(target) {
        return Ok(None);
    }
    let backup = backup_path(target);
    match fs.remove_file(&backup) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to remove stale binary backup: {}", backup.display())
            });
        }
    }
    fs.rename(target, &backup).with_context(|| {
        format!(
            "failed to move previous binary aside {} -> {}",
            target.display(),
            backup.display()
        )
    })?;
    Ok(Some(Activation {
        target: target.to_path_buf(),
        backup: Some(backup),
    }))
}

fn combine_activation_restore_errors(
    activation_err: anyhow::Error,
    restore_err: io::Error,
    backup: &Path,
    target: &Path,
) -> anyhow::Error {
    activation_err.context(format!(
        "rollback failed: could not restore {} from {}: {restore_err}",
        target.display(),
        backup.display()
    ))
}
