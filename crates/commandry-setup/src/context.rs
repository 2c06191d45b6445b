use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::activation::{ActivationFs, StdActivationFs};
use crate::path_env::{
    PowerShellUserPathStore, ProfileLocator, ShellProfileLocator, UserPathStore,
};
use crate::state::default_state_path;
use crate::HostOs;

/// Host capabilities a setup operation runs against.
pub struct SetupContext {
    os: HostOs,
    state_path: PathBuf,
    process_path: Option<String>,
    user_path: Box<dyn UserPathStore>,
    profiles: Box<dyn ProfileLocator>,
    fs: Box<dyn ActivationFs>,
}

impl SetupContext {
    pub fn new(os: HostOs, state_path: impl Into<PathBuf>) -> Self {
        Self {
            os,
            state_path: state_path.into(),
            process_path: std::env::var("PATH").ok(),
            user_path: Box::new(PowerShellUserPathStore),
            profiles: Box::new(ShellProfileLocator::from_env()),
            fs: Box::new(StdActivationFs),
        }
    }

    pub fn from_environment() -> Result<Self> {
        Ok(Self::new(HostOs::current(), default_state_path()?))
    }

    pub fn with_user_path_store(mut self, store: impl UserPathStore + 'static) -> Self {
        self.user_path = Box::new(store);
        self
    }

    pub fn with_profile_locator(mut self, locator: impl ProfileLocator + 'static) -> Self {
        self.profiles = Box::new(locator);
        self
    }

    pub fn with_activation_fs(mut self, fs: impl ActivationFs + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn with_process_path(mut self, path: Option<String>) -> Self {
        self.process_path = path;
        self
    }

    pub fn os(&self) -> HostOs {
        self.os
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub(crate) fn process_path(&self) -> Option<&str> {
        self.process_path.as_deref()
    }

    pub(crate) fn user_path(&self) -> &dyn UserPathStore {
        self.user_path.as_ref()
    }

    pub(crate) fn profiles(&self) -> &dyn ProfileLocator {
        self.profiles.as_ref()
    }

    pub(crate) fn fs(&self) -> &dyn ActivationFs {
        self.fs.as_ref()
    }
}
