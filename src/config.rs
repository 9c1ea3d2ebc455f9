//! Where the tool keeps its data.
//!
//! The data root is resolved in this order:
//! 1. the `--data-dir` command line flag
//! 2. the `ANSIBLE_SELF_SERVICE_DATA_DIR` environment variable
//! 3. the platform data directory (`~/.local/share/ansible-self-service` on Linux)
//!
//! Collections are cloned below `<root>/git`, app states live in `<root>/<collection>`.
use crate::error::{CatalogError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "ansible-self-service";
pub const DATA_DIR_ENV: &str = "ANSIBLE_SELF_SERVICE_DATA_DIR";
const GIT_SUBDIR: &str = "git";

/// Platform specific directory lookup.
pub trait AppDirLocator: Send + Sync {
    fn app_data_dir(&self) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirsAppDirLocator;

impl AppDirLocator for DirsAppDirLocator {
    fn app_data_dir(&self) -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_NAME))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    data_root: PathBuf,
}

impl Config {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Picks the data root from the flag, the environment or the locator, in that order.
    pub fn resolve(data_dir_flag: Option<PathBuf>, locator: &dyn AppDirLocator) -> Result<Self> {
        let data_dir_env = env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        Self::resolve_with_env(data_dir_flag, data_dir_env, locator)
    }

    fn resolve_with_env(
        data_dir_flag: Option<PathBuf>,
        data_dir_env: Option<PathBuf>,
        locator: &dyn AppDirLocator,
    ) -> Result<Self> {
        if let Some(path) = data_dir_flag {
            log::debug!("Using data directory from command line: {}", path.display());
            return Ok(Self::new(path));
        }

        if let Some(path) = data_dir_env.filter(|p| !p.as_os_str().is_empty()) {
            log::debug!("Using data directory from {}: {}", DATA_DIR_ENV, path.display());
            return Ok(Self::new(path));
        }

        let path = locator.app_data_dir().ok_or(CatalogError::DataDirUnavailable)?;
        log::debug!("Using platform data directory: {}", path.display());
        Ok(Self::new(path))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Directory holding one clone per collection; created if missing.
    pub fn git_directory(&self) -> Result<PathBuf> {
        let dir = self.data_root.join(GIT_SUBDIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn state_directory(&self, collection_name: &str) -> PathBuf {
        self.data_root.join(collection_name)
    }
}
