//! Resolution of the directories and state files cocoon manages. Everything
//! here is a pure function of the environment; no paths are created or
//! checked for existence.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the state directory, taking precedence over XDG base dirs.
pub const STATE_DIR_ENV: &str = "COCOON_STATE_DIRECTORY";

const APP_DIR: &str = "cocoon";
const SANDBOXES_FILE: &str = "sandboxes.jsonl";
const VOLUMES_FILE: &str = "volumes.jsonl";
const FILE_MOUNTS_FILE: &str = "file-mounts.jsonl";
const FILE_MOUNTS_DIR: &str = "file-mounts";

pub fn home_dir() -> Result<PathBuf> {
    env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .context("Failed to determine home directory: HOME is not set")
}

fn xdg_dir(env_var: &str, home_fallback: &[&str]) -> Result<PathBuf> {
    if let Some(dir) = env::var_os(env_var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let mut dir = home_dir()?;
    for part in home_fallback {
        dir.push(part);
    }
    Ok(dir)
}

pub fn state_home() -> Result<PathBuf> {
    xdg_dir("XDG_STATE_HOME", &[".local", "state"])
}

/// The state directory and the record files inside it.
#[derive(Debug, Clone)]
pub struct StatePaths {
    state_dir: PathBuf,
}

impl StatePaths {
    /// Resolve the state directory: `COCOON_STATE_DIRECTORY` wins, then
    /// `XDG_STATE_HOME/cocoon`, then `~/.local/state/cocoon`.
    pub fn resolve() -> Result<Self> {
        if let Some(dir) = env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty())
        {
            return Ok(Self {
                state_dir: PathBuf::from(dir),
            });
        }
        Ok(Self {
            state_dir: state_home()?.join(APP_DIR),
        })
    }

    /// A `StatePaths` rooted at an explicit directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn sandboxes_file(&self) -> PathBuf {
        self.state_dir.join(SANDBOXES_FILE)
    }

    pub fn volumes_file(&self) -> PathBuf {
        self.state_dir.join(VOLUMES_FILE)
    }

    pub fn file_mounts_file(&self) -> PathBuf {
        self.state_dir.join(FILE_MOUNTS_FILE)
    }

    /// Base directory for file-mount copies, one subdirectory per mount.
    pub fn file_mounts_dir(&self) -> PathBuf {
        self.state_dir.join(FILE_MOUNTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes tests that mutate process-wide environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_state_paths_env_override() {
        let _guard = ENV_MUTEX.lock().expect("env mutex");
        unsafe {
            env::set_var(STATE_DIR_ENV, "/custom/state");
        }
        let paths = StatePaths::resolve().expect("resolve");
        assert_eq!(paths.state_dir(), Path::new("/custom/state"));
        assert_eq!(
            paths.sandboxes_file(),
            PathBuf::from("/custom/state/sandboxes.jsonl")
        );
        unsafe {
            env::remove_var(STATE_DIR_ENV);
        }
    }

    #[test]
    fn test_state_paths_xdg_fallback() {
        let _guard = ENV_MUTEX.lock().expect("env mutex");
        unsafe {
            env::remove_var(STATE_DIR_ENV);
            env::set_var("XDG_STATE_HOME", "/xdg/state");
        }
        let paths = StatePaths::resolve().expect("resolve");
        assert_eq!(paths.state_dir(), Path::new("/xdg/state/cocoon"));
        assert_eq!(
            paths.volumes_file(),
            PathBuf::from("/xdg/state/cocoon/volumes.jsonl")
        );
        assert_eq!(
            paths.file_mounts_dir(),
            PathBuf::from("/xdg/state/cocoon/file-mounts")
        );
        unsafe {
            env::remove_var("XDG_STATE_HOME");
        }
    }

    #[test]
    fn test_in_dir_layout() {
        let paths = StatePaths::in_dir("/tmp/t");
        assert_eq!(
            paths.file_mounts_file(),
            PathBuf::from("/tmp/t/file-mounts.jsonl")
        );
    }
}
