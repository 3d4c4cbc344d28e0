mod docker;
mod fake;

pub use docker::DockerRuntime;
pub use fake::FakeRuntime;

use crate::sandbox::binding::RuntimeBinding;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The container runtime backing a sandbox, as stored in the sandbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeProvider {
    Docker,
}

impl RuntimeProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeProvider::Docker => "docker",
        }
    }

    pub fn runtime(&self) -> Box<dyn Runtime> {
        match self {
            RuntimeProvider::Docker => Box::new(DockerRuntime),
        }
    }
}

impl fmt::Display for RuntimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuntimeProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "docker" => Ok(RuntimeProvider::Docker),
            other => Err(anyhow!(
                "Unsupported provider {:?}: only \"docker\" is supported",
                other
            )),
        }
    }
}

/// A one-off container run, used by `materialize`.
pub struct EphemeralRun<'a> {
    pub image: &'a str,
    pub workdir: &'a str,
    pub bindings: &'a [RuntimeBinding],
    pub env: &'a [String],
    pub command: &'a [String],
    pub interactive: bool,
}

/// The capability set the lifecycle core consumes from a container runtime.
/// Failure messages carry the runtime's own stderr so the user sees what the
/// runtime said.
pub trait Runtime {
    /// Start a long-running idle container with the requested mounts.
    /// Returns the runtime's container handle.
    fn create_container(
        &self,
        name: &str,
        image: &str,
        bindings: &[RuntimeBinding],
        env: &[String],
    ) -> Result<String>;

    /// Force-remove the container by name.
    fn remove_container(&self, name: &str) -> Result<()>;

    fn create_volume(&self, name: &str) -> Result<()>;

    fn remove_volume(&self, name: &str) -> Result<()>;

    fn volume_exists(&self, name: &str) -> bool;

    /// Copy the tree under `host_dir` into the volume root, preserving
    /// permissions and ownership as far as the runtime supports.
    fn populate_volume(&self, volume: &str, host_dir: &Path) -> Result<()>;

    fn image_exists(&self, image: &str) -> bool;

    fn build_image(&self, image: &str, dockerfile: &str) -> Result<()>;

    /// Run an attached interactive shell in the container. Returns the
    /// shell's exit code.
    fn exec_interactive(
        &self,
        name: &str,
        workdir: &str,
        shell: &str,
    ) -> Result<i32>;

    /// Run a one-off container to completion, wiring stdio through. Returns
    /// the container's exit code.
    fn run_ephemeral(&self, run: &EphemeralRun) -> Result<i32>;
}
