use crate::config::StatePaths;
use crate::sandbox::StateStores;
use clap::Parser;
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};

#[derive(Parser, Clone, Debug)]
#[command(
    name = "cocoon",
    version,
    about = "Project host files and credentials into isolated container sandboxes"
)]
pub struct Args {
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(
        short = 'v',
        long,
        global = true,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Format action output as a JSON blob.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum Command {
    /// Create and manage sandboxes
    #[command(subcommand)]
    Sandbox(SandboxCommand),

    /// Manage tracked sandbox volumes
    #[command(subcommand)]
    Volume(VolumeCommand),

    /// Run a script or command in an ephemeral container and copy outputs
    /// to a destination directory
    Materialize(MaterializeArgs),
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum SandboxCommand {
    /// Create a new sandbox
    Create(CreateArgs),

    /// Delete a sandbox and remove its backing container
    #[command(aliases = ["rm", "remove"])]
    Delete {
        /// Name of the sandbox to delete
        #[arg(add = ArgValueCompleter::new(sandbox_name_completion))]
        name: String,

        /// Also delete associated volumes that are no longer referenced
        #[arg(long)]
        delete_volumes: bool,

        /// Keep associated volumes even when only this sandbox references
        /// them
        #[arg(long, conflicts_with = "delete_volumes")]
        keep_volumes: bool,
    },

    /// List all sandboxes
    List,

    /// Connect to a running sandbox and open an interactive shell
    Connect {
        /// Name of the sandbox to connect to
        #[arg(add = ArgValueCompleter::new(sandbox_name_completion))]
        name: String,

        /// Shell to run in the sandbox container
        #[arg(long, default_value = "zsh")]
        shell: String,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct CreateArgs {
    /// Sandbox provider
    #[arg(long, default_value = "docker")]
    pub provider: String,

    /// Name for the sandbox (auto-generated if not set)
    #[arg(long)]
    pub name: Option<String>,

    /// Container image to use (defaults to the coder preset image)
    #[arg(long)]
    pub image: Option<String>,

    /// Use a preset environment ("coder" or "claude")
    #[arg(long)]
    pub preset: Option<String>,

    /// Mount a host directory or file (source:target[:mode], mode defaults
    /// to rwcopy). Can be specified multiple times.
    #[arg(long = "mount", action = clap::ArgAction::Append)]
    pub mounts: Vec<String>,

    /// Mount an existing named volume (name:target[:mode], mode defaults
    /// to rw). Can be specified multiple times.
    #[arg(long = "volume", action = clap::ArgAction::Append)]
    pub volumes: Vec<String>,

    /// Mount the git repo containing PATH (defaults to the current
    /// directory) into the container workspace
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "."
    )]
    pub git: Option<String>,

    /// With --git, include untracked files from the working tree instead of
    /// a clean clone
    #[arg(long)]
    pub no_clean: bool,

    /// Set an environment variable (KEY=VALUE). Can be specified multiple
    /// times.
    #[arg(long = "env", action = clap::ArgAction::Append)]
    pub env: Vec<String>,

    /// Skip the mount confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Connect to the sandbox shell immediately after creation
    #[arg(long)]
    pub connect: bool,
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum VolumeCommand {
    /// List tracked volumes and file mounts
    List,

    /// Delete a tracked volume
    #[command(aliases = ["rm", "remove"])]
    Delete {
        /// Name of the volume to delete
        name: String,

        /// Delete the volume even if sandboxes still reference it
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct MaterializeArgs {
    /// Path to the script to execute (mutually exclusive with --cmd)
    #[arg(long)]
    pub script: Option<String>,

    /// Bash command string to execute (mutually exclusive with --script)
    #[arg(long)]
    pub cmd: Option<String>,

    /// Container directory to copy from (default: the workdir)
    #[arg(long)]
    pub outdir: Option<String>,

    /// Host directory where output files are copied
    #[arg(long)]
    pub destdir: String,

    /// Container image to use (defaults to the coder preset image)
    #[arg(long)]
    pub image: Option<String>,

    /// Use a preset environment ("coder" or "claude")
    #[arg(long)]
    pub preset: Option<String>,

    /// Mount a host directory or file (source:target[:mode], mode defaults
    /// to rwcopy)
    #[arg(long = "mount", action = clap::ArgAction::Append)]
    pub mounts: Vec<String>,

    /// Set an environment variable (KEY=VALUE)
    #[arg(long = "env", action = clap::ArgAction::Append)]
    pub env: Vec<String>,

    /// Run interactively with a TTY (for programs that need one)
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub script_args: Vec<String>,
}

pub fn sandbox_name_completion(
    current: &std::ffi::OsStr,
) -> Vec<CompletionCandidate> {
    let Some(current) = current.to_str() else {
        return vec![];
    };
    let Ok(paths) = StatePaths::resolve() else {
        return vec![];
    };
    let stores = StateStores::open(&paths);
    let Ok(records) = stores.sandboxes.list() else {
        return vec![];
    };
    records
        .into_iter()
        .filter(|record| record.name.starts_with(current))
        .map(|record| CompletionCandidate::new(record.name))
        .collect()
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}
