use crate::agentconfig::implicit_agent_mounts;
use crate::config::cli::MaterializeArgs;
use crate::config::{StatePaths, paths};
use crate::outln;
use crate::runtime::{EphemeralRun, Runtime, RuntimeProvider};
use crate::sandbox::binding::{BindingMode, RuntimeBinding};
use crate::sandbox::ledger::RollbackLedger;
use crate::sandbox::mounts::MountMode;
use crate::sandbox::rwcopy::resolve_rwcopy_mount;
use crate::sandbox::{
    CONTAINER_WORKSPACE, StateStores, parse_mount_specs, presets,
};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::process::Command;

/// Owner tag for ephemeral backing stores. They are never recorded in the
/// state files and are removed when the run ends, however it ends.
const EPHEMERAL_OWNER: &str = "materialize";

const SCRIPT_MOUNT_TARGET: &str = "/.cocoon/script";

pub fn materialize(args: MaterializeArgs) -> Result<()> {
    validate_script_cmd(&args)?;

    let runtime = RuntimeProvider::Docker.runtime();
    let resolved_image =
        presets::resolve_image(args.image.as_deref(), args.preset.as_deref())?;
    presets::ensure_image(runtime.as_ref(), &resolved_image)?;

    let mut mounts = parse_mount_specs(&args.mounts)?;
    if let Ok(home) = paths::home_dir() {
        mounts.extend(implicit_agent_mounts(&home));
    }

    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);

    let copy_staging = tempfile::Builder::new()
        .prefix("cocoon-materialize-rwcopy-")
        .tempdir()
        .context("Failed to create temp dir for rwcopy files")?;
    let mut ledger = RollbackLedger::new();

    let mut bindings = Vec::new();
    let mut resolve_failure = None;
    for mount in &mounts {
        if mount.mode != MountMode::Rwcopy {
            bindings.push(mount.direct_binding());
            continue;
        }
        match resolve_rwcopy_mount(
            runtime.as_ref(),
            EPHEMERAL_OWNER,
            mount,
            copy_staging.path(),
            &mut ledger,
        ) {
            Ok((binding, _)) => bindings.push(binding),
            Err(e) => {
                resolve_failure = Some(e);
                break;
            }
        }
    }

    let result = match resolve_failure {
        Some(e) => Err(e),
        None => run_in_container(runtime.as_ref(), &args, bindings, &resolved_image.image),
    };

    // Ephemeral backing stores go away no matter how the run ended; a
    // failed removal is only worth a warning.
    ledger.unwind(&stores, runtime.as_ref());
    result
}

fn run_in_container(
    runtime: &dyn Runtime,
    args: &MaterializeArgs,
    mut bindings: Vec<RuntimeBinding>,
    image: &str,
) -> Result<()> {
    let workdir = CONTAINER_WORKSPACE;
    let container_outdir = match args.outdir.as_deref() {
        None | Some("") => workdir.to_string(),
        Some(outdir) if outdir.starts_with('/') => outdir.to_string(),
        Some(outdir) => format!("{}/{}", workdir, outdir),
    };

    // The capture directory is bind-mounted over the container outdir so
    // whatever the run writes there is already on the host afterwards.
    let capture = tempfile::Builder::new()
        .prefix("cocoon-materialize-")
        .tempdir()
        .context("Failed to create temp dir for output capture")?;
    bindings.push(RuntimeBinding::Bind {
        source: capture.path().to_string_lossy().into_owned(),
        target: container_outdir,
        mode: BindingMode::Rw,
        snapshot_from: None,
    });

    let command = match &args.script {
        Some(script) => {
            let script = std::path::absolute(script).map_err(|e| {
                anyhow!("Failed to resolve script path {:?}: {}", script, e)
            })?;
            let metadata = fs::metadata(&script).map_err(|e| {
                anyhow!(
                    "Script does not exist: {}: {}",
                    script.display(),
                    e
                )
            })?;
            if metadata.is_dir() {
                return Err(anyhow!(
                    "Script is a directory: {}",
                    script.display()
                ));
            }
            bindings.push(RuntimeBinding::Bind {
                source: script.to_string_lossy().into_owned(),
                target: SCRIPT_MOUNT_TARGET.to_string(),
                mode: BindingMode::Ro,
                snapshot_from: None,
            });
            let mut command = vec![SCRIPT_MOUNT_TARGET.to_string()];
            command.extend(args.script_args.iter().cloned());
            command
        }
        None => {
            let cmd = args.cmd.as_deref().unwrap_or_default();
            if args.interactive {
                // Run the command directly so the TTY behaves for
                // interactive programs.
                cmd.split_whitespace().map(|s| s.to_string()).collect()
            } else {
                vec!["bash".to_string(), "-c".to_string(), cmd.to_string()]
            }
        }
    };

    if !args.interactive {
        match &args.script {
            Some(script) => {
                let mut line = vec![script.clone()];
                line.extend(args.script_args.iter().cloned());
                eprintln!("Running script in container:\n\n> {}\n", line.join(" "));
            }
            None => {
                eprintln!(
                    "Running command in container:\n\n> {}\n",
                    args.cmd.as_deref().unwrap_or_default()
                );
            }
        }
    }

    let code = runtime.run_ephemeral(&EphemeralRun {
        image,
        workdir,
        bindings: &bindings,
        env: &args.env,
        command: &command,
        interactive: args.interactive,
    })?;
    if code != 0 {
        return Err(anyhow!(
            "Container execution failed with exit code {}",
            code
        ));
    }

    let destdir = std::path::absolute(&args.destdir).map_err(|e| {
        anyhow!("Failed to resolve destdir path {:?}: {}", args.destdir, e)
    })?;
    fs::create_dir_all(&destdir).context("Failed to create destdir")?;
    let status = Command::new("rsync")
        .arg("-a")
        .arg(format!("{}/", capture.path().display()))
        .arg(format!("{}/", destdir.display()))
        .status()
        .context("Failed to run rsync")?;
    if !status.success() {
        return Err(anyhow!("Failed to copy output files"));
    }
    outln!("Materialized output to {}", destdir.display());
    Ok(())
}

fn validate_script_cmd(args: &MaterializeArgs) -> Result<()> {
    let has_script = args.script.as_deref().is_some_and(|s| !s.is_empty());
    let has_cmd = args.cmd.as_deref().is_some_and(|s| !s.is_empty());
    if has_script == has_cmd {
        return Err(anyhow!("Exactly one of --script or --cmd must be set"));
    }
    if !args.script_args.is_empty() && !has_script {
        return Err(anyhow!("Positional arguments require --script"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> MaterializeArgs {
        MaterializeArgs {
            script: None,
            cmd: None,
            outdir: None,
            destdir: "/tmp/dest".to_string(),
            image: None,
            preset: None,
            mounts: vec![],
            env: vec![],
            interactive: false,
            script_args: vec![],
        }
    }

    #[test]
    fn test_validate_script_cmd() {
        let mut args = base_args();
        assert!(validate_script_cmd(&args).is_err());

        args.cmd = Some("echo hi".to_string());
        assert!(validate_script_cmd(&args).is_ok());

        args.script = Some("./run.sh".to_string());
        assert!(validate_script_cmd(&args).is_err());

        args.cmd = None;
        assert!(validate_script_cmd(&args).is_ok());

        args.script = None;
        args.cmd = Some("echo hi".to_string());
        args.script_args = vec!["--flag".to_string()];
        assert!(validate_script_cmd(&args).is_err());
    }
}
