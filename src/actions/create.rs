use crate::agentconfig::implicit_agent_mounts;
use crate::config::cli::CreateArgs;
use crate::config::{StatePaths, paths};
use crate::outln;
use crate::runtime::RuntimeProvider;
use crate::sandbox::git::prepare_git_mount;
use crate::sandbox::{
    CONTAINER_HOME, CreateSpec, StateStores, create_sandbox,
    ensure_unique_targets, parse_mount_specs, parse_volume_attachments,
    presets,
};
use crate::util::{prompt_confirmation, set_json_output};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::io;

pub fn create(args: CreateArgs) -> Result<()> {
    let provider: RuntimeProvider = args.provider.parse()?;
    let runtime = provider.runtime();

    if args.no_clean && args.git.is_none() {
        return Err(anyhow!("--no-clean requires --git"));
    }

    let resolved_image =
        presets::resolve_image(args.image.as_deref(), args.preset.as_deref())?;
    presets::ensure_image(runtime.as_ref(), &resolved_image)?;

    let mut mounts = parse_mount_specs(&args.mounts)?;
    let volumes = parse_volume_attachments(&args.volumes)?;

    // The staging copy behind a git mount lives only as long as this value.
    let git_mount = match &args.git {
        Some(path) => Some(prepare_git_mount(path, args.no_clean)?),
        None => None,
    };
    if let Some(git_mount) = &git_mount {
        mounts.push(git_mount.mount.clone());
    }

    if presets::is_agent_preset(args.preset.as_deref()) {
        if let Ok(home) = paths::home_dir() {
            mounts.extend(implicit_agent_mounts(&home));
        }
    }

    ensure_unique_targets(&mounts, &volumes)?;

    if (!mounts.is_empty() || !volumes.is_empty()) && !args.yes {
        if let Some(git_mount) = &git_mount {
            outln!("Git repo to mount:");
            outln!("  repo: {}", git_mount.repo_name);
            outln!("  root: {}", git_mount.repo_root.display());
            outln!(
                "  mode: {}",
                if git_mount.no_clean { "no-clean" } else { "clean" }
            );
            outln!("  target: {}", git_mount.mount.target);
        }
        outln!("You are about to mount:");
        for mount in &mounts {
            outln!(
                "  {} -> {} ({})",
                mount.display_source(),
                mount.target,
                mount.mode
            );
        }
        for volume in &volumes {
            outln!(
                "  volume {} -> {} ({})",
                volume.volume,
                volume.target,
                volume.mode
            );
        }
        if !prompt_confirmation(&mut io::stdin().lock())? {
            outln!("Aborted.");
            return Ok(());
        }
    }

    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);

    let record = create_sandbox(
        &stores,
        runtime.as_ref(),
        CreateSpec {
            name: args.name,
            provider,
            image: resolved_image.image,
            preset: args.preset,
            mounts,
            volumes,
            env: args.env,
        },
    )?;

    let short_id: String = record.container_id.chars().take(12).collect();
    outln!("Sandbox {:?} created (container {})", record.name, short_id);
    set_json_output("sandbox", &Value::String(record.name.clone()));
    set_json_output("container_id", &Value::String(record.container_id.clone()));

    if args.connect {
        runtime
            .exec_interactive(&record.name, CONTAINER_HOME, "zsh")
            .map_err(|e| {
                anyhow!(
                    "Sandbox {:?} created but failed to connect: {}",
                    record.name,
                    e
                )
            })?;
    }
    Ok(())
}
