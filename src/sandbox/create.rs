use crate::runtime::{Runtime, RuntimeProvider};
use crate::sandbox::binding::RuntimeBinding;
use crate::sandbox::ledger::{Compensation, RollbackLedger};
use crate::sandbox::mounts::{
    MountMode, MountSpec, VolumeAttach, ensure_unique_targets,
};
use crate::sandbox::rwcopy::{ResolvedBacking, resolve_rwcopy_mount};
use crate::sandbox::volume_store::VolumeRecord;
use crate::sandbox::file_mount_store::FileMountRecord;
use crate::sandbox::store::SandboxRecord;
use crate::sandbox::{StateStores, names, timestamp_now};
use anyhow::{Result, anyhow};
use log::trace;

const RWCOPY_CREATOR: &str = "rwcopy";

/// Everything needed to create one sandbox. Mounts are in declaration
/// order, including any injected agent-config and git mounts.
pub struct CreateSpec {
    pub name: Option<String>,
    pub provider: RuntimeProvider,
    pub image: String,
    pub preset: Option<String>,
    pub mounts: Vec<MountSpec>,
    pub volumes: Vec<VolumeAttach>,
    pub env: Vec<String>,
}

/// Create a sandbox: materialize rwcopy backing stores, attach tracked
/// volumes, start the container, then persist the sandbox record. The record
/// write is the commit point; any failure before it rolls back every
/// resource created so far. A failure of the record write itself leaves the
/// container and its backing stores in place and reports the situation.
pub fn create_sandbox(
    stores: &StateStores,
    runtime: &dyn Runtime,
    spec: CreateSpec,
) -> Result<SandboxRecord> {
    ensure_unique_targets(&spec.mounts, &spec.volumes)?;
    let name = resolve_name(stores, spec.name.as_deref())?;
    trace!("Creating sandbox {}", name);

    let mut ledger = RollbackLedger::new();
    let (bindings, container_id) =
        match provision(stores, runtime, &spec, &name, &mut ledger) {
            Ok(provisioned) => provisioned,
            Err(e) => {
                ledger.unwind(stores, runtime);
                return Err(e);
            }
        };

    let record = SandboxRecord {
        name: name.clone(),
        provider: spec.provider,
        container_id,
        image: spec.image,
        created_at: timestamp_now(),
        preset: spec.preset,
        mounts: bindings,
        env: spec.env,
        extra: serde_json::Map::new(),
    };
    if let Err(e) = stores.sandboxes.save(record.clone()) {
        // The container is up and its backing stores are referenced by it;
        // tearing them down now would strand a live container. Leave
        // everything and tell the caller.
        return Err(anyhow!(
            "Sandbox created but failed to save state: {}",
            e
        ));
    }
    ledger.commit();
    Ok(record)
}

fn resolve_name(stores: &StateStores, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(name) => {
            if stores.sandboxes.get(name)?.is_some() {
                return Err(anyhow!("Sandbox {:?} already exists", name));
            }
            Ok(name.to_string())
        }
        None => loop {
            let name = names::random_sandbox_name();
            if stores.sandboxes.get(&name)?.is_none() {
                return Ok(name);
            }
        },
    }
}

/// Steps 3–5 of the creation saga: everything that must be rolled back when
/// a later step fails.
fn provision(
    stores: &StateStores,
    runtime: &dyn Runtime,
    spec: &CreateSpec,
    name: &str,
    ledger: &mut RollbackLedger,
) -> Result<(Vec<RuntimeBinding>, String)> {
    let mut bindings = Vec::new();

    for mount in &spec.mounts {
        if mount.mode != MountMode::Rwcopy {
            bindings.push(mount.direct_binding());
            continue;
        }

        let (binding, backing) = resolve_rwcopy_mount(
            runtime,
            name,
            mount,
            &stores.file_mounts_dir,
            ledger,
        )?;
        // Provenance for staged copies (git mounts) is the real host
        // source, not the staging path that disappears after creation.
        let source_path = mount
            .snapshot_from
            .clone()
            .unwrap_or_else(|| mount.source.to_string_lossy().into_owned());
        match backing {
            ResolvedBacking::DirectoryVolume { volume } => {
                stores
                    .volumes
                    .save(VolumeRecord {
                        name: volume.clone(),
                        created_at: timestamp_now(),
                        created_by: Some(RWCOPY_CREATOR.to_string()),
                        source_path: Some(source_path.clone()),
                        sandbox_refs: vec![name.to_string()],
                        extra: serde_json::Map::new(),
                    })
                    .map_err(|e| {
                        anyhow!(
                            "Failed to save volume state for {:?}: {}",
                            volume,
                            e
                        )
                    })?;
                ledger.push(Compensation::RemoveVolumeRecord { volume });
            }
            ResolvedBacking::FileCopy {
                name: mount_name,
                copy_path,
                ..
            } => {
                stores
                    .file_mounts
                    .save(FileMountRecord {
                        name: mount_name.clone(),
                        kind: "file".to_string(),
                        created_at: timestamp_now(),
                        created_by: Some(RWCOPY_CREATOR.to_string()),
                        source_path: Some(source_path.clone()),
                        copy_path: copy_path.to_string_lossy().into_owned(),
                        sandbox_refs: vec![name.to_string()],
                        extra: serde_json::Map::new(),
                    })
                    .map_err(|e| {
                        anyhow!(
                            "Failed to save file mount state for {:?}: {}",
                            mount_name,
                            e
                        )
                    })?;
                ledger.push(Compensation::RemoveFileMountRecord {
                    name: mount_name,
                });
            }
        }
        bindings.push(binding);
    }

    for attach in &spec.volumes {
        if stores.volumes.get(&attach.volume)?.is_none() {
            return Err(anyhow!(
                "Volume {:?} is not tracked; create it via an rwcopy mount first",
                attach.volume
            ));
        }
        stores
            .volumes
            .add_sandbox_ref(&attach.volume, name)
            .map_err(|e| {
                anyhow!("Failed to attach volume {:?}: {}", attach.volume, e)
            })?;
        ledger.push(Compensation::RemoveVolumeRef {
            volume: attach.volume.clone(),
            sandbox: name.to_string(),
        });
        bindings.push(attach.binding());
    }

    let container_id =
        runtime.create_container(name, &spec.image, &bindings, &spec.env)?;

    Ok((bindings, container_id))
}
