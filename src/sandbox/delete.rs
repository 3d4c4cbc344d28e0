use crate::runtime::Runtime;
use crate::sandbox::{BackingKind, StateStores};
use crate::util::prompt_confirmation;
use anyhow::{Result, anyhow};
use log::trace;
use std::fmt;
use std::io::BufRead;
use std::path::Path;

/// What to do with a deleted sandbox's backing stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete every backing store that ends up unreferenced.
    DeleteBacking,
    /// Keep all backing stores.
    KeepBacking,
    /// Prompt when this sandbox is the sole user of any backing store;
    /// otherwise keep.
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackingOutcome {
    Preserved,
    PreservedStillReferenced,
    Deleted,
    DeleteFailed(String),
}

/// Per-backing-store status line of a sandbox deletion.
#[derive(Debug, Clone)]
pub struct BackingStatus {
    pub kind: BackingKind,
    pub name: String,
    pub outcome: BackingOutcome,
}

impl fmt::Display for BackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            BackingKind::Directory => "volume",
            BackingKind::File => "file-mount",
        };
        match &self.outcome {
            BackingOutcome::Preserved => {
                write!(f, "{} {}: preserved", label, self.name)
            }
            BackingOutcome::PreservedStillReferenced => {
                write!(f, "{} {}: preserved (still referenced)", label, self.name)
            }
            BackingOutcome::Deleted => {
                write!(f, "{} {}: deleted", label, self.name)
            }
            BackingOutcome::DeleteFailed(reason) => {
                write!(f, "{} {}: delete-failed: {}", label, self.name, reason)
            }
        }
    }
}

/// Outcome of a sandbox deletion. Per-store failures are collected here
/// rather than aborting the teardown halfway.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub sandbox: String,
    pub statuses: Vec<BackingStatus>,
    failures: Vec<String>,
}

impl DeletionReport {
    /// The aggregated error for any per-store failures, if there were any.
    pub fn failure(&self) -> Option<anyhow::Error> {
        if self.failures.is_empty() {
            None
        } else {
            Some(anyhow!("{}", self.failures.join("; ")))
        }
    }

    fn record(&mut self, status: BackingStatus, error: Option<String>) {
        if let Some(error) = error {
            self.failures.push(error);
        }
        self.statuses.push(status);
    }
}

/// Delete a sandbox: remove its container, release its claims on every
/// backing store, delete stores that became unreferenced (policy
/// permitting), and drop the sandbox record. A container-removal failure
/// aborts immediately; nothing worse than a still-live container should be
/// left pointing at half-deleted state.
pub fn delete_sandbox(
    stores: &StateStores,
    runtime: &dyn Runtime,
    name: &str,
    policy: DeletePolicy,
    input: &mut dyn BufRead,
) -> Result<DeletionReport> {
    if stores.sandboxes.get(name)?.is_none() {
        return Err(anyhow!("Sandbox {:?} not found", name));
    }

    let delete_backing = resolve_delete_backing(stores, name, policy, input)?;
    trace!(
        "Deleting sandbox {} (delete_backing={})",
        name, delete_backing
    );

    runtime.remove_container(name)?;

    let mut report = DeletionReport {
        sandbox: name.to_string(),
        ..DeletionReport::default()
    };
    cleanup_volumes(stores, runtime, name, delete_backing, &mut report)?;
    cleanup_file_mounts(stores, name, delete_backing, &mut report)?;

    stores.sandboxes.remove(name).map_err(|e| {
        anyhow!("Container removed but failed to update state: {}", e)
    })?;

    Ok(report)
}

/// Decide whether backing stores should be deleted. Explicit policies win;
/// auto prompts only when this sandbox is the sole claimant of at least one
/// backing store.
fn resolve_delete_backing(
    stores: &StateStores,
    name: &str,
    policy: DeletePolicy,
    input: &mut dyn BufRead,
) -> Result<bool> {
    match policy {
        DeletePolicy::DeleteBacking => return Ok(true),
        DeletePolicy::KeepBacking => return Ok(false),
        DeletePolicy::Auto => {}
    }

    let mut exclusive = Vec::new();
    for volume in stores.volumes.for_sandbox(name)? {
        if volume.sandbox_refs.iter().all(|r| r == name) {
            exclusive.push(volume.name);
        }
    }
    for mount in stores.file_mounts.for_sandbox(name)? {
        if mount.sandbox_refs.iter().all(|r| r == name) {
            exclusive.push(mount.name);
        }
    }

    if exclusive.is_empty() {
        return Ok(false);
    }

    eprintln!(
        "Sandbox {:?} is the only user of volumes: {}",
        name,
        exclusive.join(", ")
    );
    eprintln!("Delete these volumes as part of sandbox deletion?");
    prompt_confirmation(input)
}

fn cleanup_volumes(
    stores: &StateStores,
    runtime: &dyn Runtime,
    name: &str,
    delete_backing: bool,
    report: &mut DeletionReport,
) -> Result<()> {
    let volumes = stores
        .volumes
        .for_sandbox(name)
        .map_err(|e| anyhow!("Failed to load associated volumes: {}", e))?;

    for volume in volumes {
        let status = |outcome| BackingStatus {
            kind: BackingKind::Directory,
            name: volume.name.clone(),
            outcome,
        };

        if let Err(e) = stores.volumes.remove_sandbox_ref(&volume.name, name) {
            report.record(
                status(BackingOutcome::DeleteFailed(
                    "failed to update refs".to_string(),
                )),
                Some(format!(
                    "failed to remove sandbox ref for volume {:?}: {}",
                    volume.name, e
                )),
            );
            continue;
        }

        if !delete_backing {
            report.record(status(BackingOutcome::Preserved), None);
            continue;
        }

        match stores.volumes.is_in_use(&volume.name) {
            Ok(true) => {
                report.record(
                    status(BackingOutcome::PreservedStillReferenced),
                    None,
                );
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                report.record(
                    status(BackingOutcome::DeleteFailed(
                        "failed to check usage".to_string(),
                    )),
                    Some(format!(
                        "failed to check usage for volume {:?}: {}",
                        volume.name, e
                    )),
                );
                continue;
            }
        }

        if let Err(e) = runtime.remove_volume(&volume.name) {
            report.record(
                status(BackingOutcome::DeleteFailed(e.to_string())),
                Some(format!(
                    "failed to delete volume {:?}: {}",
                    volume.name, e
                )),
            );
            continue;
        }
        if let Err(e) = stores.volumes.remove(&volume.name) {
            report.record(
                status(BackingOutcome::DeleteFailed(
                    "failed to remove state entry".to_string(),
                )),
                Some(format!(
                    "failed to remove volume state for {:?}: {}",
                    volume.name, e
                )),
            );
            continue;
        }
        report.record(status(BackingOutcome::Deleted), None);
    }
    Ok(())
}

fn cleanup_file_mounts(
    stores: &StateStores,
    name: &str,
    delete_backing: bool,
    report: &mut DeletionReport,
) -> Result<()> {
    let mounts = stores
        .file_mounts
        .for_sandbox(name)
        .map_err(|e| anyhow!("Failed to load associated file mounts: {}", e))?;

    for mount in mounts {
        let status = |outcome| BackingStatus {
            kind: BackingKind::File,
            name: mount.name.clone(),
            outcome,
        };

        if let Err(e) =
            stores.file_mounts.remove_sandbox_ref(&mount.name, name)
        {
            report.record(
                status(BackingOutcome::DeleteFailed(
                    "failed to update refs".to_string(),
                )),
                Some(format!(
                    "failed to remove sandbox ref for file mount {:?}: {}",
                    mount.name, e
                )),
            );
            continue;
        }

        if !delete_backing {
            report.record(status(BackingOutcome::Preserved), None);
            continue;
        }

        match stores.file_mounts.is_in_use(&mount.name) {
            Ok(true) => {
                report.record(
                    status(BackingOutcome::PreservedStillReferenced),
                    None,
                );
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                report.record(
                    status(BackingOutcome::DeleteFailed(
                        "failed to check usage".to_string(),
                    )),
                    Some(format!(
                        "failed to check usage for file mount {:?}: {}",
                        mount.name, e
                    )),
                );
                continue;
            }
        }

        if let Err(e) = remove_copy_dir(&mount.copy_path) {
            report.record(
                status(BackingOutcome::DeleteFailed(e.to_string())),
                Some(format!(
                    "failed to delete file mount directory for {:?}: {}",
                    mount.name, e
                )),
            );
            continue;
        }
        if let Err(e) = stores.file_mounts.remove(&mount.name) {
            report.record(
                status(BackingOutcome::DeleteFailed(
                    "failed to remove state entry".to_string(),
                )),
                Some(format!(
                    "failed to remove file mount state for {:?}: {}",
                    mount.name, e
                )),
            );
            continue;
        }
        report.record(status(BackingOutcome::Deleted), None);
    }
    Ok(())
}

/// The copy lives one directory below the file-mounts base; deleting the
/// mount means deleting that per-mount directory.
fn remove_copy_dir(copy_path: &str) -> Result<()> {
    let dir = Path::new(copy_path)
        .parent()
        .ok_or_else(|| anyhow!("No parent directory for {:?}", copy_path))?;
    std::fs::remove_dir_all(dir)?;
    Ok(())
}

/// Delete a tracked backing store directly (`volume delete`). Refuses while
/// the reference set is non-empty unless forced.
pub fn delete_tracked_backing(
    stores: &StateStores,
    runtime: &dyn Runtime,
    name: &str,
    force: bool,
) -> Result<()> {
    if let Some(volume) = stores.volumes.get(name)? {
        if !volume.sandbox_refs.is_empty() && !force {
            return Err(anyhow!(
                "Volume {:?} is in use by sandboxes: {} (use --force to delete)",
                name,
                volume.sandbox_refs.join(", ")
            ));
        }
        runtime.remove_volume(name)?;
        stores.volumes.remove(name)?;
        return Ok(());
    }

    if let Some(mount) = stores.file_mounts.get(name)? {
        if !mount.sandbox_refs.is_empty() && !force {
            return Err(anyhow!(
                "Volume {:?} is in use by sandboxes: {} (use --force to delete)",
                name,
                mount.sandbox_refs.join(", ")
            ));
        }
        remove_copy_dir(&mount.copy_path).map_err(|e| {
            anyhow!("Failed to remove file mount directory: {}", e)
        })?;
        stores.file_mounts.remove(name)?;
        return Ok(());
    }

    Err(anyhow!("No volume found with name: {}", name))
}
