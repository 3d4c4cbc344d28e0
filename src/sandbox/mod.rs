pub mod binding;
pub mod create;
pub mod delete;
pub mod file_mount_store;
pub mod git;
pub mod ledger;
pub mod mounts;
pub mod names;
pub mod presets;
pub mod rwcopy;
pub mod store;
pub mod volume_store;

pub use binding::{BindingMode, RuntimeBinding};
pub use create::{CreateSpec, create_sandbox};
pub use delete::{
    BackingOutcome, BackingStatus, DeletePolicy, DeletionReport,
    delete_sandbox, delete_tracked_backing,
};
pub use file_mount_store::{FileMountRecord, FileMountStore};
pub use mounts::{
    MountMode, MountSpec, VolumeAttach, ensure_unique_targets,
    parse_mount_specs, parse_volume_attachments,
};
pub use store::{JsonlStore, SandboxRecord, SandboxStore};
pub use volume_store::{VolumeRecord, VolumeStore};

use crate::config::StatePaths;
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;

/// Home directory inside preset container images.
pub const CONTAINER_HOME: &str = "/home/cocoon";

/// Default working directory for mounted project trees.
pub const CONTAINER_WORKSPACE: &str = "/home/cocoon/workspace";

pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The three record stores plus the base directory for file-mount copies.
pub struct StateStores {
    pub sandboxes: SandboxStore,
    pub volumes: VolumeStore,
    pub file_mounts: FileMountStore,
    pub file_mounts_dir: PathBuf,
}

impl StateStores {
    pub fn open(paths: &StatePaths) -> Self {
        Self {
            sandboxes: JsonlStore::new(paths.sandboxes_file(), "sandbox"),
            volumes: JsonlStore::new(paths.volumes_file(), "volume"),
            file_mounts: JsonlStore::new(
                paths.file_mounts_file(),
                "file mount",
            ),
            file_mounts_dir: paths.file_mounts_dir(),
        }
    }
}

/// Kind discriminator for the merged backing-store listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    Directory,
    File,
}

impl BackingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackingKind::Directory => "directory",
            BackingKind::File => "file",
        }
    }
}

/// One row of the merged directory-volume / file-mount listing.
#[derive(Debug, Clone)]
pub struct BackingSummary {
    pub name: String,
    pub kind: BackingKind,
    pub created_at: String,
    pub sandbox_refs: Vec<String>,
    pub source_path: Option<String>,
}

/// Directory volumes followed by file mounts, as one list with a kind tag.
pub fn backing_summaries(stores: &StateStores) -> Result<Vec<BackingSummary>> {
    let mut summaries = Vec::new();
    for volume in stores.volumes.list()? {
        summaries.push(BackingSummary {
            name: volume.name,
            kind: BackingKind::Directory,
            created_at: volume.created_at,
            sandbox_refs: volume.sandbox_refs,
            source_path: volume.source_path,
        });
    }
    for mount in stores.file_mounts.list()? {
        summaries.push(BackingSummary {
            name: mount.name,
            kind: BackingKind::File,
            created_at: mount.created_at,
            sandbox_refs: mount.sandbox_refs,
            source_path: mount.source_path,
        });
    }
    Ok(summaries)
}
