use crate::sandbox::binding::{BindingMode, RuntimeBinding};
use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::fmt;
use std::path::{self, PathBuf};

/// Mode requested for a bind-form mount. `Rwcopy` is resolved into a backing
/// store before the container ever sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    Ro,
    Rw,
    Rwcopy,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountMode::Ro => write!(f, "ro"),
            MountMode::Rw => write!(f, "rw"),
            MountMode::Rwcopy => write!(f, "rwcopy"),
        }
    }
}

/// A parsed bind-form mount request (`source:target[:mode]`).
#[derive(Debug, Clone, PartialEq)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: String,
    pub mode: MountMode,
    /// Original host source when `source` itself is already a prepared copy
    /// (git snapshots stage through a temp directory).
    pub snapshot_from: Option<String>,
}

impl MountSpec {
    /// The runtime binding for a plain ro/rw mount. Must not be called for
    /// rwcopy mounts; those go through the rwcopy resolver.
    pub fn direct_binding(&self) -> RuntimeBinding {
        let mode = match self.mode {
            MountMode::Ro => BindingMode::Ro,
            MountMode::Rw | MountMode::Rwcopy => BindingMode::Rw,
        };
        RuntimeBinding::Bind {
            source: self.source.to_string_lossy().into_owned(),
            target: self.target.clone(),
            mode,
            snapshot_from: self.snapshot_from.clone(),
        }
    }

    /// The host path to show the user: the provenance source for staged
    /// copies, the mount source otherwise.
    pub fn display_source(&self) -> String {
        match &self.snapshot_from {
            Some(origin) if self.mode == MountMode::Rwcopy => origin.clone(),
            _ => self.source.to_string_lossy().into_owned(),
        }
    }
}

/// A parsed volume-attach request (`name:target[:mode]`) referencing an
/// already-tracked directory volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAttach {
    pub volume: String,
    pub target: String,
    pub mode: BindingMode,
}

impl VolumeAttach {
    pub fn binding(&self) -> RuntimeBinding {
        RuntimeBinding::Volume {
            volume: self.volume.clone(),
            target: self.target.clone(),
            mode: self.mode,
            snapshot_from: None,
        }
    }
}

/// Parse `--mount` values. Mode defaults to `rwcopy` when omitted.
pub fn parse_mount_specs(raw: &[String]) -> Result<Vec<MountSpec>> {
    let mut mounts = Vec::new();
    let mut seen = HashSet::new();

    for entry in raw {
        let parts: Vec<&str> = entry.splitn(3, ':').collect();
        if parts.len() < 2 {
            return Err(anyhow!(
                "Invalid mount format {:?}: expected source:target[:mode]",
                entry
            ));
        }

        let source = parts[0];
        let target = parts[1];
        let mode = match parts.get(2).copied() {
            None => MountMode::Rwcopy,
            Some("ro") => MountMode::Ro,
            Some("rw") => MountMode::Rw,
            Some("rwcopy") => MountMode::Rwcopy,
            Some(other) => {
                return Err(anyhow!(
                    "Invalid mount mode {:?}: must be \"ro\", \"rw\", or \"rwcopy\"",
                    other
                ));
            }
        };

        let source = path::absolute(source).map_err(|e| {
            anyhow!("Failed to resolve source path {:?}: {}", source, e)
        })?;

        if !target.starts_with('/') {
            return Err(anyhow!(
                "Mount target {:?} must be an absolute path",
                target
            ));
        }

        if !seen.insert(target.to_string()) {
            return Err(anyhow!("Duplicate mount target {:?}", target));
        }

        mounts.push(MountSpec {
            source,
            target: target.to_string(),
            mode,
            snapshot_from: None,
        });
    }
    Ok(mounts)
}

/// Parse `--volume` values. Mode defaults to `rw` when omitted; `rwcopy` is
/// not a valid mode for attaching an existing volume.
pub fn parse_volume_attachments(raw: &[String]) -> Result<Vec<VolumeAttach>> {
    let mut attachments = Vec::new();
    let mut seen = HashSet::new();

    for entry in raw {
        let parts: Vec<&str> = entry.splitn(3, ':').collect();
        if parts.len() < 2 {
            return Err(anyhow!(
                "Invalid volume format {:?}: expected name:target[:mode]",
                entry
            ));
        }

        let name = parts[0].trim();
        let target = parts[1];
        let mode = match parts.get(2).copied() {
            None => BindingMode::Rw,
            Some("ro") => BindingMode::Ro,
            Some("rw") => BindingMode::Rw,
            Some(other) => {
                return Err(anyhow!(
                    "Invalid volume mount mode {:?}: must be \"ro\" or \"rw\"",
                    other
                ));
            }
        };

        if name.is_empty() {
            return Err(anyhow!("Volume name must not be empty in {:?}", entry));
        }
        if !target.starts_with('/') {
            return Err(anyhow!(
                "Mount target {:?} must be an absolute path",
                target
            ));
        }
        if !seen.insert(target.to_string()) {
            return Err(anyhow!("Duplicate mount target {:?}", target));
        }

        attachments.push(VolumeAttach {
            volume: name.to_string(),
            target: target.to_string(),
            mode,
        });
    }
    Ok(attachments)
}

/// Reject target collisions across bind-form and attach-form inputs.
pub fn ensure_unique_targets(
    mounts: &[MountSpec],
    volumes: &[VolumeAttach],
) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for mount in mounts {
        if !seen.insert(&mount.target) {
            return Err(anyhow!("Duplicate mount target {:?}", mount.target));
        }
    }
    for volume in volumes {
        if !seen.insert(&volume.target) {
            return Err(anyhow!("Duplicate mount target {:?}", volume.target));
        }
    }
    Ok(())
}
