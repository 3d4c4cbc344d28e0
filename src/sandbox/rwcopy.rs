use crate::runtime::Runtime;
use crate::sandbox::binding::{BindingMode, RuntimeBinding};
use crate::sandbox::ledger::{Compensation, RollbackLedger};
use crate::sandbox::mounts::{MountMode, MountSpec};
use crate::sandbox::names;
use crate::util::copy_file_preserving_mode;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

/// The physical resource materialized for one rwcopy mount.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBacking {
    /// A runtime-managed volume populated from a host directory.
    DirectoryVolume { volume: String },
    /// A host directory holding a copy of a single file.
    FileCopy {
        name: String,
        dir: PathBuf,
        copy_path: PathBuf,
    },
}

/// Materialize the backing store for one rwcopy mount and produce the
/// runtime binding the container will see. Directory sources become
/// populated volumes; regular files are copied into a fresh directory under
/// `copy_base`. Anything else fails the operation.
///
/// Every physical resource created here pushes its undo onto `ledger`
/// before the next step runs, so a failure at any point leaves the caller
/// able to roll back cleanly. Whether the backing store is also recorded in
/// a state file is the caller's concern; ephemeral consumers skip that.
pub fn resolve_rwcopy_mount(
    runtime: &dyn Runtime,
    owner: &str,
    mount: &MountSpec,
    copy_base: &Path,
    ledger: &mut RollbackLedger,
) -> Result<(RuntimeBinding, ResolvedBacking)> {
    debug_assert!(mount.mode == MountMode::Rwcopy);

    let metadata = fs::metadata(&mount.source).map_err(|e| {
        anyhow!(
            "rwcopy source {:?} is not accessible: {}",
            mount.source.display().to_string(),
            e
        )
    })?;

    let provenance = mount
        .snapshot_from
        .clone()
        .unwrap_or_else(|| mount.source.to_string_lossy().into_owned());

    if metadata.is_dir() {
        let volume = names::rwcopy_volume_name(owner, &mount.target);
        runtime.create_volume(&volume)?;
        ledger.push(Compensation::RemovePhysicalVolume {
            volume: volume.clone(),
        });

        runtime.populate_volume(&volume, &mount.source)?;

        let binding = RuntimeBinding::Volume {
            volume: volume.clone(),
            target: mount.target.clone(),
            mode: BindingMode::Rw,
            snapshot_from: Some(provenance),
        };
        Ok((binding, ResolvedBacking::DirectoryVolume { volume }))
    } else if metadata.is_file() {
        let name = names::rwcopy_file_mount_name(owner, &mount.target);
        let dir = copy_base.join(&name);
        fs::create_dir_all(&dir).context(format!(
            "Failed to create file mount directory for {:?}",
            name
        ))?;
        ledger.push(Compensation::RemoveFileMountDir { dir: dir.clone() });

        let file_name = mount.source.file_name().ok_or_else(|| {
            anyhow!(
                "rwcopy source {:?} has no file name",
                mount.source.display().to_string()
            )
        })?;
        let copy_path = dir.join(file_name);
        copy_file_preserving_mode(&mount.source, &copy_path).context(
            format!(
                "Failed to copy file for rwcopy mount {:?}",
                mount.source.display().to_string()
            ),
        )?;

        let binding = RuntimeBinding::Bind {
            source: copy_path.to_string_lossy().into_owned(),
            target: mount.target.clone(),
            mode: BindingMode::Rw,
            snapshot_from: Some(provenance),
        };
        Ok((
            binding,
            ResolvedBacking::FileCopy {
                name,
                dir,
                copy_path,
            },
        ))
    } else {
        Err(anyhow!(
            "rwcopy source {:?} is neither a directory nor a regular file",
            mount.source.display().to_string()
        ))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::runtime::FakeRuntime;
    use crate::sandbox::StateStores;
    use crate::config::StatePaths;

    fn rwcopy_mount(source: &Path, target: &str) -> MountSpec {
        MountSpec {
            source: source.to_path_buf(),
            target: target.to_string(),
            mode: MountMode::Rwcopy,
            snapshot_from: None,
        }
    }

    #[test]
    fn test_directory_source_becomes_populated_volume() -> Result<()> {
        let host = tempfile::tempdir()?;
        fs::write(host.path().join("a.txt"), "hello")?;
        let copies = tempfile::tempdir()?;
        let runtime = FakeRuntime::new();
        let mut ledger = RollbackLedger::new();

        let (binding, backing) = resolve_rwcopy_mount(
            &runtime,
            "beta",
            &rwcopy_mount(host.path(), "/work"),
            copies.path(),
            &mut ledger,
        )?;

        let ResolvedBacking::DirectoryVolume { volume } = backing else {
            panic!("expected a directory volume");
        };
        assert!(volume.starts_with("cocoon-rwcopy-beta-work-"));
        assert!(runtime.volume_exists(&volume));
        assert_eq!(
            runtime.populated_from(&volume).as_deref(),
            Some(host.path())
        );
        match binding {
            RuntimeBinding::Volume {
                volume: bound,
                target,
                mode,
                snapshot_from,
            } => {
                assert_eq!(bound, volume);
                assert_eq!(target, "/work");
                assert_eq!(mode, BindingMode::Rw);
                assert_eq!(
                    snapshot_from.as_deref(),
                    Some(host.path().to_str().expect("utf-8 path"))
                );
            }
            other => panic!("expected a volume binding, got {:?}", other),
        }
        assert!(!ledger.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_source_becomes_host_copy() -> Result<()> {
        let host = tempfile::tempdir()?;
        let source = host.path().join("cfg.json");
        fs::write(&source, "{}")?;
        let copies = tempfile::tempdir()?;
        let runtime = FakeRuntime::new();
        let mut ledger = RollbackLedger::new();

        let (binding, backing) = resolve_rwcopy_mount(
            &runtime,
            "gamma",
            &rwcopy_mount(&source, "/etc/cfg.json"),
            copies.path(),
            &mut ledger,
        )?;

        let ResolvedBacking::FileCopy {
            name,
            dir,
            copy_path,
        } = backing
        else {
            panic!("expected a file copy");
        };
        assert!(name.starts_with("cocoon-rwcopy-file-gamma-"));
        assert_eq!(copy_path, dir.join("cfg.json"));
        assert_eq!(fs::read_to_string(&copy_path)?, "{}");
        match binding {
            RuntimeBinding::Bind {
                source: bound_source,
                target,
                mode,
                ..
            } => {
                assert_eq!(bound_source, copy_path.to_string_lossy());
                assert_eq!(target, "/etc/cfg.json");
                assert_eq!(mode, BindingMode::Rw);
            }
            other => panic!("expected a bind binding, got {:?}", other),
        }
        assert!(runtime.volume_names().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_source_fails() {
        let copies = tempfile::tempdir().expect("tempdir");
        let runtime = FakeRuntime::new();
        let mut ledger = RollbackLedger::new();

        let err = resolve_rwcopy_mount(
            &runtime,
            "alpha",
            &rwcopy_mount(Path::new("/no/such/path"), "/work"),
            copies.path(),
            &mut ledger,
        )
        .expect_err("expected missing source to fail");
        assert!(err.to_string().contains("is not accessible"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_populate_failure_leaves_volume_in_ledger() -> Result<()> {
        let host = tempfile::tempdir()?;
        let copies = tempfile::tempdir()?;
        let runtime = FakeRuntime::new();
        runtime.fail_populate();
        let mut ledger = RollbackLedger::new();

        let err = resolve_rwcopy_mount(
            &runtime,
            "alpha",
            &rwcopy_mount(host.path(), "/work"),
            copies.path(),
            &mut ledger,
        )
        .expect_err("expected population to fail");
        assert!(err.to_string().contains("population refused"));

        // The volume was created before population failed; unwinding the
        // ledger must delete it again.
        assert_eq!(runtime.volume_names().len(), 1);
        let state = tempfile::tempdir()?;
        let stores = StateStores::open(&StatePaths::in_dir(state.path()));
        ledger.unwind(&stores, &runtime);
        assert!(runtime.volume_names().is_empty());
        Ok(())
    }

    #[test]
    fn test_git_provenance_overrides_source() -> Result<()> {
        let host = tempfile::tempdir()?;
        let copies = tempfile::tempdir()?;
        let runtime = FakeRuntime::new();
        let mut ledger = RollbackLedger::new();

        let mut mount = rwcopy_mount(host.path(), "/work");
        mount.snapshot_from = Some("/real/repo".to_string());

        let (binding, _) = resolve_rwcopy_mount(
            &runtime,
            "alpha",
            &mount,
            copies.path(),
            &mut ledger,
        )?;
        match binding {
            RuntimeBinding::Volume { snapshot_from, .. } => {
                assert_eq!(snapshot_from.as_deref(), Some("/real/repo"));
            }
            other => panic!("expected a volume binding, got {:?}", other),
        }
        Ok(())
    }
}
