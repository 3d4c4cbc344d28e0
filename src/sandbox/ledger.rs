use crate::runtime::Runtime;
use crate::sandbox::StateStores;
use log::warn;
use std::path::PathBuf;

/// A compensating action for one step of sandbox creation.
#[derive(Debug)]
pub enum Compensation {
    RemovePhysicalVolume { volume: String },
    RemoveVolumeRecord { volume: String },
    RemoveVolumeRef { volume: String, sandbox: String },
    RemoveFileMountDir { dir: PathBuf },
    RemoveFileMountRecord { name: String },
}

/// Ordered list of compensations accumulated while a creation is in flight.
/// Each step pushes its undo as soon as it succeeds; on failure the ledger
/// runs in reverse. Once the sandbox record is persisted the ledger is
/// committed and the entries are dropped.
#[derive(Debug, Default)]
pub struct RollbackLedger {
    entries: Vec<Compensation>,
}

impl RollbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, compensation: Compensation) {
        self.entries.push(compensation);
    }

    pub fn commit(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execute all compensations, newest first. Individual failures are
    /// logged and skipped; rollback keeps going so one stuck resource does
    /// not strand the rest.
    pub fn unwind(&mut self, stores: &StateStores, runtime: &dyn Runtime) {
        for compensation in self.entries.drain(..).rev() {
            let result = match &compensation {
                Compensation::RemovePhysicalVolume { volume } => {
                    runtime.remove_volume(volume)
                }
                Compensation::RemoveVolumeRecord { volume } => {
                    stores.volumes.remove(volume)
                }
                Compensation::RemoveVolumeRef { volume, sandbox } => {
                    stores.volumes.remove_sandbox_ref(volume, sandbox)
                }
                Compensation::RemoveFileMountDir { dir } => {
                    std::fs::remove_dir_all(dir).map_err(Into::into)
                }
                Compensation::RemoveFileMountRecord { name } => {
                    stores.file_mounts.remove(name)
                }
            };
            if let Err(e) = result {
                warn!("Rollback step {:?} failed: {}", compensation, e);
            }
        }
    }
}
