use crate::runtime::RuntimeProvider;
use crate::sandbox::binding::RuntimeBinding;
use crate::util::write_atomic;
use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

/// A record persisted to a JSONL state file, identified by name.
pub trait Record: Clone + Serialize + DeserializeOwned {
    fn name(&self) -> &str;
}

/// Records that carry the set of sandboxes currently claiming them.
pub trait Referenced {
    fn sandbox_refs(&self) -> &[String];
    fn sandbox_refs_mut(&mut self) -> &mut Vec<String>;
}

/// Store over a line-delimited JSON file. Mutations read everything, update
/// in memory, and rewrite the file through a rename so a crash never leaves
/// a half-written line behind. Malformed lines are skipped on read so older
/// or foreign records don't wedge the store.
pub struct JsonlStore<T> {
    path: PathBuf,
    label: &'static str,
    _record: PhantomData<T>,
}

impl<T: Record> JsonlStore<T> {
    pub fn new(path: PathBuf, label: &'static str) -> Self {
        Self {
            path,
            label,
            _record: PhantomData,
        }
    }

    pub fn list(&self) -> Result<Vec<T>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Failed to read {} file {}",
                    self.label,
                    self.path.display()
                ));
            }
        };

        Ok(contents
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    fn write_all(&self, records: &[T]) -> Result<()> {
        let mut contents = String::new();
        for record in records {
            let line = serde_json::to_string(record).context(format!(
                "Failed to serialize {} record",
                self.label
            ))?;
            contents.push_str(&line);
            contents.push('\n');
        }
        write_atomic(&self.path, contents.as_bytes()).context(format!(
            "Failed to write {} file {}",
            self.label,
            self.path.display()
        ))
    }

    /// Insert the record, or replace the existing record with the same name.
    pub fn save(&self, record: T) -> Result<()> {
        let mut records = self.list()?;
        match records.iter_mut().find(|r| r.name() == record.name()) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.write_all(&records)
    }

    pub fn get(&self, name: &str) -> Result<Option<T>> {
        Ok(self.list()?.into_iter().find(|r| r.name() == name))
    }

    /// Like `get`, but absence is an error.
    pub fn require(&self, name: &str) -> Result<T> {
        self.get(name)?.ok_or_else(|| {
            anyhow!("No {} found with name: {}", self.label, name)
        })
    }

    /// Remove the record by name. Removing an absent record is a no-op.
    pub fn remove(&self, name: &str) -> Result<()> {
        let records = self.list()?;
        let filtered: Vec<T> = records
            .iter()
            .filter(|r| r.name() != name)
            .cloned()
            .collect();
        if filtered.len() == records.len() {
            return Ok(());
        }
        self.write_all(&filtered)
    }
}

impl<T: Record + Referenced> JsonlStore<T> {
    /// Record that `sandbox` claims the named backing store. Adding a
    /// reference that is already present is a no-op.
    pub fn add_sandbox_ref(&self, name: &str, sandbox: &str) -> Result<()> {
        let mut record = self.require(name)?;
        if !record.sandbox_refs().iter().any(|r| r == sandbox) {
            record.sandbox_refs_mut().push(sandbox.to_string());
        }
        self.save(record)
    }

    pub fn remove_sandbox_ref(&self, name: &str, sandbox: &str) -> Result<()> {
        let mut record = self.require(name)?;
        record.sandbox_refs_mut().retain(|r| r != sandbox);
        self.save(record)
    }

    /// All records claimed by the given sandbox.
    pub fn for_sandbox(&self, sandbox: &str) -> Result<Vec<T>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.sandbox_refs().iter().any(|s| s == sandbox))
            .collect())
    }

    pub fn is_in_use(&self, name: &str) -> Result<bool> {
        Ok(!self.require(name)?.sandbox_refs().is_empty())
    }
}

/// A tracked sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRecord {
    pub name: String,
    pub provider: RuntimeProvider,
    pub container_id: String,
    pub image: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<RuntimeBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record for SandboxRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

pub type SandboxStore = JsonlStore<SandboxRecord>;
