use crate::sandbox::store::{JsonlStore, Record, Referenced};
use serde::{Deserialize, Serialize};

/// A tracked runtime-managed volume backing a directory rwcopy mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub name: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sandbox_refs: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record for VolumeRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Referenced for VolumeRecord {
    fn sandbox_refs(&self) -> &[String] {
        &self.sandbox_refs
    }

    fn sandbox_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.sandbox_refs
    }
}

pub type VolumeStore = JsonlStore<VolumeRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn volume(name: &str) -> VolumeRecord {
        VolumeRecord {
            name: name.to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            created_by: Some("rwcopy".to_string()),
            source_path: Some("/src/tree".to_string()),
            sandbox_refs: vec![],
            extra: serde_json::Map::new(),
        }
    }

    fn store(dir: &tempfile::TempDir) -> VolumeStore {
        JsonlStore::new(dir.path().join("volumes.jsonl"), "volume")
    }

    #[test]
    fn test_add_ref_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(&dir);
        store.save(volume("v1"))?;

        store.add_sandbox_ref("v1", "alpha")?;
        store.add_sandbox_ref("v1", "alpha")?;
        store.add_sandbox_ref("v1", "beta")?;

        let rec = store.require("v1")?;
        assert_eq!(rec.sandbox_refs, vec!["alpha", "beta"]);
        Ok(())
    }

    #[test]
    fn test_remove_ref_and_in_use() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(&dir);
        store.save(volume("v1"))?;

        store.add_sandbox_ref("v1", "alpha")?;
        assert!(store.is_in_use("v1")?);

        store.remove_sandbox_ref("v1", "alpha")?;
        assert!(!store.is_in_use("v1")?);
        // Removing an absent ref leaves the set untouched.
        store.remove_sandbox_ref("v1", "alpha")?;
        assert!(store.require("v1")?.sandbox_refs.is_empty());
        Ok(())
    }

    #[test]
    fn test_ref_ops_require_existing_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        assert!(store.add_sandbox_ref("ghost", "alpha").is_err());
        assert!(store.remove_sandbox_ref("ghost", "alpha").is_err());
        assert!(store.is_in_use("ghost").is_err());
    }

    #[test]
    fn test_for_sandbox_filters_by_ref() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(&dir);
        store.save(volume("v1"))?;
        store.save(volume("v2"))?;
        store.add_sandbox_ref("v1", "alpha")?;
        store.add_sandbox_ref("v2", "beta")?;

        let for_alpha = store.for_sandbox("alpha")?;
        assert_eq!(for_alpha.len(), 1);
        assert_eq!(for_alpha[0].name, "v1");
        Ok(())
    }

    #[test]
    fn test_state_format_field_names() -> Result<()> {
        let mut rec = volume("v1");
        rec.sandbox_refs.push("alpha".to_string());
        let json = serde_json::to_value(&rec)?;
        assert_eq!(json["createdAt"], "2026-01-01T00:00:00Z");
        assert_eq!(json["createdBy"], "rwcopy");
        assert_eq!(json["sourcePath"], "/src/tree");
        assert_eq!(json["sandboxRefs"][0], "alpha");
        Ok(())
    }
}
