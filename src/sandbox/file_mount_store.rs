use crate::sandbox::store::{JsonlStore, Record, Referenced};
use serde::{Deserialize, Serialize};

fn file_type() -> String {
    "file".to_string()
}

/// A tracked host-side copy backing a single-file rwcopy mount. The copy
/// lives at `copy_path` inside a per-mount directory under the managed
/// file-mounts base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMountRecord {
    pub name: String,
    #[serde(rename = "type", default = "file_type")]
    pub kind: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub copy_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sandbox_refs: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record for FileMountRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Referenced for FileMountRecord {
    fn sandbox_refs(&self) -> &[String] {
        &self.sandbox_refs
    }

    fn sandbox_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.sandbox_refs
    }
}

pub type FileMountStore = JsonlStore<FileMountRecord>;
