use serde::{Deserialize, Serialize};
use std::fmt;

/// Access mode of a runtime binding inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    Ro,
    Rw,
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingMode::Ro => write!(f, "ro"),
            BindingMode::Rw => write!(f, "rw"),
        }
    }
}

/// A concrete mount handed to the container runtime. Bind mounts reference a
/// host path, volume mounts reference a runtime-managed volume by name.
/// `snapshot_from` records the original host source for rwcopy-derived
/// bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuntimeBinding {
    Bind {
        source: String,
        target: String,
        mode: BindingMode,
        #[serde(
            rename = "snapshotFrom",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        snapshot_from: Option<String>,
    },
    Volume {
        volume: String,
        target: String,
        mode: BindingMode,
        #[serde(
            rename = "snapshotFrom",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        snapshot_from: Option<String>,
    },
}

impl RuntimeBinding {
    pub fn target(&self) -> &str {
        match self {
            RuntimeBinding::Bind { target, .. } => target,
            RuntimeBinding::Volume { target, .. } => target,
        }
    }

    pub fn mode(&self) -> BindingMode {
        match self {
            RuntimeBinding::Bind { mode, .. } => *mode,
            RuntimeBinding::Volume { mode, .. } => *mode,
        }
    }

    /// The `source:target[:ro]` spec string the container runtime consumes,
    /// or `None` when either side is empty.
    pub fn volume_spec(&self) -> Option<String> {
        let (src, target, mode) = match self {
            RuntimeBinding::Bind {
                source,
                target,
                mode,
                ..
            } => (source.as_str(), target.as_str(), *mode),
            RuntimeBinding::Volume {
                volume,
                target,
                mode,
                ..
            } => (volume.as_str(), target.as_str(), *mode),
        };
        if src.is_empty() || target.is_empty() {
            return None;
        }
        let mut spec = format!("{}:{}", src, target);
        if mode == BindingMode::Ro {
            spec.push_str(":ro");
        }
        Some(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_serialization_shape() {
        let binding = RuntimeBinding::Volume {
            volume: "cocoon-rwcopy-beta-work-1".to_string(),
            target: "/work".to_string(),
            mode: BindingMode::Rw,
            snapshot_from: Some("/src/tree".to_string()),
        };
        let json = serde_json::to_value(&binding).expect("serialize");
        assert_eq!(json["type"], "volume");
        assert_eq!(json["volume"], "cocoon-rwcopy-beta-work-1");
        assert_eq!(json["mode"], "rw");
        assert_eq!(json["snapshotFrom"], "/src/tree");
        assert!(json.get("source").is_none());
    }

    #[test]
    fn test_binding_roundtrip() {
        let binding = RuntimeBinding::Bind {
            source: "/host/dir".to_string(),
            target: "/mnt".to_string(),
            mode: BindingMode::Ro,
            snapshot_from: None,
        };
        let json = serde_json::to_string(&binding).expect("serialize");
        assert!(!json.contains("snapshotFrom"));
        let parsed: RuntimeBinding =
            serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, binding);
    }

    #[test]
    fn test_volume_spec() {
        let bind = RuntimeBinding::Bind {
            source: "/host".to_string(),
            target: "/mnt".to_string(),
            mode: BindingMode::Ro,
            snapshot_from: None,
        };
        assert_eq!(bind.volume_spec().as_deref(), Some("/host:/mnt:ro"));

        let vol = RuntimeBinding::Volume {
            volume: "data".to_string(),
            target: "/data".to_string(),
            mode: BindingMode::Rw,
            snapshot_from: None,
        };
        assert_eq!(vol.volume_spec().as_deref(), Some("data:/data"));

        let empty = RuntimeBinding::Bind {
            source: String::new(),
            target: "/mnt".to_string(),
            mode: BindingMode::Rw,
            snapshot_from: None,
        };
        assert!(empty.volume_spec().is_none());
    }
}
