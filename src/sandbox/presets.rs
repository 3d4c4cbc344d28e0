use crate::outln;
use crate::runtime::Runtime;
use anyhow::{Result, anyhow};
use std::env;

/// Presets that carry agent credentials into the sandbox.
pub const AGENT_PRESETS: &[&str] = &["claude", "coder"];

/// Overrides the prefix used for preset image tags.
pub const IMAGE_PREFIX_ENV: &str = "COCOON_IMAGE_PREFIX";

const DEFAULT_IMAGE_PREFIX: &str = "cocoon";
const DEFAULT_BUILD_PRESET: &str = "coder";

pub fn is_agent_preset(preset: Option<&str>) -> bool {
    preset.is_some_and(|p| AGENT_PRESETS.contains(&p))
}

fn image_prefix() -> String {
    env::var(IMAGE_PREFIX_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_PREFIX.to_string())
}

fn preset_image(preset: &str) -> String {
    format!("{}-{}:latest", image_prefix(), preset)
}

pub fn preset_dockerfile(preset: &str) -> Result<&'static str> {
    match preset {
        "claude" => Ok(include_str!("../../presets/claude/Dockerfile")),
        "coder" => Ok(include_str!("../../presets/coder/Dockerfile")),
        other => Err(anyhow!("Unknown preset {:?}", other)),
    }
}

/// The image a sandbox or ephemeral run will use, plus the preset to build
/// it from when it is missing locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub image: String,
    pub build_preset: Option<String>,
}

/// Resolve `--image`/`--preset` into a concrete image reference. A preset
/// implies its own image tag; an explicit image is taken verbatim and never
/// auto-built; neither means the default coder preset image.
pub fn resolve_image(
    image: Option<&str>,
    preset: Option<&str>,
) -> Result<ResolvedImage> {
    if preset.is_some() && image.is_some() {
        return Err(anyhow!("--preset and --image are mutually exclusive"));
    }

    if let Some(preset) = preset {
        return Ok(ResolvedImage {
            image: preset_image(preset),
            build_preset: Some(preset.to_string()),
        });
    }
    if let Some(image) = image {
        return Ok(ResolvedImage {
            image: image.to_string(),
            build_preset: None,
        });
    }
    Ok(ResolvedImage {
        image: preset_image(DEFAULT_BUILD_PRESET),
        build_preset: Some(DEFAULT_BUILD_PRESET.to_string()),
    })
}

/// Build the resolved image from its preset Dockerfile when it is missing.
pub fn ensure_image(
    runtime: &dyn Runtime,
    resolved: &ResolvedImage,
) -> Result<()> {
    let Some(build_preset) = &resolved.build_preset else {
        return Ok(());
    };
    if runtime.image_exists(&resolved.image) {
        return Ok(());
    }
    let dockerfile = preset_dockerfile(build_preset)?;
    outln!(
        "Building {:?} preset image (this may take a few minutes)...",
        build_preset
    );
    runtime.build_image(&resolved.image, dockerfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FakeRuntime;

    #[test]
    fn test_is_agent_preset() {
        assert!(is_agent_preset(Some("claude")));
        assert!(is_agent_preset(Some("coder")));
        assert!(!is_agent_preset(Some("review")));
        assert!(!is_agent_preset(None));
    }

    #[test]
    fn test_preset_dockerfiles_are_embedded() {
        assert!(
            preset_dockerfile("claude")
                .expect("claude dockerfile")
                .contains("FROM")
        );
        assert!(
            preset_dockerfile("coder")
                .expect("coder dockerfile")
                .contains("FROM")
        );
        assert!(preset_dockerfile("review").is_err());
    }

    #[test]
    fn test_resolve_image_rules() -> Result<()> {
        let err = resolve_image(Some("alpine"), Some("coder"))
            .expect_err("expected mutual exclusion");
        assert!(err.to_string().contains("mutually exclusive"));

        let explicit = resolve_image(Some("alpine:3.20"), None)?;
        assert_eq!(explicit.image, "alpine:3.20");
        assert_eq!(explicit.build_preset, None);

        let preset = resolve_image(None, Some("claude"))?;
        assert_eq!(preset.image, "cocoon-claude:latest");
        assert_eq!(preset.build_preset.as_deref(), Some("claude"));

        let default = resolve_image(None, None)?;
        assert_eq!(default.image, "cocoon-coder:latest");
        assert_eq!(default.build_preset.as_deref(), Some("coder"));
        Ok(())
    }

    #[test]
    fn test_ensure_image_builds_only_when_missing() -> Result<()> {
        let runtime = FakeRuntime::new();
        let resolved = resolve_image(None, Some("coder"))?;

        ensure_image(&runtime, &resolved)?;
        assert_eq!(runtime.built_images(), vec!["cocoon-coder:latest"]);

        // Second call sees the image and does nothing.
        ensure_image(&runtime, &resolved)?;
        assert_eq!(runtime.built_images().len(), 1);

        // Explicit images are never built.
        let explicit = resolve_image(Some("alpine:3.20"), None)?;
        ensure_image(&runtime, &explicit)?;
        assert_eq!(runtime.built_images().len(), 1);
        Ok(())
    }
}
