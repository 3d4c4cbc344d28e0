//! Discovery of coding-agent credential files on the host. When an agent
//! preset is selected, each file that exists becomes an implicit rwcopy
//! mount at the matching path under the container home. Only `stat` is used
//! here; file contents are never read.

use crate::sandbox::CONTAINER_HOME;
use crate::sandbox::mounts::{MountMode, MountSpec};
use std::fs;
use std::path::Path;

const CLAUDE_CREDENTIAL_PATHS: &[&str] = &[
    ".claude.json.api",
    ".claude.json",
    ".claude/.credentials.json",
    ".claude-oauth-credentials.json",
];

const OPENCODE_CREDENTIAL_PATHS: &[&str] = &[
    ".local/share/opencode/auth.json",
    ".local/state/opencode/model.json",
];

const CODEX_CREDENTIAL_PATHS: &[&str] = &[".codex/auth.json"];

/// rwcopy mounts for every supported agent credential file present under
/// `home_dir`. Missing files are normal; paths of the wrong kind (a
/// directory where a file is expected) are skipped silently.
pub fn implicit_agent_mounts(home_dir: &Path) -> Vec<MountSpec> {
    let mut mounts = Vec::new();
    for rel in CLAUDE_CREDENTIAL_PATHS
        .iter()
        .chain(OPENCODE_CREDENTIAL_PATHS)
        .chain(CODEX_CREDENTIAL_PATHS)
    {
        let full = home_dir.join(rel);
        match fs::metadata(&full) {
            Ok(metadata) if metadata.is_file() => {}
            _ => continue,
        }
        mounts.push(MountSpec {
            source: full,
            target: format!("{}/{}", CONTAINER_HOME, rel),
            mode: MountMode::Rwcopy,
            snapshot_from: None,
        });
    }
    mounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_existing_files_become_rwcopy_mounts() -> Result<()> {
        let home = tempfile::tempdir()?;
        fs::write(home.path().join(".claude.json"), "{}")?;
        fs::create_dir_all(home.path().join(".codex"))?;
        fs::write(home.path().join(".codex/auth.json"), "{}")?;

        let mounts = implicit_agent_mounts(home.path());
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].source, home.path().join(".claude.json"));
        assert_eq!(mounts[0].target, "/home/cocoon/.claude.json");
        assert_eq!(mounts[0].mode, MountMode::Rwcopy);
        assert_eq!(mounts[1].target, "/home/cocoon/.codex/auth.json");
        Ok(())
    }

    #[test]
    fn test_missing_home_is_silent() {
        let mounts = implicit_agent_mounts(Path::new("/no/such/home"));
        assert!(mounts.is_empty());
    }

    #[test]
    fn test_directories_where_files_expected_are_skipped() -> Result<()> {
        let home = tempfile::tempdir()?;
        // A directory squatting on a credential file path is not a mount.
        fs::create_dir_all(home.path().join(".claude.json"))?;
        fs::write(home.path().join(".claude-oauth-credentials.json"), "{}")?;

        let mounts = implicit_agent_mounts(home.path());
        assert_eq!(mounts.len(), 1);
        assert_eq!(
            mounts[0].target,
            "/home/cocoon/.claude-oauth-credentials.json"
        );
        Ok(())
    }
}
