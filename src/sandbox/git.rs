use crate::sandbox::mounts::{MountMode, MountSpec};
use crate::sandbox::CONTAINER_WORKSPACE;
use anyhow::{Context, Result, anyhow};
use log::trace;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A repository snapshot staged for mounting. The staging directory lives
/// only as long as this value; creation must finish (or fail) before it is
/// dropped.
pub struct GitMount {
    pub repo_name: String,
    pub repo_root: PathBuf,
    pub no_clean: bool,
    pub mount: MountSpec,
    _staging: TempDir,
}

/// Prepare a throwaway copy of the repository containing `start` and return
/// it as an rwcopy mount targeting the container workspace.
///
/// Clean mode clones committed content only; no-clean copies the working
/// tree, untracked files included. Either way the copy keeps only the
/// source repo's network remotes; local filesystem remotes would point at
/// paths that don't exist inside the sandbox.
pub fn prepare_git_mount(start: &str, no_clean: bool) -> Result<GitMount> {
    let repo_root = resolve_git_root(start)?;
    let repo_name = repo_root
        .file_name()
        .ok_or_else(|| {
            anyhow!("Failed to determine repository name for {:?}", repo_root)
        })?
        .to_string_lossy()
        .into_owned();
    let target = format!("{}/{}", CONTAINER_WORKSPACE, repo_name);

    let staging = tempfile::Builder::new()
        .prefix("cocoon-git-mount-")
        .tempdir()
        .context("Failed to create temp directory for git mount")?;
    let prepared = staging.path().join(&repo_name);

    if no_clean {
        copy_working_tree(&repo_root, &prepared)?;
    } else {
        clone_repo(&repo_root, &prepared)?;
    }
    sync_network_remotes(&repo_root, &prepared)?;
    trace!(
        "Prepared git mount for {} at {}",
        repo_root.display(),
        prepared.display()
    );

    Ok(GitMount {
        repo_name,
        repo_root: repo_root.clone(),
        no_clean,
        mount: MountSpec {
            source: prepared,
            target,
            mode: MountMode::Rwcopy,
            snapshot_from: Some(repo_root.to_string_lossy().into_owned()),
        },
        _staging: staging,
    })
}

/// Walk upward from `start` to the nearest directory containing `.git`.
pub fn resolve_git_root(start: &str) -> Result<PathBuf> {
    let start = if start.is_empty() { "." } else { start };
    let abs = std::path::absolute(start).map_err(|e| {
        anyhow!("Failed to resolve git start path {:?}: {}", start, e)
    })?;

    let mut current = abs.clone();
    if let Ok(metadata) = fs::metadata(&abs) {
        if !metadata.is_dir() {
            if let Some(parent) = abs.parent() {
                current = parent.to_path_buf();
            }
        }
    }

    loop {
        if current.join(".git").exists() {
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    Err(anyhow!(
        "No git repository root found from {:?}",
        abs.display().to_string()
    ))
}

fn clone_repo(src: &Path, dst: &Path) -> Result<()> {
    let output = Command::new("git")
        .arg("clone")
        .arg("--local")
        .arg("--no-hardlinks")
        .arg(src)
        .arg(dst)
        .output()
        .context("Failed to run git clone")?;
    if !output.status.success() {
        return Err(anyhow!(
            "Failed to prepare clean git mount from {:?}: {}",
            src.display().to_string(),
            combined_output(&output.stdout, &output.stderr)
        ));
    }
    Ok(())
}

fn copy_working_tree(src: &Path, dst: &Path) -> Result<()> {
    let output = Command::new("cp")
        .arg("-a")
        .arg(src)
        .arg(dst)
        .output()
        .context("Failed to run cp")?;
    if !output.status.success() {
        return Err(anyhow!(
            "Failed to prepare no-clean git mount from {:?}: {}",
            src.display().to_string(),
            combined_output(&output.stdout, &output.stderr)
        ));
    }
    if !dst.join(".git").exists() {
        return Err(anyhow!(
            "Failed to prepare no-clean git mount from {:?}: missing .git in {:?}",
            src.display().to_string(),
            dst.display().to_string()
        ));
    }
    Ok(())
}

/// Carry the source repo's network remotes over to the prepared copy and
/// drop everything else.
fn sync_network_remotes(src_repo: &Path, dst_repo: &Path) -> Result<()> {
    let src_remotes = list_remotes(src_repo).map_err(|e| {
        anyhow!(
            "Failed to read remotes from source repo {:?}: {}",
            src_repo.display().to_string(),
            e
        )
    })?;
    let keep: BTreeMap<&String, &String> = src_remotes
        .iter()
        .filter(|(_, url)| is_network_remote_url(url))
        .collect();

    let dst_remotes = list_remotes(dst_repo).map_err(|e| {
        anyhow!(
            "Failed to read remotes from prepared repo {:?}: {}",
            dst_repo.display().to_string(),
            e
        )
    })?;
    for name in dst_remotes.keys() {
        run_git(dst_repo, &["remote", "remove", name.as_str()])?;
    }
    for (name, url) in keep {
        run_git(dst_repo, &["remote", "add", name.as_str(), url.as_str()])?;
    }
    Ok(())
}

fn list_remotes(repo: &Path) -> Result<BTreeMap<String, String>> {
    let names = run_git(repo, &["remote"])?;
    let mut remotes = BTreeMap::new();
    for name in names.split_whitespace() {
        let url = run_git(repo, &["remote", "get-url", name])?;
        remotes.insert(name.to_string(), url.trim().to_string());
    }
    Ok(remotes)
}

/// True for remotes the sandbox could still reach over the network:
/// http(s), ssh, and scp-like `user@host:path` URLs.
pub fn is_network_remote_url(url: &str) -> bool {
    if url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("ssh://")
    {
        return true;
    }
    if url.starts_with("file://") {
        return false;
    }
    match (url.find('@'), url.find(':')) {
        (Some(at), Some(colon)) => at > 0 && colon > at + 1,
        _ => false,
    }
}

fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .context("Failed to run git")?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            combined_output(&output.stdout, &output.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_git_root_walks_upward() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = dir.path().join("project");
        let nested = repo.join("src").join("deep");
        fs::create_dir_all(&nested)?;
        fs::create_dir_all(repo.join(".git"))?;

        let root =
            resolve_git_root(&nested.to_string_lossy())?;
        assert_eq!(root.canonicalize()?, repo.canonicalize()?);
        Ok(())
    }

    #[test]
    fn test_resolve_git_root_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = dir.path().join("project");
        fs::create_dir_all(repo.join(".git"))?;
        let file = repo.join("README.md");
        fs::write(&file, "readme")?;

        let root = resolve_git_root(&file.to_string_lossy())?;
        assert_eq!(root.canonicalize()?, repo.canonicalize()?);
        Ok(())
    }

    #[test]
    fn test_resolve_git_root_not_found() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let plain = dir.path().join("plain");
        fs::create_dir_all(&plain)?;
        let err = resolve_git_root(&plain.to_string_lossy())
            .expect_err("expected no git root");
        assert!(err.to_string().contains("No git repository root found"));
        Ok(())
    }

    #[test]
    fn test_is_network_remote_url() {
        assert!(is_network_remote_url("https://github.com/acme/widget.git"));
        assert!(is_network_remote_url("http://git.internal/repo.git"));
        assert!(is_network_remote_url("ssh://git@github.com/acme/widget.git"));
        assert!(is_network_remote_url("git@github.com:acme/widget.git"));

        assert!(!is_network_remote_url("file:///home/user/repo"));
        assert!(!is_network_remote_url("/home/user/repo"));
        assert!(!is_network_remote_url("../sibling-repo"));
        assert!(!is_network_remote_url("@host:path"));
        assert!(!is_network_remote_url("user@:path"));
    }
}
