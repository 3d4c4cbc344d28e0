use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Copy a single regular file, carrying the source's permission bits over to
/// the destination.
pub fn copy_file_preserving_mode(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::metadata(src).context(format!(
        "Failed to stat source file {}",
        src.display()
    ))?;
    fs::copy(src, dst).context(format!(
        "Failed to copy {} to {}",
        src.display(),
        dst.display()
    ))?;
    fs::set_permissions(dst, metadata.permissions()).context(format!(
        "Failed to set permissions on {}",
        dst.display()
    ))?;
    Ok(())
}

/// Write a file by staging the contents next to the target and renaming into
/// place, so readers never observe a half-written file. Parent directories
/// are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .context(format!("No parent directory for {}", path.display()))?;
    fs::create_dir_all(dir).context(format!(
        "Failed to create directory {}",
        dir.display()
    ))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).context(format!(
        "Failed to create temporary file in {}",
        dir.display()
    ))?;
    use std::io::Write;
    tmp.write_all(contents).context(format!(
        "Failed to write temporary file for {}",
        path.display()
    ))?;
    tmp.persist(path)
        .context(format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_copy_file_preserving_mode() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("script.sh");
        let dst = dir.path().join("copy.sh");
        fs::write(&src, "#!/bin/sh\n")?;
        fs::set_permissions(&src, fs::Permissions::from_mode(0o755))?;

        copy_file_preserving_mode(&src, &dst)?;

        assert_eq!(fs::read_to_string(&dst)?, "#!/bin/sh\n");
        let mode = fs::metadata(&dst)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        Ok(())
    }

    #[test]
    fn test_write_atomic_creates_parents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a").join("b").join("state.jsonl");
        write_atomic(&path, b"line\n")?;
        assert_eq!(fs::read_to_string(&path)?, "line\n");

        write_atomic(&path, b"replaced\n")?;
        assert_eq!(fs::read_to_string(&path)?, "replaced\n");
        Ok(())
    }
}
