//! Atomic content writer, grounded in this file's own prior
//! stage-then-commit shape: write to a `NamedTempFile` beside the target,
//! copy the original file's permissions onto it, fsync, then atomically
//! rename over the target. Used by the Executor for content-edit batches
//! (spec §4.9); renames go through `executor::rename_atomic` instead since
//! they move the whole entry rather than rewriting its bytes.

use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A staged file write, ready to be committed.
pub struct StagedEntry {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedEntry {
    /// Commit the staged file (atomic rename).
    pub fn commit(self) -> Result<()> {
        self.temp.persist(&self.target)?;
        Ok(())
    }
}

/// Stage `data` for an atomic write to `path`: a temp file in the same
/// directory, carrying over `path`'s existing permissions if it exists.
pub fn stage_file(path: &Path, data: &[u8]) -> Result<StagedEntry> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions()).ok();
    }

    if !data.is_empty() {
        temp.write_all(data)?;
    }
    temp.as_file().sync_all()?;

    Ok(StagedEntry {
        temp,
        target: path.to_path_buf(),
    })
}

/// Write `data` to `path` atomically, preserving existing permissions.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    stage_file(path, data)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_content_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();
        write_file(&path, b"new content").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new content");
    }

    #[test]
    fn preserves_permissions_across_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
            write_file(&path, b"new").unwrap();
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o640);
        }
    }
}
