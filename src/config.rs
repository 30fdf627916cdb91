//! Run configuration (spec §6.3).
//!
//! Resolves and validates the CLI surface into a plain struct the rest of
//! the pipeline consumes; no component below this reads `clap` types
//! directly, mirroring the teacher's `cli::ApplyArgs` → `model::Pipeline`
//! boundary in `main.rs`.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::journal::DEFAULT_JOURNAL_FILENAME;
use crate::model::RunMode;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scan_root: PathBuf,
    pub mapping_path: PathBuf,
    pub mode: RunMode,
    pub skip_scan: bool,
    pub excluded_dirs: HashSet<String>,
    pub extensions: HashSet<String>,
    pub use_gitignore: bool,
    pub custom_ignore_path: Option<PathBuf>,
    pub ignore_symlinks: bool,
    pub process_symlink_names: bool,
    pub skip_file_renaming: bool,
    pub skip_folder_renaming: bool,
    pub skip_content: bool,
    pub timeout_minutes: u64,
    pub verbose: bool,
    pub quiet: bool,
    pub journal_path: PathBuf,
    pub max_content_scan_bytes: u64,
}

impl RunConfig {
    /// Validate cross-field constraints the CLI parser itself can't
    /// express (e.g. clap's `conflicts_with` only covers pairs).
    pub fn validate(&self) -> Result<()> {
        if !self.scan_root.is_dir() {
            return Err(Error::ScanRootNotADirectory(self.scan_root.clone()));
        }
        if self.verbose && self.quiet {
            return Err(Error::Validation("--verbose and --quiet are mutually exclusive".to_string()));
        }
        if self.skip_scan && self.mode == RunMode::Resume {
            return Err(Error::Validation("--skip-scan has no effect in resume mode".to_string()));
        }
        Ok(())
    }

    pub fn journal_path_or_default(root: &PathBuf) -> PathBuf {
        root.join(DEFAULT_JOURNAL_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn base(root: PathBuf) -> RunConfig {
        RunConfig {
            scan_root: root.clone(),
            mapping_path: root.join("mapping.json"),
            mode: RunMode::DryRun,
            skip_scan: false,
            excluded_dirs: HashSet::new(),
            extensions: HashSet::new(),
            use_gitignore: true,
            custom_ignore_path: None,
            ignore_symlinks: false,
            process_symlink_names: true,
            skip_file_renaming: false,
            skip_folder_renaming: false,
            skip_content: false,
            timeout_minutes: 30,
            verbose: false,
            quiet: false,
            journal_path: RunConfig::journal_path_or_default(&root),
            max_content_scan_bytes: 10 * 1024 * 1024,
        }
    }

    #[test]
    fn rejects_nonexistent_scan_root() {
        let config = base(PathBuf::from("/does/not/exist/at/all"));
        assert!(matches!(config.validate(), Err(Error::ScanRootNotADirectory(_))));
    }

    #[test]
    fn rejects_verbose_and_quiet_together() {
        let dir = tempdir().unwrap();
        let mut config = base(dir.path().to_path_buf());
        config.verbose = true;
        config.quiet = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_config() {
        let dir = tempdir().unwrap();
        let config = base(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }
}
