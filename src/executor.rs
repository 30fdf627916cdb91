//! Executor (spec §4.9).
//!
//! Single-threaded apply loop: pick the next `PENDING`/`RETRY_LATER`
//! transaction in journal order, run it, checkpoint. Rename handling and
//! the cross-filesystem rename fallback are grounded in the pack's
//! `ConaryLabs-Conary` `move_file_atomic` (EXDEV copy+fsync+delete
//! fallback, checked via `raw_os_error() == Some(libc::EXDEV)` since
//! `std::io::ErrorKind::CrossesDevices` isn't stable); content edits reuse
//! the teacher's `write.rs` atomic stage-then-rename contract. Retry
//! backoff follows the same file's lock-retry scheme
//! (`base * factor.pow(attempt)`, capped).

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::journal::Journal;
use crate::model::{TransactionKind, TransactionStatus};
use crate::scanner::split_lines_keep_terminator;
use crate::write;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub timeout_minutes: u64,
    pub retry_base_ms: u64,
    pub retry_factor: u32,
    pub dry_run: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            timeout_minutes: 30,
            retry_base_ms: 200,
            retry_factor: 2,
            dry_run: false,
        }
    }
}

fn backoff_duration(retry_count: u32, config: &ExecutorConfig) -> Duration {
    let exponent = retry_count.min(10);
    let millis = config.retry_base_ms.saturating_mul(config.retry_factor.pow(exponent) as u64);
    Duration::from_millis(millis.min(30_000))
}

/// Run the executor to completion (or until `cancel` reports true between
/// transactions). `root` is the scan root all transaction paths are
/// relative to.
pub fn execute(journal: &mut Journal, root: &Path, config: &ExecutorConfig, cancel: &dyn Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(config.timeout_minutes * 60);
    let mut completed_renames: Vec<(PathBuf, PathBuf)> = Vec::new();

    loop {
        if cancel() {
            break;
        }

        let ids: Vec<String> = journal
            .transactions()
            .iter()
            .filter(|t| matches!(t.status, TransactionStatus::Pending | TransactionStatus::RetryLater))
            .map(|t| t.id.clone())
            .collect();
        let Some(id) = ids.into_iter().next() else {
            break;
        };

        let (kind, retry_count) = {
            let tx = journal.transactions().iter().find(|t| t.id == id).unwrap();
            (tx.kind, tx.retry_count)
        };

        if retry_count > 0 {
            if Instant::now() >= deadline {
                let _ = journal.transition(&id, |t| {
                    t.transition_failed(format!("retry budget exhausted for {}", t.id))
                });
                continue;
            }
            std::thread::sleep(backoff_duration(retry_count - 1, config));
        }

        if config.dry_run {
            let _ = journal.transition(&id, |t| t.transition_skipped("dry run"));
            continue;
        }

        let _ = journal.transition(&id, |t| t.transition_in_progress());

        if kind.is_rename() {
            apply_rename(journal, &id, root, &mut completed_renames);
        } else if kind == TransactionKind::FileContentLine {
            apply_content_batch(journal, &id, root, &completed_renames);
        } else {
            // FILE_CONTENT_BINARY_MATCH is informational-only and already
            // COMPLETED at scan time; it never reaches this loop.
            let _ = journal.transition(&id, |t| t.transition_completed());
        }
    }
}

fn resolve_current_path(original: &Path, completed_renames: &[(PathBuf, PathBuf)]) -> PathBuf {
    let mut current = original.to_path_buf();
    for (old, new) in completed_renames {
        if let Ok(rest) = current.strip_prefix(old) {
            current = if rest.as_os_str().is_empty() {
                new.clone()
            } else {
                new.join(rest)
            };
        }
    }
    current
}

fn apply_rename(journal: &mut Journal, id: &str, root: &Path, completed_renames: &mut Vec<(PathBuf, PathBuf)>) {
    let (original_path, original_new_path) = {
        let tx = journal.transactions().iter().find(|t| t.id == id).unwrap();
        (tx.path.clone(), tx.new_path.clone().unwrap())
    };

    let resolved_current = resolve_current_path(&original_path, completed_renames);
    let resolved_dest = resolve_current_path(&original_new_path, completed_renames);
    let absolute_current = root.join(&resolved_current);
    let absolute_dest = root.join(&resolved_dest);

    if let (Ok(dest_meta), Ok(cur_meta)) = (
        fs::symlink_metadata(&absolute_dest),
        fs::symlink_metadata(&absolute_current),
    ) {
        if !same_entry(&dest_meta, &cur_meta) {
            let dest = absolute_dest.clone();
            let _ = journal.transition(id, |t| {
                t.transition_failed(
                    Error::CollisionAtExec {
                        path: t.path.clone(),
                        destination: dest.clone(),
                    }
                    .to_string(),
                )
            });
            return;
        }
    } else if absolute_dest.symlink_metadata().is_ok() {
        let dest = absolute_dest.clone();
        let _ = journal.transition(id, |t| {
            t.transition_failed(
                Error::CollisionAtExec {
                    path: t.path.clone(),
                    destination: dest.clone(),
                }
                .to_string(),
            )
        });
        return;
    }

    match rename_atomic(&absolute_current, &absolute_dest) {
        Ok(()) => {
            completed_renames.push((original_path, original_new_path));
            let _ = journal.transition(id, |t| t.transition_completed());
        }
        Err(e) if is_transient(&e) => {
            let _ = journal.transition(id, |t| t.transition_retry_later(e.to_string()));
        }
        Err(e) => {
            let _ = journal.transition(id, |t| t.transition_failed(e.to_string()));
        }
    }
}

#[cfg(unix)]
fn same_entry(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.ino() == b.ino() && a.dev() == b.dev()
}

#[cfg(not(unix))]
fn same_entry(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    // EXDEV: rename(2) across filesystems. `io_error_more`'s
    // `ErrorKind::CrossesDevices` isn't stable yet, so check the raw errno.
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &std::io::Error) -> bool {
    false
}

fn rename_atomic(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) && src.is_file() => {
            fs::copy(src, dst)?;
            File::open(dst)?.sync_all()?;
            fs::remove_file(src)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    // PermissionDenied is included because a momentary EACCES/EPERM (e.g. a
    // file briefly locked by another process) is a transient condition per
    // spec, not a permanent one; it earns a RETRY_LATER/backoff instead of
    // going straight to FAILED.
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::PermissionDenied
    )
}

/// Batch every still-runnable `FILE_CONTENT_LINE` transaction for the same
/// original path as `id`, apply them in one read-modify-write pass, and
/// checkpoint every constituent together (spec §4.9 content-edit
/// batching contract).
fn apply_content_batch(journal: &mut Journal, id: &str, root: &Path, completed_renames: &[(PathBuf, PathBuf)]) {
    let target_path = journal.transactions().iter().find(|t| t.id == id).unwrap().path.clone();

    let batch_ids: Vec<String> = journal
        .transactions()
        .iter()
        .filter(|t| {
            t.kind == TransactionKind::FileContentLine
                && t.path == target_path
                && matches!(t.status, TransactionStatus::Pending | TransactionStatus::InProgress)
        })
        .map(|t| t.id.clone())
        .collect();

    for batch_id in &batch_ids {
        if batch_id != id {
            let _ = journal.transition(batch_id, |t| t.transition_in_progress());
        }
    }

    let resolved = resolve_current_path(&target_path, completed_renames);
    let absolute = root.join(&resolved);

    let original_bytes = match fs::read(&absolute) {
        Ok(b) => b,
        Err(e) => {
            let transient = is_transient(&e);
            for batch_id in &batch_ids {
                let msg = e.to_string();
                if transient {
                    let _ = journal.transition(batch_id, |t| t.transition_retry_later(msg));
                } else {
                    let _ = journal.transition(batch_id, |t| t.transition_failed(msg));
                }
            }
            return;
        }
    };

    let mut lines: Vec<Vec<u8>> = split_lines_keep_terminator(&original_bytes)
        .into_iter()
        .map(|s| s.to_vec())
        .collect();

    let mut applied_ids = Vec::new();
    let mut stale_ids = Vec::new();

    for batch_id in &batch_ids {
        let tx = journal.transactions().iter().find(|t| &t.id == batch_id).unwrap();
        let line_number = tx.line_number.unwrap();
        let expected = tx.original_line_bytes.as_ref().unwrap().to_bytes().unwrap_or_default();
        let new_bytes = tx.new_line_bytes.as_ref().unwrap().to_bytes().unwrap_or_default();

        match lines.get(line_number.saturating_sub(1)) {
            Some(actual) if *actual == expected => {
                lines[line_number - 1] = new_bytes;
                applied_ids.push(batch_id.clone());
            }
            _ => stale_ids.push(batch_id.clone()),
        }
    }

    for stale_id in &stale_ids {
        let path = target_path.clone();
        let line = journal
            .transactions()
            .iter()
            .find(|t| &t.id == stale_id)
            .and_then(|t| t.line_number)
            .unwrap_or(0);
        let _ = journal.transition(stale_id, |t| {
            t.transition_failed(Error::StaleContent { path, line }.to_string())
        });
    }

    if applied_ids.is_empty() {
        return;
    }

    let mut new_bytes = Vec::with_capacity(original_bytes.len());
    for line in &lines {
        new_bytes.extend_from_slice(line);
    }

    match write::write_file(&absolute, &new_bytes) {
        Ok(()) => {
            for applied_id in &applied_ids {
                let _ = journal.transition(applied_id, |t| t.transition_completed());
            }
        }
        Err(e) => {
            for applied_id in &applied_ids {
                let msg = e.to_string();
                let _ = journal.transition(applied_id, |t| t.transition_retry_later(msg));
            }
        }
    }
}
