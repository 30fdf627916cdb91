//! Collision & Binary Match logs (spec §4.6, §4.8).
//!
//! Append-only, human-readable text logs written alongside the journal:
//! one line per collision the Planner skipped, one line per literal match
//! the Scanner found inside a binary file. Durability here only needs to
//! survive a clean shutdown, so this reuses the journal's write-to-temp
//! style for the final write rather than appending line-by-line.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{Transaction, TransactionKind};
use crate::planner::CollisionRecord;
use crate::write;

pub const COLLISIONS_LOG_FILENAME: &str = "collisions.log";
pub const BINARY_MATCHES_LOG_FILENAME: &str = "binary_matches.log";

/// Write the collision log for one run, overwriting any prior log.
pub fn write_collision_log(dir: &Path, collisions: &[CollisionRecord]) -> Result<PathBuf> {
    let path = dir.join(COLLISIONS_LOG_FILENAME);
    let mut body = String::new();
    for c in collisions {
        body.push_str(&format!(
            "{:?}\t{}\t->\t{}\n",
            c.kind,
            c.path.display(),
            c.destination.display()
        ));
    }
    write::write_file(&path, body.as_bytes())?;
    Ok(path)
}

/// Write the binary-match log for one run: one line per
/// `FILE_CONTENT_BINARY_MATCH` transaction, `path\tbyte_offset\tliteral`
/// (spec §6.4: "one record per file listing offsets and matched literals").
pub fn write_binary_matches_log(dir: &Path, transactions: &[Transaction]) -> Result<PathBuf> {
    let path = dir.join(BINARY_MATCHES_LOG_FILENAME);
    let mut body = String::new();
    for tx in transactions {
        if tx.kind != TransactionKind::FileContentBinaryMatch {
            continue;
        }
        let offset = tx.line_number.unwrap_or(0);
        let literal = tx
            .original_line_bytes
            .as_ref()
            .and_then(|b| b.to_bytes().ok())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        body.push_str(&format!("{}\t{}\t{}\n", tx.path.display(), offset, literal));
    }
    write::write_file(&path, body.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn writes_collision_log_lines() {
        let dir = tempdir().unwrap();
        let collisions = vec![CollisionRecord {
            path: PathBuf::from("a.txt"),
            destination: PathBuf::from("b.txt"),
            kind: TransactionKind::FileName,
        }];
        let path = write_collision_log(dir.path(), &collisions).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("a.txt"));
        assert!(text.contains("b.txt"));
    }

    #[test]
    fn writes_binary_match_log_lines() {
        let dir = tempdir().unwrap();
        let tx = Transaction::new_binary_match(PathBuf::from("a.bin"), 42, b"needle");
        let path = write_binary_matches_log(dir.path(), &[tx]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("a.bin"));
        assert!(text.contains("42"));
        assert!(text.contains("needle"));
    }
}
