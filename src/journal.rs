//! Journal (spec §4.7).
//!
//! Durable, single-owner transaction store. Checkpoints are
//! write-to-temp + fsync + atomic rename, grounded in the teacher's
//! `write.rs` `stage_file`/`commit` (`tempfile::NamedTempFile::persist`).
//! The advisory single-owner lock is grounded in the pack's
//! `ConaryLabs-Conary` transaction journal's `try_lock_exclusive` use of
//! `fs2`.

use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::{Journal as JournalDoc, Transaction, TransactionStatus, JOURNAL_VERSION};

pub const DEFAULT_JOURNAL_FILENAME: &str = "planned_transactions.json";

fn lock_path_for(journal_path: &Path) -> PathBuf {
    let mut lock_path = journal_path.as_os_str().to_owned();
    lock_path.push(".lock");
    PathBuf::from(lock_path)
}

/// An open, locked journal file. Dropping it releases the advisory lock.
pub struct Journal {
    path: PathBuf,
    lock_file: File,
    doc: JournalDoc,
}

impl Journal {
    /// Open (creating if absent) the journal at `path`, acquiring the
    /// advisory single-owner lock. Fails with [`Error::JournalBusy`] if
    /// another process holds it, and with [`Error::JournalVersion`] if the
    /// on-disk schema is newer than this binary understands.
    pub fn open(path: &Path) -> Result<Self> {
        let lock_file = File::create(lock_path_for(path))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| Error::JournalBusy(path.to_path_buf()))?;

        let doc = if path.exists() {
            let text = fs::read_to_string(path)?;
            let doc: JournalDoc = serde_json::from_str(&text)?;
            if doc.version > JOURNAL_VERSION {
                return Err(Error::JournalVersion {
                    found: doc.version,
                    supported: JOURNAL_VERSION,
                });
            }
            doc
        } else {
            JournalDoc::new()
        };

        Ok(Journal {
            path: path.to_path_buf(),
            lock_file,
            doc,
        })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.doc.transactions
    }

    pub fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.doc.transactions
    }

    pub fn counts_by_status(&self) -> std::collections::BTreeMap<&'static str, usize> {
        self.doc.counts_by_status()
    }

    /// Replace the transaction list wholesale (end-of-planning checkpoint,
    /// spec §4.7 checkpoint trigger (a)) and persist immediately.
    pub fn install_plan(&mut self, transactions: Vec<Transaction>) -> Result<()> {
        self.doc.transactions = transactions;
        self.checkpoint()
    }

    /// Look up a transaction by id for in-place mutation, persisting a
    /// checkpoint after `f` runs (spec §4.7 checkpoint trigger (b): every
    /// status transition).
    pub fn transition<F>(&mut self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Transaction),
    {
        if let Some(tx) = self.doc.transactions.iter_mut().find(|t| t.id == id) {
            f(tx);
        }
        self.checkpoint()
    }

    pub fn next_runnable_index(&self) -> Option<usize> {
        self.doc.transactions.iter().position(|t| {
            matches!(t.status, TransactionStatus::Pending | TransactionStatus::RetryLater)
        })
    }

    /// Durable checkpoint: write-to-temp, fsync, atomic rename over the
    /// journal path.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.doc.last_checkpoint_seq += 1;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(parent)?;
        let json = serde_json::to_vec_pretty(&self.doc)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;

        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    /// Graceful-shutdown checkpoint (spec §4.7 checkpoint trigger (c)).
    pub fn close(mut self) -> Result<()> {
        self.checkpoint()?;
        FileExt::unlock(&self.lock_file).ok();
        Ok(())
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionKind;
    use tempfile::tempdir;

    #[test]
    fn round_trips_transactions_through_a_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOURNAL_FILENAME);

        {
            let mut journal = Journal::open(&path).unwrap();
            let tx = Transaction::new_rename(
                TransactionKind::FileName,
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
            );
            journal.install_plan(vec![tx]).unwrap();
        }

        let reopened = Journal::open(&path).unwrap();
        assert_eq!(reopened.transactions().len(), 1);
    }

    #[test]
    fn second_open_is_busy_while_first_is_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOURNAL_FILENAME);
        let _first = Journal::open(&path).unwrap();
        let second = Journal::open(&path);
        assert!(matches!(second, Err(Error::JournalBusy(_))));
    }

    #[test]
    fn rejects_newer_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOURNAL_FILENAME);
        let future = serde_json::json!({
            "version": JOURNAL_VERSION + 1,
            "last_checkpoint_seq": 0,
            "transactions": [],
        });
        fs::write(&path, serde_json::to_vec(&future).unwrap()).unwrap();

        let result = Journal::open(&path);
        assert!(matches!(result, Err(Error::JournalVersion { .. })));
    }

    #[test]
    fn transition_updates_status_and_checkpoints() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOURNAL_FILENAME);
        let mut journal = Journal::open(&path).unwrap();
        let tx = Transaction::new_rename(
            TransactionKind::FileName,
            PathBuf::from("a.txt"),
            PathBuf::from("b.txt"),
        );
        let id = tx.id.clone();
        journal.install_plan(vec![tx]).unwrap();

        journal.transition(&id, |t| t.transition_completed()).unwrap();
        assert_eq!(journal.transactions()[0].status, TransactionStatus::Completed);

        let reloaded_text = fs::read_to_string(&path).unwrap();
        assert!(reloaded_text.contains("COMPLETED"));
    }
}
