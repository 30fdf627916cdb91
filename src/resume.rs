//! Resume Controller (spec §4.10).
//!
//! Reconciles an existing journal against live filesystem state on
//! startup: transactions left `IN_PROGRESS` by a prior crash are probed
//! for whether their effect actually landed before the crash, and
//! `RETRY_LATER` transactions have their backoff reset so they run
//! immediately rather than waiting out a stale delay. Grounded in the
//! pack's `ConaryLabs-Conary` transaction log, whose `should_roll_forward`
//! makes the same "did this already happen" check when resuming a
//! journal after an unclean shutdown.

use std::path::Path;

use crate::journal::Journal;
use crate::model::{Transaction, TransactionKind, TransactionStatus};

/// Reconcile every non-terminal transaction in `journal` against the live
/// tree rooted at `root`, checkpointing the journal once at the end.
pub fn reconcile(journal: &mut Journal, root: &Path) -> crate::error::Result<()> {
    let ids: Vec<String> = journal
        .transactions()
        .iter()
        .filter(|t| matches!(t.status, TransactionStatus::InProgress | TransactionStatus::RetryLater))
        .map(|t| t.id.clone())
        .collect();

    for id in ids {
        let tx = journal.transactions().iter().find(|t| t.id == id).unwrap().clone();
        match tx.status {
            TransactionStatus::InProgress => {
                if appears_applied(&tx, root) {
                    journal.transition(&id, |t| t.transition_completed())?;
                } else {
                    journal.transition(&id, |t| t.transition_pending())?;
                }
            }
            TransactionStatus::RetryLater => {
                journal.transition(&id, |t| t.transition_pending())?;
            }
            _ => {}
        }
    }

    Ok(())
}

fn appears_applied(tx: &Transaction, root: &Path) -> bool {
    match tx.kind {
        TransactionKind::FileName | TransactionKind::FolderName | TransactionKind::SymlinkName => {
            let Some(new_path) = &tx.new_path else { return false };
            root.join(new_path).symlink_metadata().is_ok()
        }
        TransactionKind::FileContentLine => {
            let Some(line_number) = tx.line_number else { return false };
            let Some(expected) = tx.new_line_bytes.as_ref().and_then(|b| b.to_bytes().ok()) else {
                return false;
            };
            let absolute = root.join(&tx.path);
            let Ok(bytes) = std::fs::read(&absolute) else { return false };
            let lines = crate::scanner::split_lines_keep_terminator(&bytes);
            matches!(lines.get(line_number.saturating_sub(1)), Some(actual) if **actual == expected[..])
        }
        TransactionKind::FileContentBinaryMatch => true,
    }
}
