//! Reporter (SPEC_FULL §2 A3).
//!
//! Human and JSON summaries of a completed run: counts by terminal status,
//! failed-transaction detail, and the paths to the collision/binary logs.
//! Adapted from the teacher's `Report`/`FileResult` print_human/print_json
//! split, generalized from per-file results to per-transaction ones.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::journal::Journal;
use crate::model::{Transaction, TransactionStatus};
use crate::planner::CollisionRecord;

/// One FAILED transaction's user-facing detail (spec §7 "User-visible
/// reporting").
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub id: String,
    pub kind: String,
    pub path: PathBuf,
    pub error: String,
}

/// Overall run summary: counts by terminal status, failures, and log
/// paths. Built from the journal after the Executor loop ends.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub counts: std::collections::BTreeMap<&'static str, usize>,
    pub failures: Vec<FailureDetail>,
    pub collisions: usize,
    pub collision_log_path: Option<PathBuf>,
    pub binary_match_log_path: Option<PathBuf>,
    pub dry_run: bool,
    pub duration_ms: u128,
}

impl Report {
    pub fn build(journal: &Journal, collisions: &[CollisionRecord], dry_run: bool, duration: Duration) -> Self {
        let failures = journal
            .transactions()
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .map(failure_detail)
            .collect();

        Report {
            counts: journal.counts_by_status(),
            failures,
            collisions: collisions.len(),
            collision_log_path: None,
            binary_match_log_path: None,
            dry_run,
            duration_ms: duration.as_millis(),
        }
    }

    pub fn with_log_paths(mut self, collision_log: Option<PathBuf>, binary_log: Option<PathBuf>) -> Self {
        self.collision_log_path = collision_log;
        self.binary_match_log_path = binary_log;
        self
    }

    /// True if the run should report non-zero: any transaction ended
    /// FAILED (spec §7 "A non-zero overall exit is reported if any
    /// transaction ends in FAILED").
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn print_human(&self) {
        if self.dry_run {
            println!("DRY RUN - no files were written.");
        }
        print!("{}", self.counts_line());
        println!(" in {} ms", self.duration_ms);

        if self.collisions > 0 {
            println!(
                "{} collision(s) skipped; see {}",
                self.collisions,
                self.collision_log_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<no collision log written>".to_string())
            );
        }

        if let Some(path) = &self.binary_match_log_path {
            println!("binary matches logged to {}", path.display());
        }

        for failure in &self.failures {
            eprintln!("  FAILED {} [{}] {}: {}", failure.id, failure.kind, failure.path.display(), failure.error);
        }
    }

    fn counts_line(&self) -> String {
        let mut parts = Vec::new();
        for (status, count) in &self.counts {
            parts.push(format!("{status}={count}"));
        }
        parts.join(" ")
    }

    pub fn print_json(&self) {
        println!("{}", serde_json::to_string(self).unwrap());
    }

    /// Exit status per spec §6.3's CLI surface note: 0 success, 1 any
    /// FAILED transaction, 2 is reserved for setup/config errors raised
    /// before a journal exists (handled in `main`, not here).
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

fn failure_detail(t: &Transaction) -> FailureDetail {
    FailureDetail {
        id: t.id.clone(),
        kind: format!("{:?}", t.kind),
        path: t.path.clone(),
        error: t.error.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionKind;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn counts_and_failures_reflect_the_journal() {
        let dir = tempdir().unwrap();
        let mut journal = Journal::open(&dir.path().join("planned_transactions.json")).unwrap();
        let mut tx_ok = Transaction::new_rename(TransactionKind::FileName, PathBuf::from("a"), PathBuf::from("b"));
        tx_ok.transition_completed();
        let mut tx_fail = Transaction::new_rename(TransactionKind::FileName, PathBuf::from("c"), PathBuf::from("d"));
        tx_fail.transition_failed("disk full");
        journal.install_plan(vec![tx_ok, tx_fail]).unwrap();

        let report = Report::build(&journal, &[], false, Duration::from_millis(5));
        assert_eq!(report.counts.get("COMPLETED"), Some(&1));
        assert_eq!(report.counts.get("FAILED"), Some(&1));
        assert!(report.has_failures());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failures[0].error, "disk full");
    }

    #[test]
    fn a_clean_run_exits_zero() {
        let dir = tempdir().unwrap();
        let mut journal = Journal::open(&dir.path().join("planned_transactions.json")).unwrap();
        let mut tx = Transaction::new_rename(TransactionKind::FileName, PathBuf::from("a"), PathBuf::from("b"));
        tx.transition_completed();
        journal.install_plan(vec![tx]).unwrap();

        let report = Report::build(&journal, &[], false, Duration::from_millis(1));
        assert!(!report.has_failures());
        assert_eq!(report.exit_code(), 0);
    }
}
