//! Run orchestration: wires the Walker, Scanner, Planner, Journal,
//! Executor, Resume Controller, and side-channel logs into the four CLI
//! modes (dry-run, force, interactive, resume) (spec §2 data flow, §6.3).
//!
//! Generalizes the teacher's `engine::execute`, which drove a single
//! `Pipeline` through one file-processing loop; here the loop is the
//! multi-stage pipeline the spec's component table describes.

use std::io::Write as _;
use std::time::Instant;

use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::executor::{self, ExecutorConfig};
use crate::journal::Journal;
use crate::logs;
use crate::model::RunMode;
use crate::planner;
use crate::replacement_map::ReplacementMap;
use crate::reporter::Report;
use crate::resume;
use crate::scanner::{self, ScanConfig};
use crate::walker::{self, WalkerConfig};

pub fn run(config: &RunConfig) -> Result<Report> {
    config.validate()?;
    let start = Instant::now();

    let mut journal = Journal::open(&config.journal_path)?;
    let mut collisions = Vec::new();

    if config.mode == RunMode::Resume {
        info!(path = %config.journal_path.display(), "resuming from existing journal");
        resume::reconcile(&mut journal, &config.scan_root)?;
    } else if !config.skip_scan {
        let rules = ReplacementMap::load(&config.mapping_path)?;
        info!(rules = rules.len(), "loaded replacement map");

        let walker_config = WalkerConfig {
            excluded_dirs: config.excluded_dirs.clone(),
            use_gitignore: config.use_gitignore,
            custom_ignore_path: config.custom_ignore_path.clone(),
            ignore_symlinks: config.ignore_symlinks,
            max_content_scan_bytes: config.max_content_scan_bytes,
        };
        let entries = walker::walk(&config.scan_root, &walker_config)?;
        info!(entries = entries.len(), "walked scan root");

        let scan_config = ScanConfig {
            skip_file_renaming: config.skip_file_renaming,
            skip_folder_renaming: config.skip_folder_renaming,
            skip_content: config.skip_content,
            process_symlink_names: config.process_symlink_names,
            extensions: config.extensions.clone(),
        };
        let planned = scanner::scan(&entries, &rules, &scan_config)?;
        info!(transactions = planned.len(), "scanned planned transactions");

        let (ordered, plan_collisions) = planner::plan(planned, &config.scan_root);
        collisions = plan_collisions;
        journal.install_plan(ordered)?;
    } else {
        info!("--skip-scan: reusing existing journal unchanged");
    }

    if config.mode == RunMode::Interactive && !collisions.is_empty() {
        if !confirm_collisions(collisions.len()) {
            journal.close()?;
            return Err(crate::error::Error::Validation(
                "run aborted by operator: unresolved collisions".to_string(),
            ));
        }
    }

    let executor_config = ExecutorConfig {
        timeout_minutes: config.timeout_minutes,
        dry_run: config.mode == RunMode::DryRun,
        ..ExecutorConfig::default()
    };
    executor::execute(&mut journal, &config.scan_root, &executor_config, &|| false);

    let collision_log = if !collisions.is_empty() {
        Some(logs::write_collision_log(&config.scan_root, &collisions)?)
    } else {
        None
    };
    let binary_log = if journal
        .transactions()
        .iter()
        .any(|t| t.kind == crate::model::TransactionKind::FileContentBinaryMatch)
    {
        Some(logs::write_binary_matches_log(&config.scan_root, journal.transactions())?)
    } else {
        None
    };

    let report = Report::build(&journal, &collisions, executor_config.dry_run, start.elapsed())
        .with_log_paths(collision_log, binary_log);

    journal.close()?;
    Ok(report)
}

fn confirm_collisions(count: usize) -> bool {
    eprint!("{count} collision(s) detected; continue and skip them? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
