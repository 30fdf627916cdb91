use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// refold: surgical, transactional find-and-replace across file names,
/// folder names, and text content in a directory tree.
#[derive(Parser, Debug)]
#[command(
    name = "refold",
    author,
    version,
    about,
    max_term_width = 100,
    after_help = "\
EXIT STATUS:
  0  Success (no FAILED transactions)
  1  One or more transactions ended FAILED
  2  Error (invalid arguments, setup failure, journal busy)"
)]
pub enum Cli {
    /// Run (or resume) a replacement pass over a directory tree.
    #[command(visible_alias = "r")]
    Run(RunArgs),
    /// Print the JSON Schema for the journal/transaction format.
    #[command(visible_alias = "s")]
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    DryRun,
    Force,
    Interactive,
    Resume,
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory to process.
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Path to the replacement mapping document.
    #[arg(long, value_name = "FILE")]
    pub mapping: PathBuf,

    /// Execution mode.
    #[arg(long, value_enum, default_value = "dry-run")]
    pub mode: ModeArg,

    /// Reuse the existing journal unchanged instead of re-scanning.
    #[arg(long = "skip-scan")]
    pub skip_scan: bool,

    /// Directory names to skip entirely (repeatable).
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// File extensions eligible for content scanning (repeatable; empty
    /// means the built-in default text set).
    #[arg(long = "ext", value_name = "EXT")]
    pub ext: Vec<String>,

    /// Honor .gitignore / .git/info/exclude / global gitignore.
    #[arg(long = "use-gitignore", default_value_t = true)]
    pub use_gitignore: bool,

    /// Additional custom ignore-file name to honor (e.g. ".refoldignore").
    #[arg(long = "ignore-file", value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,

    /// Do not descend into or rename symlinked entries.
    #[arg(long = "ignore-symlinks")]
    pub ignore_symlinks: bool,

    /// Also rename symlinks themselves when their name matches a rule.
    #[arg(long = "process-symlink-names", default_value_t = true)]
    pub process_symlink_names: bool,

    /// Skip planning file renames.
    #[arg(long = "skip-file-renaming")]
    pub skip_file_renaming: bool,

    /// Skip planning folder renames.
    #[arg(long = "skip-folder-renaming")]
    pub skip_folder_renaming: bool,

    /// Skip planning content edits.
    #[arg(long = "skip-content")]
    pub skip_content: bool,

    /// Global deadline, in minutes, driving per-transaction retry budgets.
    #[arg(long = "timeout-minutes", default_value_t = 30)]
    pub timeout_minutes: u64,

    /// Verbose (debug-level) logging.
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-error logging.
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Override the journal file path (default: `<root>/planned_transactions.json`).
    #[arg(long = "journal-path", value_name = "FILE")]
    pub journal_path: Option<PathBuf>,

    /// Maximum bytes read from a file when scanning its content (larger
    /// files get name-only treatment).
    #[arg(long = "max-content-scan-bytes", default_value_t = 10 * 1024 * 1024)]
    pub max_content_scan_bytes: u64,
}
