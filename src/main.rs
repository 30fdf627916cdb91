mod canon;
mod cli;
mod config;
mod encoding;
mod error;
mod executor;
mod journal;
mod logs;
mod matcher;
mod model;
mod planner;
mod replacement_map;
mod reporter;
mod resume;
mod run;
mod scanner;
mod walker;
mod write;

use std::collections::HashSet;
use std::process::ExitCode;

use clap::Parser;
use schemars::schema_for;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ModeArg, RunArgs};
use config::RunConfig;
use model::RunMode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli {
        Cli::Schema => {
            print_schema();
            ExitCode::from(0)
        }
        Cli::Run(args) => {
            init_logging(args.verbose, args.quiet);
            run_command(args)
        }
    }
}

/// Print JSON Schema for the journal/transaction format (spec §6.3
/// `refold schema`).
fn print_schema() {
    let schema = schema_for!(model::Journal);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run_command(args: RunArgs) -> ExitCode {
    let journal_path = args
        .journal_path
        .clone()
        .unwrap_or_else(|| RunConfig::journal_path_or_default(&args.root));

    let config = RunConfig {
        scan_root: args.root,
        mapping_path: args.mapping,
        mode: mode_from_arg(args.mode),
        skip_scan: args.skip_scan,
        excluded_dirs: args.exclude.into_iter().collect::<HashSet<_>>(),
        extensions: args.ext.into_iter().collect::<HashSet<_>>(),
        use_gitignore: args.use_gitignore,
        custom_ignore_path: args.ignore_file,
        ignore_symlinks: args.ignore_symlinks,
        process_symlink_names: args.process_symlink_names,
        skip_file_renaming: args.skip_file_renaming,
        skip_folder_renaming: args.skip_folder_renaming,
        skip_content: args.skip_content,
        timeout_minutes: args.timeout_minutes,
        verbose: args.verbose,
        quiet: args.quiet,
        journal_path,
        max_content_scan_bytes: args.max_content_scan_bytes,
    };

    match run::run(&config) {
        Ok(report) => {
            if !config.quiet {
                report.print_human();
            } else if report.has_failures() {
                report.print_json();
            }
            ExitCode::from(report.exit_code() as u8)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn mode_from_arg(mode: ModeArg) -> RunMode {
    match mode {
        ModeArg::DryRun => RunMode::DryRun,
        ModeArg::Force => RunMode::Force,
        ModeArg::Interactive => RunMode::Interactive,
        ModeArg::Resume => RunMode::Resume,
    }
}
