//! tdiff CLI
//!
//! Compares the truth records of two simulation output files and reports
//! the first record that differs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{debug, info};

use tdiff_core::Error;
use tdiff_parsers::logging::{init_with_config, TracingConfig};
use tdiff_parsers::ParseOptions;
use tdiff_tools::compare::{record_bound, DEFAULT_BRANCH, DEFAULT_TREE};
use tdiff_tools::report::{render_counts, render_diff, render_files, render_json};
use tdiff_tools::{compare, find_branches, validate_paths, CompareConfig, OutputFormat};

/// tdiff - find the first differing truth record in two simulation outputs
#[derive(Parser)]
#[command(name = "tdiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// First data file
    fpath1: PathBuf,

    /// Second data file
    fpath2: PathBuf,

    /// Tree holding the truth branch
    #[arg(long, default_value = DEFAULT_TREE)]
    tree: String,

    /// Branch to compare
    #[arg(long, default_value = DEFAULT_BRANCH)]
    branch: String,

    /// Upper bound on compared records
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=255))]
    max_records: u64,

    /// Report format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Verify basket checksums while reading
    #[arg(long)]
    verify_checksums: bool,

    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn compare_config(&self) -> CompareConfig {
        CompareConfig {
            tree: self.tree.clone(),
            branch: self.branch.clone(),
            max_records: self.max_records,
        }
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            verify_checksums: self.verify_checksums,
            ..ParseOptions::default()
        }
    }
}

fn setup_logging(verbosity: u8) {
    init_with_config(TracingConfig::from_verbosity(verbosity));
}

fn report_errors(errors: &[Error]) {
    for error in errors {
        eprintln!("Error: {}", error);
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let paths = match validate_paths(&cli.fpath1, &cli.fpath2) {
        Ok(paths) => paths,
        Err(errors) => {
            report_errors(&errors);
            eprintln!("{}", Cli::command().render_usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.format == OutputFormat::Text {
        println!("{}", render_files(&paths.file1, &paths.file2));
    }

    let config = cli.compare_config();
    let (mut input1, mut input2) =
        match find_branches(&paths, &config.tree, &config.branch, &cli.parse_options()) {
            Ok(inputs) => inputs,
            Err(errors) => {
                report_errors(&errors);
                return Ok(ExitCode::FAILURE);
            }
        };

    info!(tree = %config.tree, branch = %config.branch, "Inputs ready");

    if cli.format == OutputFormat::Text {
        let (records1, records2) = (input1.entries(), input2.entries());
        println!(
            "{}",
            render_counts(records1, records2, record_bound(records1, records2, config.max_records))
        );
    }

    let comparison = compare(&mut input1, &mut input2, config.max_records)
        .context("Comparison aborted")?;

    match cli.format {
        OutputFormat::Text => {
            if let Some(first) = &comparison.first_diff {
                println!("{}", render_diff(first));
            }
        }
        OutputFormat::Json => {
            let json = render_json(&paths.file1, &paths.file2, &comparison)
                .context("Failed to serialize report")?;
            println!("{}", json);
        }
    }

    debug!(status = comparison.exit_status(), "Done");
    Ok(ExitCode::from(comparison.exit_status()))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                return ExitCode::FAILURE;
            }
        },
    };

    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
