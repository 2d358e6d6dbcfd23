//! Defines the command-line arguments and subcommands of `integrate`.
//!
//! Global options override the matching keys of the configuration file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ColorMode, Overrides};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "integrate",
    version,
    about = "Runs integration test suites in dependency order."
)]
pub struct IntegrateArgs {
    /// Configuration file (defaults to ./integrate.yaml when present).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to scan for suite files; may be repeated.
    #[arg(short = 'd', long = "dir", global = true)]
    pub dirs: Vec<PathBuf>,

    /// File name glob of suite files.
    #[arg(short, long, global = true)]
    pub pattern: Option<String>,

    /// Output detail, 0 to 2.
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub verbosity: Option<u8>,

    #[arg(long, value_enum, global = true)]
    pub color: Option<ColorMode>,

    /// Print engine traces to stderr (filter with INTEGRATE_LOG).
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover, schedule and run suites.
    Run {
        /// Only run tests whose suite name or `suite.test` starts with this.
        #[arg(long)]
        only: Option<String>,
        /// Print one JSON document instead of progress lines.
        #[arg(long)]
        json: bool,
        /// Count expected failures as failures.
        #[arg(long)]
        strict: bool,
    },
    /// Show the execution order without running anything.
    Plan {
        #[arg(long)]
        only: Option<String>,
        /// Group tests into levels of mutually independent tests.
        #[arg(long)]
        levels: bool,
    },
}

impl IntegrateArgs {
    pub fn overrides(&self) -> Overrides {
        let strict = matches!(self.command, Command::Run { strict: true, .. });
        Overrides {
            verbosity: self.verbosity,
            dirs: self.dirs.clone(),
            pattern: self.pattern.clone(),
            color: self.color,
            strict_expected_failures: strict,
        }
    }

    pub fn only(&self) -> Option<&str> {
        match &self.command {
            Command::Run { only, .. } | Command::Plan { only, .. } => only.as_deref(),
        }
    }
}
