//! The `integrate` command-line interface.
//!
//! Loads the configuration, discovers suites and hands them to the engine
//! with the reporter the user asked for. Exit codes: 0 when every test passed
//! or failed as expected, 1 when a test failed unexpectedly or a
//! `teardown_all` hook failed, 2 when a suite could not be loaded or run.

use std::io;

use clap::Parser;
use termcolor::StandardStream;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::args::{Command, IntegrateArgs};
use crate::config::RunnerConfig;
use crate::diagnostics::{print_error, IntegrateError};
use crate::discovery::{CommandFixture, SuiteLocator, YamlSuiteLocator};
use crate::engine::{plan, Engine, SuiteReport};
use crate::ledger::Summary;
use crate::observer::Observer;
use crate::report::{ConsoleReporter, JsonReporter};
use crate::suite::Suite;

pub mod args;
pub mod output;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "INTEGRATE_LOG";

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// Parses the process arguments, runs the command and returns the exit code.
pub fn run() -> i32 {
    let args = IntegrateArgs::parse();
    install_subscriber(args.trace);
    match execute(args) {
        Ok(code) => code,
        Err(error) => {
            print_error(error);
            EXIT_ERROR
        }
    }
}

pub fn execute(args: IntegrateArgs) -> Result<i32, IntegrateError> {
    let mut config = RunnerConfig::discover(args.config.as_deref())?;
    config.apply(args.overrides())?;
    let suites = load_suites(&config, args.only())?;

    match args.command {
        Command::Run { json, .. } => Ok(run_suites(&config, suites, json)),
        Command::Plan { levels, .. } => Ok(plan_suites(&config, &suites, levels)),
    }
}

/// Traces go to stderr, only when asked for with `--trace` or `INTEGRATE_LOG`.
fn install_subscriber(trace: bool) {
    if !trace && std::env::var_os(LOG_ENV).is_none() {
        return;
    }
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
    // Fails only if a subscriber is already installed.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// ============================================================================
// COMMANDS
// ============================================================================

fn load_suites(
    config: &RunnerConfig,
    only: Option<&str>,
) -> Result<Vec<Suite<CommandFixture>>, IntegrateError> {
    let mut suites = YamlSuiteLocator::from_config(config)?.locate()?;
    if let Some(prefix) = only {
        suites.retain_mut(|suite| suite.select(prefix) > 0);
        tracing::info!(prefix, suites = suites.len(), "applied name filter");
    }
    if suites.is_empty() {
        tracing::warn!(dirs = ?config.dirs, pattern = %config.pattern, "no suites selected");
    }
    Ok(suites)
}

fn run_suites(config: &RunnerConfig, suites: Vec<Suite<CommandFixture>>, json: bool) -> i32 {
    if json {
        let mut reporter = JsonReporter::new();
        let (reports, errors) = drive(suites, &mut reporter);
        if let Err(e) = reporter.write(io::stdout().lock()) {
            tracing::warn!(error = %e, "failed to write JSON report");
        }
        return exit_code(config, &reports, errors);
    }

    let stdout = StandardStream::stdout(config.color.color_choice());
    let mut reporter = ConsoleReporter::new(stdout, config.verbosity);
    let (reports, errors) = drive(suites, &mut reporter);
    if reports.len() > 1 {
        let mut total = Summary::default();
        for report in &reports {
            total.merge(&report.summary);
        }
        if let Err(e) = reporter.total(&total, reports.len()) {
            tracing::warn!(error = %e, "failed to write summary");
        }
    }
    exit_code(config, &reports, errors)
}

/// Runs every suite; an aborted suite does not stop the ones after it.
fn drive(
    suites: Vec<Suite<CommandFixture>>,
    observer: &mut dyn Observer,
) -> (Vec<SuiteReport>, Vec<IntegrateError>) {
    let mut engine = Engine::new(observer);
    let mut reports = Vec::new();
    let mut errors = Vec::new();
    for mut suite in suites {
        match engine.run(&mut suite) {
            Ok(report) => reports.push(report),
            Err(error) => errors.push(error),
        }
    }
    (reports, errors)
}

fn exit_code(config: &RunnerConfig, reports: &[SuiteReport], errors: Vec<IntegrateError>) -> i32 {
    if !errors.is_empty() {
        for error in errors {
            print_error(error);
        }
        return EXIT_ERROR;
    }
    let failed = reports.iter().any(|report| {
        report.has_unexpected_failures()
            || (config.strict_expected_failures && report.summary.expected_failed > 0)
    });
    if failed {
        EXIT_FAILED
    } else {
        EXIT_OK
    }
}

fn plan_suites(config: &RunnerConfig, suites: &[Suite<CommandFixture>], levels: bool) -> i32 {
    let mut stdout = StandardStream::stdout(config.color.color_choice());
    let mut code = EXIT_OK;
    for suite in suites {
        let (graph, schedule) = match plan(suite) {
            Ok(planned) => planned,
            Err(error) => {
                print_error(error);
                code = EXIT_ERROR;
                continue;
            }
        };
        let printed = if levels {
            output::print_levels(&mut stdout, suite.label(), &graph, &schedule)
        } else {
            output::print_plan(&mut stdout, suite.label(), &graph, &schedule)
        };
        if let Err(e) = printed {
            tracing::warn!(error = %e, "failed to write plan");
        }
    }
    code
}
