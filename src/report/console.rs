use std::collections::HashMap;
use std::io;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::check::Failure;
use crate::diagnostics::IntegrateError;
use crate::engine::SuiteReport;
use crate::ledger::{Status, Summary, TestOutcome};
use crate::observer::{Event, Observer};
use crate::suite::TestDescriptor;

const RULE_WIDTH: usize = 40;

/// Line-oriented progress output.
///
/// Verbosity 0 prints one status tag per test; 1 adds failure messages and
/// the dependency skip reason; 2 adds the "Failed tests" and "Skipped tests"
/// listings after each suite.
pub struct ConsoleReporter<W: WriteColor> {
    out: W,
    verbosity: u8,
    /// Width of the label column of the current suite.
    width: usize,
    labels: HashMap<String, String>,
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn new(out: W, verbosity: u8) -> Self {
        Self {
            out,
            verbosity,
            width: 0,
            labels: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints the combined summary of a multi-suite run.
    pub fn total(&mut self, summary: &Summary, suites: usize) -> io::Result<()> {
        self.colored(Color::White, true, &format!("Total over {suites} suites: "))?;
        writeln!(self.out, "{summary}")?;
        self.out.flush()
    }

    fn colored(&mut self, color: Color, bold: bool, text: &str) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }

    fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.labels.get(name).map_or(name, String::as_str)
    }

    fn rule(&mut self, c: char) -> io::Result<()> {
        writeln!(self.out, "{}", c.to_string().repeat(RULE_WIDTH))
    }

    fn suite_started(&mut self, label: &str, tests: &[&TestDescriptor]) -> io::Result<()> {
        self.labels = tests
            .iter()
            .map(|d| (d.name().to_string(), d.label().to_string()))
            .collect();
        self.width = tests
            .iter()
            .map(|d| d.label().chars().count())
            .max()
            .unwrap_or(0)
            + 1;
        writeln!(self.out, "* Running test suite '{label}'")?;
        self.out.flush()
    }

    fn test_started(&mut self, descriptor: &TestDescriptor) -> io::Result<()> {
        write!(
            self.out,
            "  - Running {: <width$}: ",
            descriptor.label(),
            width = self.width
        )?;
        self.out.flush()
    }

    fn test_finished(&mut self, outcome: &TestOutcome) -> io::Result<()> {
        let detailed = self.verbosity > 0;
        match outcome.status() {
            Status::Passed => self.colored(Color::Green, true, "[  OK  ]")?,
            Status::SkippedExplicit => self.colored(Color::Yellow, false, "[ SKIP ]")?,
            Status::SkippedDependency if detailed => {
                self.colored(Color::Yellow, false, "[ SKIP: Dependency ]")?
            }
            Status::SkippedDependency => self.colored(Color::Yellow, false, "[ SKIP ]")?,
            Status::ExpectedFailed => self.colored(Color::Cyan, false, "[ XFAIL ]")?,
            Status::Failed if detailed => {
                let tag = format!("[ FAIL: {} ]", outcome.error_message());
                self.colored(Color::Red, true, &tag)?
            }
            Status::Failed => self.colored(Color::Red, true, "[ FAIL ]")?,
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    fn failure_block(&mut self, failure: &Failure) -> io::Result<()> {
        writeln!(self.out, "at {}", failure.location)?;
        if let Some(backtrace) = &failure.backtrace {
            writeln!(self.out, "{backtrace}")?;
        }
        writeln!(self.out, "{}", failure.message)?;
        if let Some(detail) = &failure.detail {
            write!(self.out, "{detail}")?;
        }
        writeln!(self.out)?;
        self.rule('-')
    }

    fn suite_finished(&mut self, report: &SuiteReport) -> io::Result<()> {
        if self.verbosity > 1 {
            writeln!(self.out, "\nFailed tests:")?;
            self.rule('=')?;
            writeln!(self.out)?;
            for (name, outcome) in report.ledger.iter() {
                if !outcome.has_failures() {
                    continue;
                }
                let label = self.label(name).to_string();
                writeln!(self.out, "-> {label}")?;
                self.rule('-')?;
                for failure in &outcome.failures {
                    self.failure_block(failure)?;
                }
                writeln!(self.out)?;
            }

            writeln!(self.out, "Skipped tests:")?;
            self.rule('=')?;
            writeln!(self.out)?;
            for (name, outcome) in report.ledger.iter() {
                if outcome.skipped {
                    let label = self.label(name).to_string();
                    writeln!(self.out, "- {label}")?;
                }
            }
            writeln!(self.out)?;
        }

        if let Some(failure) = &report.teardown_failure {
            self.colored(Color::Red, true, "  ! ")?;
            writeln!(self.out, "{}", failure.message)?;
        }
        writeln!(self.out, "{}", report.summary)?;
        self.out.flush()
    }

    fn suite_aborted(&mut self, label: &str, error: &IntegrateError) -> io::Result<()> {
        self.colored(Color::Red, true, "  ! ")?;
        writeln!(self.out, "Suite '{label}' aborted: {error}")?;
        self.out.flush()
    }
}

impl<W: WriteColor> Observer for ConsoleReporter<W> {
    fn on_event(&mut self, event: &Event<'_>) {
        let result = match event {
            Event::SuiteStarted { label, tests, .. } => self.suite_started(label, tests),
            Event::TestStarted { descriptor } => self.test_started(descriptor),
            Event::TestFinished { outcome, .. } => self.test_finished(outcome),
            Event::SuiteFinished { report } => self.suite_finished(report),
            Event::SuiteAborted { label, error, .. } => self.suite_aborted(label, error),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write progress output");
        }
    }
}
