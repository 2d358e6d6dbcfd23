//! Structured progress events emitted by the engine.
//!
//! The engine never prints. Anything that wants to show progress implements
//! [`Observer`] and receives read-only views of the run as it happens.

use std::time::Duration;

use crate::diagnostics::IntegrateError;
use crate::engine::SuiteReport;
use crate::ledger::{Ledger, Summary, TestOutcome};
use crate::suite::TestDescriptor;

#[derive(Debug)]
pub enum Event<'a> {
    /// Scheduling succeeded; `tests` is the execution order.
    SuiteStarted {
        suite: &'a str,
        label: &'a str,
        tests: &'a [&'a TestDescriptor],
    },
    TestStarted {
        descriptor: &'a TestDescriptor,
    },
    /// The test's ledger entry has been written.
    TestFinished {
        descriptor: &'a TestDescriptor,
        outcome: &'a TestOutcome,
        elapsed: Duration,
        ledger: &'a Ledger,
        summary: Summary,
    },
    SuiteFinished {
        report: &'a SuiteReport,
    },
    /// The suite could not run: a configuration error or a failed `setup_all`.
    SuiteAborted {
        suite: &'a str,
        label: &'a str,
        error: &'a IntegrateError,
    },
}

pub trait Observer {
    fn on_event(&mut self, event: &Event<'_>);
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&mut self, _event: &Event<'_>) {}
}
