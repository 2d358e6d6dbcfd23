//! The execution engine.
//!
//! Runs one suite at a time, strictly sequentially, in the order produced by
//! the scheduler. Per test the state machine is:
//!
//! ```text
//! Pending -> Skipped-Explicit | Skipped-Dependency | Running
//! Running -> Passed | Failed | Expected-Failed
//! ```
//!
//! Test failures, including errors and panics escaping a test body, are
//! recorded in the [`Ledger`]; only structural problems (an invalid graph, a
//! cycle, a failing `setup_all`) make [`Engine::run`] return an error, and
//! those abort the suite before any test executes.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::time::Instant;

use serde::Serialize;

use crate::check::{Check, Failure};
use crate::diagnostics::{HookKind, IntegrateError};
use crate::graph::DependencyGraph;
use crate::ledger::{AlreadyRecorded, Ledger, SkipReason, Summary, TestOutcome};
use crate::observer::{Event, Observer};
use crate::scheduler::{schedule, Schedule};
use crate::suite::{HookFn, Suite, TestDescriptor, Uncaught};

// ============================================================================
// REPORT - What a completed suite run hands back
// ============================================================================

/// Result of one completed suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub label: String,
    /// Test names in execution order.
    pub order: Vec<String>,
    pub ledger: Ledger,
    pub summary: Summary,
    /// Set when the `teardown_all` hook failed after the tests ran.
    pub teardown_failure: Option<Failure>,
}

impl SuiteReport {
    /// Whether the run contains failures that were not anticipated.
    pub fn has_unexpected_failures(&self) -> bool {
        self.summary.unexpected_failures() > 0 || self.teardown_failure.is_some()
    }
}

// ============================================================================
// PLANNING - Graph construction and scheduling without execution
// ============================================================================

/// Builds and schedules a suite's dependency graph without running anything.
pub fn plan<S>(suite: &Suite<S>) -> Result<(DependencyGraph, Schedule), IntegrateError> {
    let graph = DependencyGraph::build(suite.name(), &suite.descriptors())?;
    let schedule = schedule(&graph)?;
    Ok((graph, schedule))
}

// ============================================================================
// ENGINE
// ============================================================================

/// Drives suites through their lifecycle and reports progress to an observer.
pub struct Engine<'o> {
    observer: &'o mut dyn Observer,
}

impl<'o> Engine<'o> {
    pub fn new(observer: &'o mut dyn Observer) -> Self {
        Self { observer }
    }

    /// Runs every test of `suite` and returns the resulting report.
    pub fn run<S>(&mut self, suite: &mut Suite<S>) -> Result<SuiteReport, IntegrateError> {
        let (graph, schedule) = match plan(suite) {
            Ok(planned) => planned,
            Err(error) => return Err(self.abort(suite, error)),
        };
        let order = schedule.descriptors(&graph);

        tracing::info!(suite = suite.name(), tests = order.len(), "running suite");
        self.observer.on_event(&Event::SuiteStarted {
            suite: suite.name(),
            label: suite.label(),
            tests: &order,
        });

        if let Err(uncaught) = run_hook(&mut suite.hooks.setup_all, &mut suite.fixture) {
            tracing::warn!(suite = suite.name(), error = %uncaught, "setup_all failed");
            if let Err(teardown) = run_hook(&mut suite.hooks.teardown_all, &mut suite.fixture) {
                tracing::warn!(suite = suite.name(), error = %teardown, "teardown_all failed");
            }
            let error = IntegrateError::HookFailed {
                suite: suite.name().to_string(),
                hook: HookKind::SetupAll,
                message: uncaught.to_string(),
            };
            return Err(self.abort(suite, error));
        }

        let mut ledger = Ledger::new();
        let mut summary = Summary::default();
        // Graph nodes are indexed by declaration order, like `suite.tests`.
        for &index in schedule.order() {
            let descriptor = graph.node(index);
            self.observer.on_event(&Event::TestStarted { descriptor });
            let started = Instant::now();
            let outcome = match skip_reason(descriptor, &ledger) {
                Some(reason) => TestOutcome::skipped(reason, descriptor.expect_fail()),
                None => TestOutcome::executed(execute(suite, index), descriptor.expect_fail()),
            };
            let elapsed = started.elapsed();

            summary.add(outcome.status());
            tracing::debug!(
                test = descriptor.name(),
                status = %outcome.status(),
                elapsed_ms = elapsed.as_millis() as u64,
                "test finished"
            );
            if let Err(AlreadyRecorded(name)) = ledger.record(descriptor.name(), outcome) {
                tracing::error!(test = %name, "ledger entry written twice");
                continue;
            }
            let Some(outcome) = ledger.get(descriptor.name()) else {
                continue;
            };
            self.observer.on_event(&Event::TestFinished {
                descriptor,
                outcome,
                elapsed,
                ledger: &ledger,
                summary,
            });
        }

        let teardown_failure = run_hook(&mut suite.hooks.teardown_all, &mut suite.fixture)
            .err()
            .map(|uncaught| {
                tracing::warn!(suite = suite.name(), error = %uncaught, "teardown_all failed");
                hook_failure(HookKind::TeardownAll, &uncaught)
            });

        let report = SuiteReport {
            suite: suite.name().to_string(),
            label: suite.label().to_string(),
            order: order.iter().map(|d| d.name().to_string()).collect(),
            ledger,
            summary,
            teardown_failure,
        };
        tracing::info!(suite = suite.name(), summary = %report.summary, "suite finished");
        self.observer
            .on_event(&Event::SuiteFinished { report: &report });
        Ok(report)
    }

    fn abort<S>(&mut self, suite: &Suite<S>, error: IntegrateError) -> IntegrateError {
        tracing::error!(suite = suite.name(), error = %error, "suite aborted");
        self.observer.on_event(&Event::SuiteAborted {
            suite: suite.name(),
            label: suite.label(),
            error: &error,
        });
        error
    }
}

// ============================================================================
// STATE MACHINE - Skip decisions and the running bracket
// ============================================================================

/// Decides whether a test is skipped before it runs. Explicit skips win; then
/// the first `skip_if_failed` dependency that failed or was skipped.
fn skip_reason(descriptor: &TestDescriptor, ledger: &Ledger) -> Option<SkipReason> {
    if descriptor.skip() {
        return Some(SkipReason::Explicit);
    }
    descriptor
        .skip_if_failed()
        .iter()
        .filter_map(|dep| ledger.get(dep))
        .any(TestOutcome::blocks_dependents)
        .then_some(SkipReason::DependencyFailed)
}

/// setup_test, body, teardown_test. Teardown runs exactly once on every path,
/// including a failing setup or a body that errors or panics.
fn execute<S>(suite: &mut Suite<S>, index: usize) -> Vec<Failure> {
    let mut check = Check::new();
    let fixture = &mut suite.fixture;

    match run_hook(&mut suite.hooks.setup_test, fixture) {
        Ok(()) => {
            let body = &mut suite.tests[index].body;
            if let Err(uncaught) = guarded(|| body(&mut *fixture, &mut check)) {
                check.push(raised_failure("did raise", &uncaught));
            }
        }
        Err(uncaught) => check.push(hook_failure(HookKind::SetupTest, &uncaught)),
    }

    if let Err(uncaught) = run_hook(&mut suite.hooks.teardown_test, fixture) {
        check.push(hook_failure(HookKind::TeardownTest, &uncaught));
    }

    check.into_failures()
}

fn run_hook<S>(hook: &mut Option<HookFn<S>>, fixture: &mut S) -> Result<(), Uncaught> {
    match hook {
        Some(hook) => guarded(|| hook(&mut *fixture)),
        None => Ok(()),
    }
}

fn hook_failure(hook: HookKind, uncaught: &Uncaught) -> Failure {
    raised_failure(&format!("{hook} did raise"), uncaught)
}

fn raised_failure(prefix: &str, uncaught: &Uncaught) -> Failure {
    let mut failure = Failure::new(
        format!("{} {}: {}", prefix, uncaught.kind, uncaught.message),
        None,
    );
    if let Some(location) = &uncaught.location {
        failure.location = location.clone();
    }
    failure
}

thread_local! {
    /// Set while `guarded` runs a closure on this thread.
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Wraps the process panic hook once. Panics raised inside `guarded` only
/// record their location; every other panic reaches the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let location = info.location().map(ToString::to_string);
                PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            } else {
                previous(info);
            }
        }));
    });
}

/// Runs `f`, turning a panic into an `Uncaught` of kind `panic`. The panic
/// message is not printed; it ends up in the returned error instead.
fn guarded(f: impl FnOnce() -> Result<(), Uncaught>) -> Result<(), Uncaught> {
    install_panic_hook();
    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(was_capturing));
    result.unwrap_or_else(|payload| {
        let mut uncaught = Uncaught::new("panic", panic_message(payload.as_ref()));
        uncaught.location = PANIC_LOCATION.with(|slot| slot.borrow_mut().take());
        Err(uncaught)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
