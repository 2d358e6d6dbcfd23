//! The per-run result ledger and the summary derived from it.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::check::{join_messages, Failure};

/// Why a test did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    None,
    Explicit,
    DependencyFailed,
}

/// Final state of one test, derived from its outcome record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    ExpectedFailed,
    SkippedExplicit,
    SkippedDependency,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::ExpectedFailed => "expected-failed",
            Status::SkippedExplicit => "skipped",
            Status::SkippedDependency => "skipped-dependency",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome record for one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub skipped: bool,
    pub skip_reason: SkipReason,
    pub failures: Vec<Failure>,
    pub expect_fail: bool,
}

impl TestOutcome {
    pub fn skipped(reason: SkipReason, expect_fail: bool) -> Self {
        Self {
            skipped: true,
            skip_reason: reason,
            failures: Vec::new(),
            expect_fail,
        }
    }

    pub fn executed(failures: Vec<Failure>, expect_fail: bool) -> Self {
        Self {
            skipped: false,
            skip_reason: SkipReason::None,
            failures,
            expect_fail,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether a `skip_if_failed` dependent of this test must be skipped.
    pub fn blocks_dependents(&self) -> bool {
        self.skipped || self.has_failures()
    }

    pub fn status(&self) -> Status {
        match (self.skipped, self.skip_reason, self.has_failures()) {
            (true, SkipReason::DependencyFailed, _) => Status::SkippedDependency,
            (true, _, _) => Status::SkippedExplicit,
            (false, _, false) => Status::Passed,
            (false, _, true) if self.expect_fail => Status::ExpectedFailed,
            (false, _, true) => Status::Failed,
        }
    }

    /// All failure messages joined by `", "`.
    pub fn error_message(&self) -> String {
        join_messages(&self.failures)
    }
}

/// Raised when a test's entry is written a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyRecorded(pub String);

/// Mapping from test name to outcome, in recording order.
///
/// Entries are write-once: there is no way to change an entry after it has
/// been recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    order: Vec<String>,
    entries: HashMap<String, TestOutcome>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, name: &str, outcome: TestOutcome) -> Result<(), AlreadyRecorded> {
        if self.entries.contains_key(name) {
            return Err(AlreadyRecorded(name.to_string()));
        }
        self.order.push(name.to_string());
        self.entries.insert(name.to_string(), outcome);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TestOutcome> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestOutcome)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|o| (name.as_str(), o)))
    }

    pub fn summary(&self) -> Summary {
        Summary::from_ledger(self)
    }
}

impl Serialize for Ledger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        #[derive(Serialize)]
        struct Entry<'a> {
            name: &'a str,
            status: Status,
            #[serde(flatten)]
            outcome: &'a TestOutcome,
        }

        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for (name, outcome) in self.iter() {
            seq.serialize_element(&Entry {
                name,
                status: outcome.status(),
                outcome,
            })?;
        }
        seq.end()
    }
}

/// Aggregate counts for one suite run.
///
/// `failed` includes expected failures; `expected_failed` counts them again
/// separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub expected_failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let mut summary = Summary::default();
        for (_, outcome) in ledger.iter() {
            summary.add(outcome.status());
        }
        summary
    }

    pub fn add(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Passed => self.succeeded += 1,
            Status::Failed => self.failed += 1,
            Status::ExpectedFailed => {
                self.failed += 1;
                self.expected_failed += 1;
            }
            Status::SkippedExplicit | Status::SkippedDependency => self.skipped += 1,
        }
    }

    /// Failures that were not anticipated.
    pub fn unexpected_failures(&self) -> usize {
        self.failed - self.expected_failed
    }

    pub fn merge(&mut self, other: &Summary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.expected_failed += other.expected_failed;
        self.skipped += other.skipped;
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ran {} tests, {} succeeded, {} failed, {} skipped",
            self.total, self.succeeded, self.failed, self.skipped
        )?;
        if self.expected_failed > 0 {
            write!(f, ", {} expected failures", self.expected_failed)?;
        }
        Ok(())
    }
}
