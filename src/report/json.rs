use std::io::Write;

use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::SuiteReport;
use crate::ledger::Summary;
use crate::observer::{Event, Observer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortedSuite {
    pub suite: String,
    pub label: String,
    pub kind: String,
    pub error: String,
}

/// Collects every suite's report and renders them as one JSON document at
/// the end of the run.
#[derive(Debug, Default)]
pub struct JsonReporter {
    reports: Vec<SuiteReport>,
    aborted: Vec<AbortedSuite>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[SuiteReport] {
        &self.reports
    }

    pub fn summary(&self) -> Summary {
        let mut total = Summary::default();
        for report in &self.reports {
            total.merge(&report.summary);
        }
        total
    }

    pub fn to_value(&self) -> Value {
        json!({
            "suites": self.reports,
            "aborted": self.aborted,
            "summary": self.summary(),
        })
    }

    pub fn write<W: Write>(&self, mut out: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(&mut out, &self.to_value())?;
        writeln!(out).map_err(serde_json::Error::io)
    }
}

impl Observer for JsonReporter {
    fn on_event(&mut self, event: &Event<'_>) {
        match event {
            Event::SuiteFinished { report } => self.reports.push((*report).clone()),
            Event::SuiteAborted {
                suite,
                label,
                error,
            } => self.aborted.push(AbortedSuite {
                suite: suite.to_string(),
                label: label.to_string(),
                kind: error.error_type().to_string(),
                error: error.to_string(),
            }),
            _ => {}
        }
    }
}
