//! The failure collector handed to every test body.
//!
//! A [`Check`] never aborts the test: each helper records a [`Failure`] when
//! its comparison does not hold and returns normally, so a single test can
//! report several mismatches at once.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::{self, Debug, Display};
use std::panic::Location;

use difference::{Changeset, Difference};
use serde::Serialize;

/// One recorded failure.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// Human-readable message, prefixed with the caller's context message if any.
    pub message: String,
    /// Optional longer explanation, e.g. a diff of the compared values.
    pub detail: Option<String>,
    /// `file:line:column` of the helper call that recorded the failure.
    pub location: String,
    /// Call stack at the time of recording, when backtrace capture is enabled.
    pub backtrace: Option<String>,
}

impl Failure {
    #[track_caller]
    pub fn new(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::at(message, detail, Location::caller())
    }

    fn at(message: impl Into<String>, detail: Option<String>, location: &Location<'_>) -> Self {
        let backtrace = Backtrace::capture();
        let backtrace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            message: message.into(),
            detail,
            location: location.to_string(),
            backtrace,
        }
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.detail == other.detail
            && self.location == other.location
    }
}

impl Eq for Failure {}

impl Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collects comparison failures for one test execution.
#[derive(Debug, Default)]
pub struct Check {
    failures: Vec<Failure>,
}

fn with_context(error: String, message: Option<&str>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!("{}: {}", m, error),
        _ => error,
    }
}

/// Short type name of `T` with module paths and generic arguments removed.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let base = base.trim_start_matches('&').trim_start_matches("mut ");
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn diff(expected: &str, actual: &str) -> Option<String> {
    if !expected.contains('\n') && !actual.contains('\n') {
        return None;
    }
    let changeset = Changeset::new(expected, actual, "\n");
    let mut out = String::new();
    for change in &changeset.diffs {
        let (prefix, text) = match change {
            Difference::Same(t) => (' ', t),
            Difference::Rem(t) => ('-', t),
            Difference::Add(t) => ('+', t),
        };
        for line in text.lines() {
            out.push(prefix);
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
    }
    Some(out)
}

impl Check {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error message, optionally prefixed with a user message.
    #[track_caller]
    pub fn log_error(&mut self, error: impl Into<String>, message: Option<&str>) {
        self.log_error_with_detail(error, message, None);
    }

    #[track_caller]
    pub fn log_error_with_detail(
        &mut self,
        error: impl Into<String>,
        message: Option<&str>,
        detail: Option<String>,
    ) {
        let location = Location::caller();
        self.failures
            .push(Failure::at(with_context(error.into(), message), detail, location));
    }

    pub(crate) fn push(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }

    /// All failure messages joined by `", "`.
    pub fn error_message(&self) -> String {
        join_messages(&self.failures)
    }

    #[track_caller]
    pub fn equal<T: Debug + PartialEq>(&mut self, a: T, b: T, message: Option<&str>) {
        if a != b {
            let detail = diff(&format!("{:#?}", a), &format!("{:#?}", b));
            self.log_error_with_detail(format!("{:?} != {:?}", a, b), message, detail);
        }
    }

    #[track_caller]
    pub fn not_equal<T: Debug + PartialEq>(&mut self, a: T, b: T, message: Option<&str>) {
        if a == b {
            self.log_error(format!("{:?} == {:?}", a, b), message);
        }
    }

    #[track_caller]
    pub fn is_none<T: Debug>(&mut self, value: &Option<T>, message: Option<&str>) {
        if let Some(v) = value {
            self.log_error(format!("{:?} is not None", v), message);
        }
    }

    #[track_caller]
    pub fn is_some<T>(&mut self, value: &Option<T>, message: Option<&str>) {
        if value.is_none() {
            self.log_error("None is None", message);
        }
    }

    #[track_caller]
    pub fn is_true(&mut self, value: bool, message: Option<&str>) {
        if !value {
            self.log_error("false is False", message);
        }
    }

    #[track_caller]
    pub fn is_false(&mut self, value: bool, message: Option<&str>) {
        if value {
            self.log_error("true is True", message);
        }
    }

    #[track_caller]
    pub fn contains(&mut self, haystack: &str, needle: &str, message: Option<&str>) {
        if !haystack.contains(needle) {
            self.log_error(
                format!("{:?} does not contain {:?}", haystack, needle),
                message,
            );
        }
    }

    /// Just records a failure.
    #[track_caller]
    pub fn fail(&mut self, message: impl Into<String>) {
        self.log_error(message, None);
    }

    /// Expects `f` to return an error; records a failure and hands back the
    /// value if it succeeded instead.
    #[track_caller]
    pub fn raises<T, E>(&mut self, name: &str, f: impl FnOnce() -> Result<T, E>) -> Option<T> {
        match f() {
            Ok(value) => {
                self.log_error(
                    format!("{} did not raise {}", name, short_type_name::<E>()),
                    None,
                );
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Expects `f` to succeed; records the error otherwise.
    #[track_caller]
    pub fn does_not_raise<T, E: Display>(
        &mut self,
        name: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Option<T> {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_error(
                    format!("{} did raise {}: {}", name, short_type_name::<E>(), e),
                    None,
                );
                None
            }
        }
    }
}

pub(crate) fn join_messages(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
