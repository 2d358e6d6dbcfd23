//! Unified, `miette`-based diagnostics for Integrate.
//!
//! Only structural problems are errors: a suite that cannot be loaded, a
//! dependency that names no test, two tests sharing a name, a dependency
//! cycle, or a suite-level setup hook that fails. Test failures are never
//! represented here; they are data in the [`crate::ledger::Ledger`].
//!
//! # Error Construction
//!
//! - Use [`config_err!`](crate::config_err) for `Config` errors built from a
//!   path and a formatted message.
//! - Everything else is constructed directly through its variant, which keeps
//!   the offending suite and test names visible at the construction site.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};
use thiserror::Error;

pub type SourceArc = Arc<NamedSource<String>>;

/// Coarse classification used for exit codes and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The suite's declared tests do not form a valid dependency graph.
    Configuration,
    /// A suite-level lifecycle hook failed.
    Hook,
    /// Suite files or the runner configuration could not be loaded.
    Load,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "Configuration",
            ErrorType::Hook => "Hook",
            ErrorType::Load => "Load",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which suite-level hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    SetupAll,
    TeardownAll,
    SetupTest,
    TeardownTest,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::SetupAll => "setup_all",
            HookKind::TeardownAll => "teardown_all",
            HookKind::SetupTest => "setup_test",
            HookKind::TeardownTest => "teardown_test",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every error Integrate can surface to its caller.
#[derive(Debug, Error)]
pub enum IntegrateError {
    #[error("test '{test}' in suite '{suite}' depends on unknown test '{dependency}'")]
    UnknownDependency {
        suite: String,
        test: String,
        dependency: String,
    },
    #[error("suite '{suite}' declares test '{test}' more than once")]
    DuplicateTest { suite: String, test: String },
    #[error("dependency cycle in suite '{suite}': '{from}' depends on '{to}' which is still being resolved")]
    DependencyCycle {
        suite: String,
        from: String,
        to: String,
        /// Participating tests in dependency order, closed with the first name.
        cycle: Vec<String>,
    },
    #[error("{hook} hook of suite '{suite}' failed: {message}")]
    HookFailed {
        suite: String,
        hook: HookKind,
        message: String,
    },
    #[error("failed to parse suite file '{}': {message}", path.display())]
    SuiteParse {
        path: PathBuf,
        message: String,
        src: Option<SourceArc>,
        span: Option<SourceSpan>,
    },
    #[error("failed to discover suites under '{}': {message}", path.display())]
    Discovery { path: PathBuf, message: String },
    #[error("invalid configuration '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl IntegrateError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            IntegrateError::UnknownDependency { .. }
            | IntegrateError::DuplicateTest { .. }
            | IntegrateError::DependencyCycle { .. } => ErrorType::Configuration,
            IntegrateError::HookFailed { .. } => ErrorType::Hook,
            IntegrateError::SuiteParse { .. }
            | IntegrateError::Discovery { .. }
            | IntegrateError::Config { .. } => ErrorType::Load,
        }
    }

    /// Builds a `SuiteParse` diagnostic from a `serde_yaml` error, pointing at
    /// the offending location when the parser reports one.
    pub fn suite_parse(path: impl Into<PathBuf>, source: &str, err: &serde_yaml::Error) -> Self {
        let path = path.into();
        let span = err
            .location()
            .map(|loc| SourceSpan::from((loc.index().min(source.len()), 1)));
        IntegrateError::SuiteParse {
            message: err.to_string(),
            src: Some(Arc::new(NamedSource::new(
                path.display().to_string(),
                source.to_string(),
            ))),
            span,
            path,
        }
    }

    fn code_str(&self) -> &'static str {
        match self {
            IntegrateError::UnknownDependency { .. } => "integrate::config::unknown_dependency",
            IntegrateError::DuplicateTest { .. } => "integrate::config::duplicate_test",
            IntegrateError::DependencyCycle { .. } => "integrate::config::dependency_cycle",
            IntegrateError::HookFailed { .. } => "integrate::hook",
            IntegrateError::SuiteParse { .. } => "integrate::load::suite_parse",
            IntegrateError::Discovery { .. } => "integrate::load::discovery",
            IntegrateError::Config { .. } => "integrate::load::config",
        }
    }

    fn help_text(&self) -> Option<String> {
        match self {
            IntegrateError::UnknownDependency { dependency, .. } => Some(format!(
                "declare a test named '{}' in the same suite or remove it from `depends`/`skip_if_failed`",
                dependency
            )),
            IntegrateError::DuplicateTest { .. } => {
                Some("test names must be unique within a suite".to_string())
            }
            IntegrateError::DependencyCycle { cycle, .. } => Some(format!(
                "break the cycle: {}",
                cycle.join(" -> ")
            )),
            IntegrateError::HookFailed { .. } => {
                Some("no test in this suite was executed".to_string())
            }
            _ => None,
        }
    }
}

impl Diagnostic for IntegrateError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help_text()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            IntegrateError::SuiteParse { src: Some(src), .. } => {
                Some(src.as_ref() as &dyn SourceCode)
            }
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            IntegrateError::SuiteParse {
                span: Some(span),
                src: Some(_),
                ..
            } => Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
                Some("here".to_string()),
                *span,
            )))),
            _ => None,
        }
    }
}

/// Constructs an `IntegrateError::Config` from a path and a formatted message.
#[macro_export]
macro_rules! config_err {
    ($path:expr, $msg:expr) => {
        $crate::IntegrateError::Config {
            path: ::std::path::PathBuf::from($path),
            message: format!("{}", $msg),
        }
    };
    ($path:expr, $msg:expr, $($arg:expr),+) => {
        $crate::IntegrateError::Config {
            path: ::std::path::PathBuf::from($path),
            message: format!($msg, $($arg),+),
        }
    };
}

/// Renders an error through `miette`'s graphical handler on stderr.
pub fn print_error(error: IntegrateError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
