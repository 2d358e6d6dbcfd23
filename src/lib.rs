pub use crate::check::{Check, Failure};
pub use crate::diagnostics::{print_error, ErrorType, HookKind, IntegrateError};
pub use crate::engine::{plan, Engine, SuiteReport};
pub use crate::graph::DependencyGraph;
pub use crate::ledger::{Ledger, SkipReason, Status, Summary, TestOutcome};
pub use crate::observer::{Event, NullObserver, Observer};
pub use crate::scheduler::{schedule, Schedule};
pub use crate::suite::{Suite, SuiteBuilder, TestDescriptor, TestOptions, Uncaught};

pub mod check;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod engine;
pub mod graph;
pub mod ledger;
pub mod observer;
pub mod report;
pub mod scheduler;
pub mod suite;
