//! Observers that present a run to the user.

pub mod console;
pub mod json;

pub use console::ConsoleReporter;
pub use json::{AbortedSuite, JsonReporter};
