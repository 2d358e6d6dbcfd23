//! Handles the user-facing output of the `plan` command.

use std::io;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::graph::DependencyGraph;
use crate::scheduler::Schedule;
use crate::suite::TestDescriptor;

// ============================================================================
// PLAN OUTPUT
// ============================================================================

/// Prints a suite's execution order, one numbered test per line.
pub fn print_plan<W: WriteColor>(
    out: &mut W,
    label: &str,
    graph: &DependencyGraph,
    schedule: &Schedule,
) -> io::Result<()> {
    header(out, label, graph.len())?;
    for (position, descriptor) in schedule.descriptors(graph).into_iter().enumerate() {
        write!(out, "  {:>3}. {}", position + 1, descriptor.name())?;
        annotations(out, descriptor)?;
        writeln!(out)?;
    }
    out.flush()
}

/// Prints a suite's tests grouped into levels of mutually independent tests.
pub fn print_levels<W: WriteColor>(
    out: &mut W,
    label: &str,
    graph: &DependencyGraph,
    schedule: &Schedule,
) -> io::Result<()> {
    header(out, label, graph.len())?;
    for (level, nodes) in schedule.levels().into_iter().enumerate() {
        let names: Vec<&str> = nodes.iter().map(|&n| graph.node(n).name()).collect();
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(out, "  level {level}:")?;
        out.reset()?;
        writeln!(out, " {}", names.join(", "))?;
    }
    out.flush()
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn header<W: WriteColor>(out: &mut W, label: &str, tests: usize) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "* Test suite '{label}'")?;
    out.reset()?;
    writeln!(out, " ({tests} tests)")
}

fn annotations<W: WriteColor>(out: &mut W, descriptor: &TestDescriptor) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    if !descriptor.depends().is_empty() {
        write!(out, " [depends: {}]", descriptor.depends().join(", "))?;
    }
    if !descriptor.skip_if_failed().is_empty() {
        write!(
            out,
            " [skip_if_failed: {}]",
            descriptor.skip_if_failed().join(", ")
        )?;
    }
    if descriptor.skip() {
        write!(out, " [skip]")?;
    }
    if descriptor.expect_fail() {
        write!(out, " [expect_fail]")?;
    }
    out.reset()
}
