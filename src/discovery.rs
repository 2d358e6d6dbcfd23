//! Suite discovery.
//!
//! A [`SuiteLocator`] turns some external description of tests into runnable
//! [`Suite`]s. [`YamlSuiteLocator`] scans directories for YAML command-suite
//! files:
//!
//! ```yaml
//! name: users
//! label: User API
//! workdir: ..
//! env: { API_URL: "http://localhost:8080" }
//! setup_all: ./start-server.sh
//! teardown_all: ./stop-server.sh
//! tests:
//!   - name: create
//!     run: curl -sf -X POST $API_URL/users -d name=alice
//!     expect: { stdout_contains: ["alice"] }
//!   - name: rename
//!     run: curl -sf -X PUT $API_URL/users/alice -d name=bob
//!     skip_if_failed: [create]
//! ```
//!
//! Every command runs through the configured shell as `<shell> -c <command>`
//! in the suite's working directory, which is relative to the file's own
//! directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::check::Check;
use crate::config::RunnerConfig;
use crate::config_err;
use crate::diagnostics::IntegrateError;
use crate::suite::{Suite, TestOptions};

/// Produces the suites of one run.
pub trait SuiteLocator {
    type Fixture;

    fn locate(&self) -> Result<Vec<Suite<Self::Fixture>>, IntegrateError>;
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    /// Defaults to the file stem.
    pub name: Option<String>,
    pub label: Option<String>,
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub setup_all: Option<String>,
    pub teardown_all: Option<String>,
    pub setup_test: Option<String>,
    pub teardown_test: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    pub name: String,
    pub label: Option<String>,
    pub run: String,
    #[serde(default)]
    pub expect: Expect,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub skip_if_failed: Vec<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub expect_fail: bool,
}

impl TestSpec {
    fn options(&self) -> TestOptions {
        let options = TestOptions::new()
            .depends(self.depends.iter().cloned())
            .skip_if_failed(self.skip_if_failed.iter().cloned())
            .skip(self.skip)
            .expect_fail(self.expect_fail);
        match &self.label {
            Some(label) => options.label(label.clone()),
            None => options,
        }
    }
}

/// What a test command must produce to pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expect {
    pub status: i32,
    pub stdout_contains: Vec<String>,
    pub stderr_contains: Vec<String>,
    pub stdout_equals: Option<String>,
}

impl Expect {
    /// Records every way `output` differs from this expectation.
    pub fn verify(&self, output: &CommandOutput, check: &mut Check) {
        check.equal(output.status, Some(self.status), Some("exit status"));
        for needle in &self.stdout_contains {
            check.contains(&output.stdout, needle, Some("stdout"));
        }
        for needle in &self.stderr_contains {
            check.contains(&output.stderr, needle, Some("stderr"));
        }
        if let Some(expected) = &self.stdout_equals {
            check.equal(output.stdout.as_str(), expected.as_str(), Some("stdout"));
        }
    }
}

// ============================================================================
// COMMAND FIXTURE - Shared state of one command suite
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("'{command}' exited with {status}")]
    Status { command: String, status: String },
}

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Fixture of a command suite: how and where its commands run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFixture {
    pub shell: String,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl CommandFixture {
    pub fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command, workdir = %self.workdir.display(), "running command");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .envs(&self.env)
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Runs a hook command; a non-zero exit is an error.
    pub fn run_hook(&self, command: &str) -> Result<(), CommandError> {
        let output = self.run(command)?;
        if output.status == Some(0) {
            return Ok(());
        }
        let status = match output.status {
            Some(code) => format!("status {code}"),
            None => "a signal".to_string(),
        };
        Err(CommandError::Status {
            command: command.to_string(),
            status,
        })
    }
}

// ============================================================================
// YAML LOCATOR
// ============================================================================

/// Finds `*_test.yaml` style files and loads one command suite per file.
#[derive(Debug, Clone)]
pub struct YamlSuiteLocator {
    dirs: Vec<PathBuf>,
    pattern: GlobMatcher,
    shell: String,
}

impl YamlSuiteLocator {
    pub fn new(
        dirs: Vec<PathBuf>,
        pattern: &str,
        shell: impl Into<String>,
    ) -> Result<Self, IntegrateError> {
        Ok(Self {
            dirs,
            pattern: compile_pattern(pattern)?,
            shell: shell.into(),
        })
    }

    pub fn from_config(config: &RunnerConfig) -> Result<Self, IntegrateError> {
        Self::new(config.dirs.clone(), &config.pattern, config.shell.clone())
    }

    /// Matching files under every directory, sorted and deduplicated.
    pub fn files(&self) -> Result<Vec<PathBuf>, IntegrateError> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                return Err(IntegrateError::Discovery {
                    path: dir.clone(),
                    message: "not a directory".to_string(),
                });
            }
            for entry in WalkDir::new(dir) {
                let entry = entry.map_err(|e| IntegrateError::Discovery {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if self.pattern.is_match(entry.file_name()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Parses one suite file into a runnable suite.
    pub fn load(&self, path: &Path) -> Result<Suite<CommandFixture>, IntegrateError> {
        let source = fs::read_to_string(path).map_err(|e| IntegrateError::Discovery {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let file: SuiteFile = serde_yaml::from_str(&source)
            .map_err(|e| IntegrateError::suite_parse(path, &source, &e))?;
        let suite = self.build(path, file);
        tracing::debug!(path = %path.display(), suite = suite.name(), tests = suite.len(), "loaded suite");
        Ok(suite)
    }

    fn build(&self, path: &Path, file: SuiteFile) -> Suite<CommandFixture> {
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = file.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let fixture = CommandFixture {
            shell: self.shell.clone(),
            workdir: file.workdir.map_or_else(|| base.clone(), |w| base.join(w)),
            env: file.env,
        };

        let mut builder = Suite::builder(name.as_str(), fixture);
        if let Some(label) = file.label {
            builder = builder.label(label);
        }
        if let Some(command) = file.setup_all {
            builder = builder.setup_all(move |f: &mut CommandFixture| f.run_hook(&command));
        }
        if let Some(command) = file.teardown_all {
            builder = builder.teardown_all(move |f: &mut CommandFixture| f.run_hook(&command));
        }
        if let Some(command) = file.setup_test {
            builder = builder.setup_test(move |f: &mut CommandFixture| f.run_hook(&command));
        }
        if let Some(command) = file.teardown_test {
            builder = builder.teardown_test(move |f: &mut CommandFixture| f.run_hook(&command));
        }

        for spec in file.tests {
            let options = spec.options();
            let TestSpec {
                name, run, expect, ..
            } = spec;
            builder = builder.try_test(name, options, move |fixture, check| {
                let output = fixture.run(&run)?;
                expect.verify(&output, check);
                Ok::<(), CommandError>(())
            });
        }
        builder.build()
    }
}

impl SuiteLocator for YamlSuiteLocator {
    type Fixture = CommandFixture;

    fn locate(&self) -> Result<Vec<Suite<CommandFixture>>, IntegrateError> {
        let files = self.files()?;
        tracing::info!(files = files.len(), "discovered suite files");
        files.iter().map(|path| self.load(path)).collect()
    }
}

/// Compiles a shell-style file-name pattern (`*`, `?`, `[seq]`, `[!seq]`).
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher, IntegrateError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| config_err!("<pattern>", "invalid pattern '{}': {}", pattern, e))
}
