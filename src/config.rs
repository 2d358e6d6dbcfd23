//! Runner configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults, an
//! `integrate.yaml` file (or the file given with `--config`), and command-line
//! flags.
//!
//! ```yaml
//! verbosity: 1
//! dirs: [tests/integration]
//! pattern: "*_test.yaml"
//! color: never
//! shell: bash
//! strict_expected_failures: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use termcolor::ColorChoice;

use crate::config_err;
use crate::diagnostics::IntegrateError;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "integrate.yaml";

pub const MAX_VERBOSITY: u8 = 2;

/// When to emit colored output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn color_choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto | ColorMode::Never => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// 0: one line per test; 1: adds failure and skip reasons; 2: adds the
    /// failed and skipped test listings.
    pub verbosity: u8,
    /// Directories scanned for suite files.
    pub dirs: Vec<PathBuf>,
    /// Glob matched against suite file names.
    pub pattern: String,
    pub color: ColorMode,
    /// Shell used to run suite commands, invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Treat expected failures as failing the run.
    pub strict_expected_failures: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            verbosity: MAX_VERBOSITY,
            dirs: vec![PathBuf::from(".")],
            pattern: "*_test.yaml".to_string(),
            color: ColorMode::Auto,
            shell: "sh".to_string(),
            strict_expected_failures: false,
        }
    }
}

/// Values given on the command line; `None` and empty leave the file's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub verbosity: Option<u8>,
    pub dirs: Vec<PathBuf>,
    pub pattern: Option<String>,
    pub color: Option<ColorMode>,
    pub strict_expected_failures: bool,
}

impl RunnerConfig {
    /// Reads a configuration file. Relative `dirs` are resolved against the
    /// file's own directory.
    pub fn load(path: &Path) -> Result<Self, IntegrateError> {
        let source = fs::read_to_string(path).map_err(|e| config_err!(path, e))?;
        let mut config: RunnerConfig =
            serde_yaml::from_str(&source).map_err(|e| config_err!(path, e))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.dirs = config
                .dirs
                .into_iter()
                .map(|dir| if dir.is_relative() { base.join(dir) } else { dir })
                .collect();
        }
        config.validate(path)?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Loads `explicit` if given, else `integrate.yaml` from the working
    /// directory if it exists, else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, IntegrateError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn apply(&mut self, overrides: Overrides) -> Result<(), IntegrateError> {
        if let Some(verbosity) = overrides.verbosity {
            self.verbosity = verbosity;
        }
        if !overrides.dirs.is_empty() {
            self.dirs = overrides.dirs;
        }
        if let Some(pattern) = overrides.pattern {
            self.pattern = pattern;
        }
        if let Some(color) = overrides.color {
            self.color = color;
        }
        self.strict_expected_failures |= overrides.strict_expected_failures;
        self.validate(Path::new("<command line>"))
    }

    fn validate(&self, origin: &Path) -> Result<(), IntegrateError> {
        if self.verbosity > MAX_VERBOSITY {
            return Err(config_err!(
                origin,
                "verbosity must be between 0 and {}, got {}",
                MAX_VERBOSITY,
                self.verbosity
            ));
        }
        if self.dirs.is_empty() {
            return Err(config_err!(origin, "at least one suite directory is required"));
        }
        if self.pattern.is_empty() {
            return Err(config_err!(origin, "the suite file pattern is empty"));
        }
        if self.shell.trim().is_empty() {
            return Err(config_err!(origin, "the shell is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = RunnerConfig::default();
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.dirs, vec![PathBuf::from(".")]);
        assert_eq!(config.pattern, "*_test.yaml");
        assert_eq!(config.shell, "sh");
        assert!(!config.strict_expected_failures);
    }

    #[test]
    fn file_values_fill_in_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integrate.yaml");
        fs::write(&path, "verbosity: 0\ndirs: [suites]\ncolor: never\n").unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.dirs, vec![dir.path().join("suites")]);
        assert_eq!(config.color, ColorMode::Never);
        assert_eq!(config.pattern, "*_test.yaml");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integrate.yaml");
        fs::write(&path, "verbose: 1\n").unwrap();

        let err = RunnerConfig::load(&path).unwrap_err();
        assert!(matches!(err, IntegrateError::Config { .. }));
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn overrides_win_and_are_validated() {
        let mut config = RunnerConfig::default();
        config
            .apply(Overrides {
                verbosity: Some(1),
                dirs: vec![PathBuf::from("it")],
                strict_expected_failures: true,
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.dirs, vec![PathBuf::from("it")]);
        assert!(config.strict_expected_failures);

        let err = config
            .apply(Overrides {
                verbosity: Some(5),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("between 0 and 2, got 5"));
    }

    #[test]
    fn never_disables_color() {
        assert_eq!(ColorMode::Never.color_choice(), ColorChoice::Never);
        assert_eq!(ColorMode::Always.color_choice(), ColorChoice::Always);
    }
}
