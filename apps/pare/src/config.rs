//! # Configuration
//!
//! One immutable [`ReduceConfig`] value describes a run. It is built from an
//! optional TOML file, then overridden by command-line flags, validated once,
//! and threaded into the session. Nothing reads process-wide state after that.

use crate::error::SetupError;
use pare_core::{Format, GranularityPolicy, ReductionPass, default_passes, pass_by_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-trial timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Marker in a test argument replaced by the candidate path.
pub const CANDIDATE_PLACEHOLDER: &str = "{}";

/// Complete configuration of one reduction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// The interestingness test.
    pub oracle: OracleConfig,

    /// Artifact format; guessed from the input extension when unset.
    pub format: Option<Format>,

    /// Trials of one partition evaluated concurrently.
    pub jobs: usize,

    /// Session-wide trial budget.
    pub max_trials: Option<u64>,

    /// Session-wide wall-clock budget in seconds.
    pub max_time_secs: Option<u64>,

    /// Chunk-count schedule of the bisector.
    pub granularity: GranularityPolicy,

    /// Pass names in execution order. Empty means the default list.
    pub passes: Vec<String>,

    /// Skip the oracle for candidate bytes already judged.
    pub cache: bool,

    /// Parent directory for the per-session trial directory.
    pub tmp_dir: Option<PathBuf>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            format: None,
            jobs: 1,
            max_trials: None,
            max_time_secs: None,
            granularity: GranularityPolicy::default(),
            passes: Vec::new(),
            cache: true,
            tmp_dir: None,
        }
    }
}

/// External interestingness test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Executable to run.
    pub program: PathBuf,

    /// Extra arguments. An argument containing `{}` receives the candidate
    /// path; if none does, the path is appended last.
    pub args: Vec<String>,

    /// Per-trial timeout in seconds.
    pub timeout_secs: u64,

    /// Working directory of the test process.
    pub working_dir: Option<PathBuf>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::new(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            working_dir: None,
        }
    }
}

impl OracleConfig {
    /// Per-trial timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Argument list for one candidate path.
    #[must_use]
    pub fn arguments_for(&self, candidate: &Path) -> Vec<String> {
        let path = candidate.to_string_lossy();
        let mut substituted = false;

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(CANDIDATE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(CANDIDATE_PLACEHOLDER, &path)
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(path.into_owned());
        }
        args
    }
}

impl ReduceConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, SetupError> {
        toml::from_str(text).map_err(|e| SetupError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SetupError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the values that have no meaningful default.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.oracle.program.as_os_str().is_empty() {
            return Err(SetupError::Config(
                "no interestingness test given (use --test)".to_string(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(SetupError::Config("timeout must be at least 1 second".to_string()));
        }
        if self.jobs == 0 {
            return Err(SetupError::Config("jobs must be at least 1".to_string()));
        }
        if self.max_trials == Some(0) {
            return Err(SetupError::Config("max-trials must be at least 1".to_string()));
        }
        self.resolve_passes().map(|_| ())
    }

    /// Session-wide wall-clock budget.
    #[must_use]
    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_secs.map(Duration::from_secs)
    }

    /// Format for `input`: the configured one, else by extension.
    #[must_use]
    pub fn format_for(&self, input: &Path) -> Format {
        self.format.unwrap_or_else(|| Format::from_path(input))
    }

    /// Instantiate the configured pass list.
    pub fn resolve_passes(&self) -> Result<Vec<Box<dyn ReductionPass>>, SetupError> {
        if self.passes.is_empty() {
            return Ok(default_passes());
        }

        self.passes
            .iter()
            .map(|name| {
                pass_by_name(name).ok_or_else(|| {
                    SetupError::Config(format!(
                        "unknown pass '{}'. Use: {}",
                        name,
                        pare_core::PASS_NAMES.join(", ")
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(args: &[&str]) -> OracleConfig {
        OracleConfig {
            program: PathBuf::from("./test.sh"),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..OracleConfig::default()
        }
    }

    #[test]
    fn candidate_path_appended_last() {
        let args = oracle(&["--crash"]).arguments_for(Path::new("/tmp/t/trial.pare"));
        assert_eq!(args, vec!["--crash", "/tmp/t/trial.pare"]);
    }

    #[test]
    fn candidate_path_substituted() {
        let args = oracle(&["--input={}", "-q"]).arguments_for(Path::new("/tmp/c.pare"));
        assert_eq!(args, vec!["--input=/tmp/c.pare", "-q"]);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = ReduceConfig::from_toml_str(
            r#"
            jobs = 4
            passes = ["nested"]
            cache = false

            [oracle]
            program = "./interesting.sh"
            args = ["{}"]
            timeout_secs = 5

            [granularity]
            initial_chunks = 8
            "#,
        )
        .expect("parse");

        assert_eq!(config.jobs, 4);
        assert!(!config.cache);
        assert_eq!(config.oracle.timeout(), Duration::from_secs(5));
        assert_eq!(config.granularity.initial_chunks, 8);
        assert!(config.granularity.reset_on_success);
        assert_eq!(config.resolve_passes().expect("passes").len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_test_and_unknown_pass() {
        assert!(matches!(
            ReduceConfig::default().validate(),
            Err(SetupError::Config(_))
        ));

        let config = ReduceConfig {
            oracle: oracle(&[]),
            passes: vec!["bogus".to_string()],
            ..ReduceConfig::default()
        };
        assert!(matches!(config.validate(), Err(SetupError::Config(_))));
    }

    #[test]
    fn format_defaults_to_extension() {
        let config = ReduceConfig::default();
        assert_eq!(config.format_for(Path::new("x.json")), Format::Json);
        let forced = ReduceConfig {
            format: Some(Format::Text),
            ..ReduceConfig::default()
        };
        assert_eq!(forced.format_for(Path::new("x.json")), Format::Text);
    }

    #[test]
    fn unknown_toml_field_types_are_errors() {
        assert!(ReduceConfig::from_toml_str("jobs = \"many\"").is_err());
    }
}
