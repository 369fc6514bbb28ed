//! # Oracle Invoker
//!
//! Judges whether a candidate artifact is still interesting.
//!
//! [`ExternalOracle`] renders the candidate into a uniquely named file inside
//! a per-session trial directory, runs the configured test with the path
//! substituted into its arguments, and waits up to the per-trial timeout.
//!
//! | Outcome                      | Verdict                           |
//! |------------------------------|-----------------------------------|
//! | exit code 0                  | interesting                       |
//! | any other exit code          | not interesting                   |
//! | spawn failure, timeout, signal | not interesting + infra failure |

use crate::config::OracleConfig;
use crate::error::{InfraFailure, SetupError};
use async_trait::async_trait;
use pare_core::{Artifact, Codec, fingerprint};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

// =============================================================================
// VERDICT
// =============================================================================

/// Judgment of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The candidate still reproduces the condition.
    pub interesting: bool,
    /// Exit code of the test, when it ran to completion.
    pub exit_code: Option<i32>,
    /// Set when the test could not produce a genuine answer.
    pub infra: Option<InfraFailure>,
    /// Answered from the verdict cache without running the test.
    pub cached: bool,
}

impl Verdict {
    /// Verdict from a completed test run.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self {
            interesting: code == 0,
            exit_code: Some(code),
            infra: None,
            cached: false,
        }
    }

    /// Genuine verdict without an exit code, for in-process oracles.
    #[must_use]
    pub fn judged(interesting: bool) -> Self {
        Self {
            interesting,
            exit_code: None,
            infra: None,
            cached: false,
        }
    }

    /// Forced not-interesting verdict after an infrastructure failure.
    #[must_use]
    pub fn failed(failure: InfraFailure) -> Self {
        Self {
            interesting: false,
            exit_code: None,
            infra: Some(failure),
            cached: false,
        }
    }

    /// True when the test could not be run.
    #[must_use]
    pub fn is_infra_failure(&self) -> bool {
        self.infra.is_some()
    }
}

// =============================================================================
// ORACLE TRAIT
// =============================================================================

/// Interestingness judgment for candidate artifacts.
///
/// Implementations must tolerate concurrent calls: the bisector may evaluate
/// several chunks of one partition at once.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Judge one candidate. Never fails; problems become infra verdicts.
    async fn check(&self, artifact: &Artifact) -> Verdict;
}

/// In-process oracle backed by a predicate. Useful when embedding pare as a
/// library.
pub struct PredicateOracle<F> {
    predicate: F,
}

impl<F> PredicateOracle<F>
where
    F: Fn(&Artifact) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> Oracle for PredicateOracle<F>
where
    F: Fn(&Artifact) -> bool + Send + Sync,
{
    async fn check(&self, artifact: &Artifact) -> Verdict {
        Verdict::judged((self.predicate)(artifact))
    }
}

// =============================================================================
// EXTERNAL ORACLE
// =============================================================================

/// Runs an external executable on rendered candidates.
pub struct ExternalOracle {
    config: OracleConfig,
    codec: Box<dyn Codec>,
    trial_dir: TempDir,
    cache: Option<Mutex<BTreeMap<String, bool>>>,
}

impl ExternalOracle {
    /// Create the oracle and its trial directory (under `tmp_parent` when
    /// given, else the system temp directory).
    pub fn new(
        config: OracleConfig,
        codec: Box<dyn Codec>,
        tmp_parent: Option<&Path>,
    ) -> Result<Self, SetupError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pare-");
        let trial_dir = match tmp_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| SetupError::TrialDirectory(e.to_string()))?;

        debug!(dir = %trial_dir.path().display(), "created trial directory");

        Ok(Self {
            config,
            codec,
            trial_dir,
            cache: Some(Mutex::new(BTreeMap::new())),
        })
    }

    /// Disable or enable the verdict cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = if enabled {
            Some(Mutex::new(BTreeMap::new()))
        } else {
            None
        };
        self
    }

    /// Directory holding trial files for this session.
    #[must_use]
    pub fn trial_dir(&self) -> &Path {
        self.trial_dir.path()
    }

    fn cached(&self, key: &str) -> Option<bool> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(key).copied()
    }

    fn remember(&self, key: String, interesting: bool) {
        if let Some(cache) = &self.cache {
            if let Ok(mut map) = cache.lock() {
                map.insert(key, interesting);
            }
        }
    }

    /// Write `bytes` to a fresh file in the trial directory.
    fn write_candidate(&self, bytes: &[u8]) -> Result<tempfile::NamedTempFile, InfraFailure> {
        let suffix = format!(".{}", self.codec.extension());
        let mut file = tempfile::Builder::new()
            .prefix("trial-")
            .suffix(&suffix)
            .tempfile_in(self.trial_dir.path())
            .map_err(|e| InfraFailure::Candidate(e.to_string()))?;

        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| InfraFailure::Candidate(e.to_string()))?;
        Ok(file)
    }

    /// Run the test on one candidate file.
    async fn run(&self, candidate: &Path) -> Verdict {
        let program = self.config.program.display().to_string();
        let args = self.config.arguments_for(candidate);
        trace!(program = %program, ?args, "running test");

        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Verdict::failed(InfraFailure::Spawn {
                    program,
                    message: e.to_string(),
                });
            }
        };

        let limit = self.config.timeout();
        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => match status.code() {
                Some(code) => Verdict::exited(code),
                None => Verdict::failed(InfraFailure::Signal),
            },
            Ok(Err(e)) => Verdict::failed(InfraFailure::Spawn {
                program,
                message: e.to_string(),
            }),
            Err(_) => {
                warn!(program = %program, "test timed out after {:?}", limit);
                // Kill the process on timeout
                if let Err(e) = child.kill().await {
                    debug!(program = %program, error = %e, "failed to kill timed-out test");
                }
                Verdict::failed(InfraFailure::Timeout(limit))
            }
        }
    }
}

#[async_trait]
impl Oracle for ExternalOracle {
    async fn check(&self, artifact: &Artifact) -> Verdict {
        let bytes = match self.codec.render(artifact) {
            Ok(bytes) => bytes,
            Err(e) => return Verdict::failed(InfraFailure::Candidate(e.to_string())),
        };

        let key = fingerprint(&bytes);
        if let Some(interesting) = self.cached(&key) {
            trace!(fingerprint = %key, interesting, "verdict cache hit");
            return Verdict {
                cached: true,
                ..Verdict::judged(interesting)
            };
        }

        let file = match self.write_candidate(&bytes) {
            Ok(file) => file,
            Err(failure) => return Verdict::failed(failure),
        };

        let verdict = self.run(file.path()).await;
        if !verdict.is_infra_failure() {
            self.remember(key, verdict.interesting);
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pare_core::{Format, Kind};

    fn artifact() -> Artifact {
        let mut b = Artifact::builder();
        b.element(None, Kind::new("fn"), "main").expect("main");
        b.build().expect("build")
    }

    #[test]
    fn verdict_from_exit_code() {
        assert!(Verdict::exited(0).interesting);
        assert!(!Verdict::exited(1).interesting);
        assert!(!Verdict::exited(1).is_infra_failure());

        let failed = Verdict::failed(InfraFailure::Signal);
        assert!(!failed.interesting);
        assert!(failed.is_infra_failure());
    }

    #[tokio::test]
    async fn predicate_oracle_judges_in_process() {
        let oracle = PredicateOracle::new(|a: &Artifact| a.by_name("main").is_some());
        assert!(oracle.check(&artifact()).await.interesting);
        assert!(!oracle.check(&Artifact::new()).await.interesting);
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let config = OracleConfig {
            program: "/nonexistent/pare-test-oracle".into(),
            ..OracleConfig::default()
        };
        let oracle = ExternalOracle::new(config, Format::Text.codec(), None).expect("oracle");

        let verdict = oracle.check(&artifact()).await;
        assert!(!verdict.interesting);
        assert!(matches!(verdict.infra, Some(InfraFailure::Spawn { .. })));

        // infra failures are never cached
        let again = oracle.check(&artifact()).await;
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn trial_directory_removed_on_drop() {
        let parent = tempfile::tempdir().expect("tempdir");
        let oracle = ExternalOracle::new(
            OracleConfig::default(),
            Format::Text.codec(),
            Some(parent.path()),
        )
        .expect("oracle");

        let dir = oracle.trial_dir().to_path_buf();
        assert!(dir.starts_with(parent.path()));
        assert!(dir.is_dir());
        drop(oracle);
        assert!(!dir.exists());
    }
}
