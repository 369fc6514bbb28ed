//! # Error Taxonomy
//!
//! Two tiers:
//! - [`SetupError`] is fatal. It aborts the run before any output is written
//!   and maps to a non-zero exit code.
//! - [`InfraFailure`] is per trial and recoverable. The trial counts as not
//!   interesting and the session carries on.
//!
//! Repair anomalies stay [`pare_core::PareError`] values; the bisector treats
//! them as "chunk not removable".

use pare_core::PareError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Reasons a trial could not produce a genuine verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfraFailure {
    /// The test executable could not be started.
    #[error("failed to run '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The test did not finish within the per-trial timeout and was killed.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The test ended without an exit code (killed by a signal).
    #[error("test terminated without an exit code")]
    Signal,

    /// The candidate could not be rendered or written to disk.
    #[error("could not prepare candidate: {0}")]
    Candidate(String),
}

/// Fatal preconditions that stop a run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot read input '{}': {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("input '{}' is {size} bytes, above the {limit} byte limit", path.display())]
    InputTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("cannot parse input: {0}")]
    Parse(#[from] PareError),

    #[error("original input is not interesting: the test exited with code {0}")]
    SeedRejected(i32),

    #[error("cannot run the test on the original input: {0}")]
    SeedInfraFailure(InfraFailure),

    #[error("cannot write output '{}': {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot create trial directory: {0}")]
    TrialDirectory(String),
}
