//! # Progress Reports
//!
//! Per-pass, per-round and per-session summaries. Every report serializes to
//! JSON for `--json-mode`. Percentages use integer arithmetic only.

use crate::bisect::TrialStats;
use serde::Serialize;

/// Terminal and intermediate states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, seed not yet verified.
    Start,
    /// Rounds in progress.
    RunningRound,
    /// A full round removed nothing.
    Converged,
    /// The trial or time budget ran out (or the run was cancelled).
    Exhausted,
    /// The seed check failed.
    Failed,
}

/// One pass within one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: String,
    pub round: u64,
    pub targets_before: usize,
    pub targets_after: usize,
    pub size_before: usize,
    pub size_after: usize,
    /// The pass enumerated nothing and was not run.
    pub skipped: bool,
    #[serde(flatten)]
    pub stats: TrialStats,
}

impl PassReport {
    /// Report for a pass that had nothing to remove.
    #[must_use]
    pub fn skipped(pass: &str, round: u64, size: usize) -> Self {
        Self {
            pass: pass.to_string(),
            round,
            targets_before: 0,
            targets_after: 0,
            size_before: size,
            size_after: size,
            skipped: true,
            stats: TrialStats::default(),
        }
    }

    /// Elements removed by this pass.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.size_before.saturating_sub(self.size_after)
    }
}

/// One full round over every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    pub round: u64,
    pub size_before: usize,
    pub size_after: usize,
    pub passes: Vec<PassReport>,
}

impl RoundReport {
    /// The round shrank the artifact.
    #[must_use]
    pub fn made_progress(&self) -> bool {
        self.size_after < self.size_before
    }
}

/// Outcome of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub state: SessionState,
    pub original_size: usize,
    pub final_size: usize,
    /// Reference slots in the output left as placeholders.
    pub placeholders: usize,
    pub rounds: Vec<RoundReport>,
    /// Trial counters summed over every pass (seed check excluded).
    #[serde(flatten)]
    pub stats: TrialStats,
    /// Artifact size after the seed check and after every round.
    pub size_history: Vec<usize>,
    pub elapsed_ms: u64,
}

impl SessionReport {
    /// The output is smaller than the input.
    #[must_use]
    pub fn reduced(&self) -> bool {
        self.final_size < self.original_size
    }

    /// Size reduction in whole percent, rounded down.
    #[must_use]
    pub fn reduction_percent(&self) -> u64 {
        if self.original_size == 0 {
            return 0;
        }
        let removed = self.original_size.saturating_sub(self.final_size) as u64;
        removed.saturating_mul(100) / self.original_size as u64
    }

    /// Trials ran, and every one of them failed for infrastructure reasons.
    #[must_use]
    pub fn only_infra_failures(&self) -> bool {
        self.stats.trials > 0 && self.stats.infra_failures == self.stats.trials
    }

    /// Final human-readable message.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut message = if self.reduced() {
            format!(
                "reduced to {} elements ({}% smaller)",
                self.final_size,
                self.reduction_percent()
            )
        } else {
            "no reduction possible: output equals input".to_string()
        };

        if self.only_infra_failures() {
            message.push_str(&format!(
                "; all {} trials failed to run the test",
                self.stats.trials
            ));
        }
        if self.state == SessionState::Exhausted {
            message.push_str(" (budget exhausted before convergence)");
        }
        message
    }
}
