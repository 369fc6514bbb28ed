//! # Session Driver
//!
//! Holds the best-known artifact and runs the pass list over rounds until a
//! round removes nothing.
//!
//! ```text
//! Start --seed interesting--> RunningRound --size decreased--> RunningRound
//!   |                              |--size unchanged--> Converged
//!   |                              |--budget spent----> Exhausted
//!   +--seed rejected / infra failure--> Failed
//! ```
//!
//! The best-known artifact is only ever replaced by a bisection outcome, which
//! is either unchanged or a trial the oracle judged interesting. Commits
//! happen here, one pass at a time.

use crate::bisect::{Bisector, TrialStats};
use crate::budget::Budget;
use crate::error::SetupError;
use crate::oracle::Oracle;
use crate::report::{PassReport, RoundReport, SessionReport, SessionState};
use pare_core::{Artifact, GranularityPolicy, ReductionPass, Target};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tunables of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub policy: GranularityPolicy,
    pub jobs: usize,
    pub max_trials: Option<u64>,
    pub max_time: Option<Duration>,
}

/// Progress notifications delivered while a session runs.
#[derive(Debug)]
pub enum Progress<'a> {
    /// A pass is about to bisect `targets`.
    PassStarted {
        round: u64,
        pass: &'a str,
        description: &'a str,
        targets: &'a [Target],
    },
    /// A pass finished (or was skipped).
    PassFinished(&'a PassReport),
    /// A round finished.
    RoundFinished(&'a RoundReport),
}

type Observer = Box<dyn Fn(Progress<'_>) + Send + Sync>;

/// One reduction run.
pub struct Session {
    best: Artifact,
    original_size: usize,
    passes: Vec<Box<dyn ReductionPass>>,
    oracle: Arc<dyn Oracle>,
    options: SessionOptions,
    budget: Arc<Budget>,
    state: SessionState,
    round: u64,
    rounds: Vec<RoundReport>,
    stats: TrialStats,
    size_history: Vec<usize>,
    observer: Option<Observer>,
}

impl Session {
    /// Create a session over a parsed seed.
    pub fn new(
        seed: Artifact,
        oracle: Arc<dyn Oracle>,
        passes: Vec<Box<dyn ReductionPass>>,
        options: SessionOptions,
    ) -> Self {
        let budget = Arc::new(Budget::new(options.max_trials, options.max_time));
        Self {
            original_size: seed.size(),
            best: seed,
            passes,
            oracle,
            options,
            budget,
            state: SessionState::Start,
            round: 0,
            rounds: Vec::new(),
            stats: TrialStats::default(),
            size_history: Vec::new(),
            observer: None,
        }
    }

    /// Receive progress notifications.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(Progress<'_>) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Shared budget; cancelling it stops the session cooperatively.
    #[must_use]
    pub fn budget(&self) -> Arc<Budget> {
        Arc::clone(&self.budget)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Best-known interesting artifact.
    #[must_use]
    pub fn best(&self) -> &Artifact {
        &self.best
    }

    /// Consume the session, returning the best-known artifact.
    #[must_use]
    pub fn into_best(self) -> Artifact {
        self.best
    }

    fn notify(&self, progress: Progress<'_>) {
        if let Some(observer) = &self.observer {
            observer(progress);
        }
    }

    /// Check that the seed is interesting. Runs once; later calls are no-ops.
    pub async fn verify_seed(&mut self) -> Result<(), SetupError> {
        if self.state != SessionState::Start {
            return Ok(());
        }

        let verdict = self.oracle.check(&self.best).await;
        if let Some(failure) = verdict.infra {
            self.state = SessionState::Failed;
            return Err(SetupError::SeedInfraFailure(failure));
        }
        if !verdict.interesting {
            self.state = SessionState::Failed;
            return Err(SetupError::SeedRejected(verdict.exit_code.unwrap_or(1)));
        }

        info!(size = self.best.size(), "original input is interesting");
        self.size_history.push(self.best.size());
        self.state = SessionState::RunningRound;
        Ok(())
    }

    /// Verify the seed, then run rounds to a fixpoint or until the budget is
    /// spent.
    pub async fn run(&mut self) -> Result<SessionReport, SetupError> {
        let started = Instant::now();
        self.verify_seed().await?;

        let bisector = Bisector::new(
            Arc::clone(&self.oracle),
            self.options.policy,
            Arc::clone(&self.budget),
        )
        .with_jobs(self.options.jobs);

        while self.state == SessionState::RunningRound {
            self.run_round(&bisector).await;
        }

        Ok(self.report(started.elapsed()))
    }

    async fn run_round(&mut self, bisector: &Bisector) {
        self.round = self.round.saturating_add(1);
        let round = self.round;
        let size_before = self.best.size();
        let mut passes = Vec::with_capacity(self.passes.len());
        let mut interrupted = false;

        info!(round, size = size_before, "round started");

        for pass in &self.passes {
            let size = self.best.size();
            let targets = pass.enumerate(&self.best);
            if targets.is_empty() {
                debug!(round, pass = pass.name(), "no targets, skipping pass");
                let report = PassReport::skipped(pass.name(), round, size);
                self.notify(Progress::PassFinished(&report));
                passes.push(report);
                continue;
            }

            self.notify(Progress::PassStarted {
                round,
                pass: pass.name(),
                description: pass.description(),
                targets: &targets,
            });
            debug!(
                round,
                pass = pass.name(),
                "chunk index reference:\n{}",
                pare_core::pass::chunk_index_reference(&targets).join("\n")
            );

            let targets_before = targets.len();
            let outcome = bisector
                .minimize(pass.as_ref(), self.best.clone(), targets)
                .await;
            self.best = outcome.artifact;
            self.stats.absorb(&outcome.stats);

            let report = PassReport {
                pass: pass.name().to_string(),
                round,
                targets_before,
                targets_after: outcome.targets.len(),
                size_before: size,
                size_after: self.best.size(),
                skipped: false,
                stats: outcome.stats,
            };
            info!(
                round,
                pass = pass.name(),
                targets_before = report.targets_before,
                targets_after = report.targets_after,
                removed = report.removed(),
                trials = report.stats.trials,
                "pass finished"
            );
            self.notify(Progress::PassFinished(&report));
            passes.push(report);

            if outcome.interrupted {
                interrupted = true;
                break;
            }
        }

        let size_after = self.best.size();
        self.size_history.push(size_after);
        let report = RoundReport {
            round,
            size_before,
            size_after,
            passes,
        };
        self.notify(Progress::RoundFinished(&report));

        self.state = if interrupted {
            warn!(round, size = size_after, "budget exhausted, stopping");
            SessionState::Exhausted
        } else if report.made_progress() {
            SessionState::RunningRound
        } else {
            info!(round, size = size_after, "converged");
            SessionState::Converged
        };
        self.rounds.push(report);
    }

    fn report(&self, elapsed: Duration) -> SessionReport {
        SessionReport {
            state: self.state,
            original_size: self.original_size,
            final_size: self.best.size(),
            placeholders: self.best.placeholder_count(),
            rounds: self.rounds.clone(),
            stats: self.stats,
            size_history: self.size_history.clone(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
