//! # Chunk Bisector
//!
//! Minimizing delta debugging over the target list of one pass.
//!
//! 1. Partition the `N` live targets into `C` chunks of `ceil(N / C)`.
//! 2. For each chunk in order, remove it through the pass (consistency
//!    repair included) and ask the oracle about the result.
//! 3. The first interesting chunk in list order is committed; targets are
//!    filtered to those still live and the chunk count follows the
//!    [`GranularityPolicy`] (reset to the initial count by default).
//! 4. When no chunk of a partition succeeds, the chunk count doubles, up to
//!    one target per chunk. When singletons fail too, the pass has converged.
//!
//! Up to `jobs` trials of one partition run concurrently in a sliding window
//! anchored at the lowest unresolved chunk. A chunk is committed only once
//! every chunk before it has been rejected, so the outcome matches the
//! sequential order. Remaining in-flight trials are aborted on commit, which
//! kills their test processes.

use crate::budget::Budget;
use crate::oracle::{Oracle, Verdict};
use pare_core::{Artifact, Chunk, GranularityPolicy, ReductionPass, Target, partition};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// =============================================================================
// STATISTICS
// =============================================================================

/// Counters for the trials of one bisection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrialStats {
    /// Trials that produced a verdict (cached ones included).
    pub trials: u64,
    /// Trials committed.
    pub accepted: u64,
    /// Trials forced to not-interesting by an infrastructure failure.
    pub infra_failures: u64,
    /// Chunks skipped because repair reported an anomaly.
    pub repair_anomalies: u64,
    /// Verdicts answered from the cache.
    pub cache_hits: u64,
}

impl TrialStats {
    fn record(&mut self, verdict: &Verdict) {
        self.trials = self.trials.saturating_add(1);
        if verdict.cached {
            self.cache_hits = self.cache_hits.saturating_add(1);
        }
        if verdict.is_infra_failure() {
            self.infra_failures = self.infra_failures.saturating_add(1);
        }
    }

    /// Add another set of counters to this one.
    pub fn absorb(&mut self, other: &TrialStats) {
        self.trials = self.trials.saturating_add(other.trials);
        self.accepted = self.accepted.saturating_add(other.accepted);
        self.infra_failures = self.infra_failures.saturating_add(other.infra_failures);
        self.repair_anomalies = self.repair_anomalies.saturating_add(other.repair_anomalies);
        self.cache_hits = self.cache_hits.saturating_add(other.cache_hits);
    }
}

/// Result of minimizing one target list.
#[derive(Debug, Clone)]
pub struct BisectOutcome {
    /// Latest committed artifact (the input when nothing was removed).
    pub artifact: Artifact,
    /// Targets still live in `artifact`.
    pub targets: Vec<Target>,
    /// Trial counters.
    pub stats: TrialStats,
    /// The budget ran out before the list converged.
    pub interrupted: bool,
}

// =============================================================================
// BISECTOR
// =============================================================================

/// Outcome of evaluating one partition.
enum PartitionResult {
    /// Chunk `index` was removed; `artifact` is the committed trial.
    Accepted { index: usize, artifact: Artifact },
    /// Every chunk was rejected.
    Rejected,
    /// The budget stopped the partition before it was decided.
    Interrupted,
}

enum Slot {
    Pending,
    Rejected,
    Accepted(Artifact),
}

/// ddmin driver over an oracle.
pub struct Bisector {
    oracle: Arc<dyn Oracle>,
    policy: GranularityPolicy,
    jobs: usize,
    budget: Arc<Budget>,
}

impl Bisector {
    pub fn new(oracle: Arc<dyn Oracle>, policy: GranularityPolicy, budget: Arc<Budget>) -> Self {
        Self {
            oracle,
            policy,
            jobs: 1,
            budget,
        }
    }

    /// Number of trials evaluated concurrently (at least 1).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Minimize `targets` of `pass` over `artifact`.
    ///
    /// The returned artifact is either the input or a trial the oracle judged
    /// interesting.
    pub async fn minimize(
        &self,
        pass: &dyn ReductionPass,
        artifact: Artifact,
        targets: Vec<Target>,
    ) -> BisectOutcome {
        let mut current = artifact;
        let mut targets = targets;
        let mut stats = TrialStats::default();
        let mut interrupted = false;
        let mut chunks = self.policy.start(targets.len());

        while !targets.is_empty() {
            if self.budget.is_exhausted() {
                interrupted = true;
                break;
            }

            let parts = partition(targets.len(), chunks);
            trace!(
                pass = pass.name(),
                targets = targets.len(),
                granularity = parts.len(),
                "bisecting"
            );

            match self
                .try_partition(pass, &current, &targets, &parts, &mut stats)
                .await
            {
                PartitionResult::Accepted { index, artifact } => {
                    let removed = parts[index].range();
                    debug!(
                        pass = pass.name(),
                        chunk = index,
                        removed = removed.len(),
                        size = artifact.size(),
                        "chunk removed"
                    );
                    stats.accepted = stats.accepted.saturating_add(1);
                    current = artifact;
                    targets = targets
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !removed.contains(i))
                        .filter_map(|(_, t)| t.retain_live(&current))
                        .collect();
                    chunks = self.policy.after_success(chunks, targets.len());
                }
                PartitionResult::Rejected => match self.policy.refine(chunks, targets.len()) {
                    Some(finer) => chunks = finer,
                    None => break,
                },
                PartitionResult::Interrupted => {
                    interrupted = true;
                    break;
                }
            }
        }

        BisectOutcome {
            artifact: current,
            targets,
            stats,
            interrupted,
        }
    }

    /// Evaluate the chunks of one partition, committing the lowest
    /// interesting one.
    async fn try_partition(
        &self,
        pass: &dyn ReductionPass,
        current: &Artifact,
        targets: &[Target],
        parts: &[Chunk],
        stats: &mut TrialStats,
    ) -> PartitionResult {
        let mut slots: Vec<Slot> = parts.iter().map(|_| Slot::Pending).collect();
        let mut in_flight: VecDeque<(usize, JoinHandle<(Artifact, Verdict)>)> = VecDeque::new();
        let mut next = 0;
        let mut frontier = 0;
        let mut stopped = false;

        loop {
            while !stopped && in_flight.len() < self.jobs && next < parts.len() {
                if !self.budget.try_acquire() {
                    stopped = true;
                    break;
                }

                let chunk = parts[next];
                let ids = pare_core::pass::element_ids(&targets[chunk.range()]);
                match pass.apply_removal(current, &ids) {
                    Ok(repair) => {
                        let oracle = Arc::clone(&self.oracle);
                        let trial = repair.artifact;
                        let handle = tokio::spawn(async move {
                            let verdict = oracle.check(&trial).await;
                            (trial, verdict)
                        });
                        in_flight.push_back((next, handle));
                    }
                    Err(e) => {
                        warn!(pass = pass.name(), chunk = next, error = %e, "repair anomaly, keeping chunk");
                        stats.repair_anomalies = stats.repair_anomalies.saturating_add(1);
                        slots[next] = Slot::Rejected;
                    }
                }
                next += 1;
            }

            while frontier < slots.len() && matches!(slots[frontier], Slot::Rejected) {
                frontier += 1;
            }
            if frontier == slots.len() {
                return PartitionResult::Rejected;
            }
            if matches!(slots[frontier], Slot::Accepted(_)) {
                for (_, handle) in &in_flight {
                    handle.abort();
                }
                let slot = std::mem::replace(&mut slots[frontier], Slot::Rejected);
                return match slot {
                    Slot::Accepted(artifact) => PartitionResult::Accepted {
                        index: frontier,
                        artifact,
                    },
                    _ => PartitionResult::Rejected,
                };
            }

            let Some((index, handle)) = in_flight.pop_front() else {
                // frontier chunk was never issued
                return PartitionResult::Interrupted;
            };

            match handle.await {
                Ok((trial, verdict)) => {
                    stats.record(&verdict);
                    if let Some(failure) = &verdict.infra {
                        warn!(pass = pass.name(), chunk = index, "trial failed: {}", failure);
                    }
                    slots[index] = if verdict.interesting {
                        Slot::Accepted(trial)
                    } else {
                        Slot::Rejected
                    };
                }
                Err(e) => {
                    warn!(pass = pass.name(), chunk = index, error = %e, "trial task failed");
                    stats.infra_failures = stats.infra_failures.saturating_add(1);
                    slots[index] = Slot::Rejected;
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
