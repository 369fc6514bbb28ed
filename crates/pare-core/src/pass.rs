//! # Reduction Passes
//!
//! A pass is one removal strategy: it says *what* is removable in the current
//! artifact and *how* to remove a chosen subset. The bisector never looks
//! inside a pass; it only partitions the target list the pass enumerates.
//!
//! Targets are enumerated fresh every time a pass runs, since earlier
//! removals change what exists.

use crate::repair::{self, Repair};
use crate::{Artifact, ElementId, PareError};

// =============================================================================
// TARGET
// =============================================================================

/// A unit a pass considers for removal: one element or a group treated as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Elements removed together.
    pub elements: Vec<ElementId>,
    /// Human-readable label for the chunk index reference.
    pub label: String,
}

impl Target {
    /// Target covering a single element.
    #[must_use]
    pub fn single(id: ElementId, label: impl Into<String>) -> Self {
        Self {
            elements: vec![id],
            label: label.into(),
        }
    }

    /// The target restricted to elements still live in `artifact`, or `None`
    /// when nothing of it survives.
    #[must_use]
    pub fn retain_live(&self, artifact: &Artifact) -> Option<Target> {
        let elements: Vec<ElementId> = self
            .elements
            .iter()
            .copied()
            .filter(|id| artifact.contains(*id))
            .collect();

        if elements.is_empty() {
            None
        } else {
            Some(Target {
                elements,
                label: self.label.clone(),
            })
        }
    }
}

/// Flatten a slice of targets into the element ids they cover.
#[must_use]
pub fn element_ids(targets: &[Target]) -> Vec<ElementId> {
    targets
        .iter()
        .flat_map(|t| t.elements.iter().copied())
        .collect()
}

/// `index: label` lines, 1-based, for the chunk index reference.
#[must_use]
pub fn chunk_index_reference(targets: &[Target]) -> Vec<String> {
    targets
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}: {}", i + 1, t.label))
        .collect()
}

// =============================================================================
// REDUCTIONPASS TRAIT
// =============================================================================

/// Capability contract of a removal strategy.
///
/// Passes must be `Send + Sync`: trials of one partition may be prepared
/// while other trials are still in flight.
pub trait ReductionPass: Send + Sync {
    /// Stable name used on the command line and in reports.
    fn name(&self) -> &'static str;

    /// One-line description of the strategy.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Ordered list of removable targets in `artifact`.
    fn enumerate(&self, artifact: &Artifact) -> Vec<Target>;

    /// Remove `ids` from `artifact`, producing a new version.
    ///
    /// The default delegates to consistency repair. A pass may rewrite the
    /// artifact first, as long as it finishes with a repair.
    fn apply_removal(&self, artifact: &Artifact, ids: &[ElementId]) -> Result<Repair, PareError> {
        repair::remove(artifact, ids)
    }
}

// =============================================================================
// BUILT-IN PASSES
// =============================================================================

/// Removes whole top-level definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevelPass;

impl ReductionPass for TopLevelPass {
    fn name(&self) -> &'static str {
        "top-level"
    }

    fn description(&self) -> &'static str {
        "Remove whole top-level definitions"
    }

    fn enumerate(&self, artifact: &Artifact) -> Vec<Target> {
        artifact
            .roots()
            .iter()
            .filter_map(|id| artifact.get(*id))
            .map(|e| Target::single(e.id, e.name.clone()))
            .collect()
    }
}

/// Removes nested sub-elements at any depth, in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedPass;

impl ReductionPass for NestedPass {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn description(&self) -> &'static str {
        "Remove nested sub-elements"
    }

    fn enumerate(&self, artifact: &Artifact) -> Vec<Target> {
        artifact
            .preorder()
            .into_iter()
            .filter_map(|id| artifact.get(id))
            .filter(|e| !e.is_top_level())
            .map(|e| Target::single(e.id, e.name.clone()))
            .collect()
    }
}

/// Removes leaf elements nothing refers to.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreferencedPass;

impl ReductionPass for UnreferencedPass {
    fn name(&self) -> &'static str {
        "unreferenced"
    }

    fn description(&self) -> &'static str {
        "Remove leaf elements without incoming references"
    }

    fn enumerate(&self, artifact: &Artifact) -> Vec<Target> {
        let incoming = artifact.incoming_counts();
        artifact
            .preorder()
            .into_iter()
            .filter_map(|id| artifact.get(id))
            .filter(|e| e.children.is_empty())
            .filter(|e| incoming.get(&e.id).copied().unwrap_or(0) == 0)
            .map(|e| Target::single(e.id, e.name.clone()))
            .collect()
    }
}

/// Names accepted by [`pass_by_name`], in default order.
pub const PASS_NAMES: &[&str] = &["top-level", "nested", "unreferenced"];

/// Look up a built-in pass.
#[must_use]
pub fn pass_by_name(name: &str) -> Option<Box<dyn ReductionPass>> {
    match name {
        "top-level" => Some(Box::new(TopLevelPass)),
        "nested" => Some(Box::new(NestedPass)),
        "unreferenced" => Some(Box::new(UnreferencedPass)),
        _ => None,
    }
}

/// The default pass list, coarse to fine.
#[must_use]
pub fn default_passes() -> Vec<Box<dyn ReductionPass>> {
    vec![
        Box::new(TopLevelPass),
        Box::new(NestedPass),
        Box::new(UnreferencedPass),
    ]
}

// =============================================================================
// TESTS
// =============================================================================
