//! # Property-Based Tests
//!
//! Invariants of repair, partitioning and the codecs over generated artifacts.

use pare_core::{
    Artifact, Codec, ElementId, Format, Kind, Operand, Reference, ReductionPass, default_passes,
    partition, repair,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// One generated element: optional parent selector plus (target, required)
/// reference selectors. Selectors are reduced modulo the valid range.
type Blueprint = (Option<usize>, Vec<(usize, bool)>);

fn build(blueprints: &[Blueprint]) -> Artifact {
    let mut b = Artifact::builder();
    let mut ids = Vec::with_capacity(blueprints.len());

    for (i, (parent, _)) in blueprints.iter().enumerate() {
        let parent = match parent {
            Some(p) if i > 0 => Some(ids[p % i]),
            _ => None,
        };
        let id = b
            .element(parent, Kind::new("node"), format!("e{}", i))
            .expect("element");
        ids.push(id);
    }

    for (i, (_, references)) in blueprints.iter().enumerate() {
        for (target, required) in references {
            let mut reference = Reference::to(ids[target % ids.len()]);
            if *required {
                reference = reference.required();
            }
            b.reference(ids[i], reference).expect("reference");
        }
    }

    b.build().expect("build")
}

fn artifact_blueprints() -> impl Strategy<Value = Vec<Blueprint>> {
    vec(
        (
            proptest::option::of(0usize..64),
            vec((0usize..64, any::<bool>()), 0..3),
        ),
        1..40,
    )
}

fn all_references_resolve(artifact: &Artifact) -> bool {
    artifact.elements().all(|e| {
        e.references.iter().all(|r| match r.target {
            Operand::Element(target) => artifact.contains(target),
            Operand::Placeholder => true,
        })
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Repair never leaves an unresolved reference.
    #[test]
    fn repair_leaves_no_dangling_reference(
        blueprints in artifact_blueprints(),
        picks in vec(0usize..64, 0..8)
    ) {
        let artifact = build(&blueprints);
        let ids: Vec<ElementId> = picks.iter().map(|p| ElementId((p % blueprints.len()) as u64)).collect();

        let repaired = repair::remove(&artifact, &ids).expect("repair is total");

        prop_assert!(all_references_resolve(&repaired.artifact));
        prop_assert!(repaired.artifact.validate().is_ok());
    }

    /// Size never grows and removed identifiers are never live again.
    #[test]
    fn repair_shrinks_and_tombstones(
        blueprints in artifact_blueprints(),
        picks in vec(0usize..64, 1..8)
    ) {
        let artifact = build(&blueprints);
        let ids: Vec<ElementId> = picks.iter().map(|p| ElementId((p % blueprints.len()) as u64)).collect();

        let repaired = repair::remove(&artifact, &ids).expect("repair");

        prop_assert!(repaired.artifact.size() < artifact.size());
        prop_assert_eq!(repaired.artifact.next_id(), artifact.next_id());
        for id in &ids {
            prop_assert!(!repaired.artifact.contains(*id));
            prop_assert!(repaired.artifact.is_tombstoned(*id));
        }
        prop_assert_eq!(
            repaired.artifact.size() + repaired.removed.len(),
            artifact.size()
        );
    }

    /// Repair is deterministic and leaves its input untouched.
    #[test]
    fn repair_is_pure(
        blueprints in artifact_blueprints(),
        picks in vec(0usize..64, 0..8)
    ) {
        let artifact = build(&blueprints);
        let before = artifact.clone();
        let ids: Vec<ElementId> = picks.iter().map(|p| ElementId((p % blueprints.len()) as u64)).collect();

        let first = repair::remove(&artifact, &ids).expect("repair");
        let second = repair::remove(&artifact, &ids).expect("repair");

        prop_assert_eq!(&artifact, &before);
        prop_assert_eq!(first.artifact, second.artifact);
        prop_assert_eq!(first.removed, second.removed);
    }

    /// Partitions cover the list in order, with no gaps and no empty chunk.
    #[test]
    fn partition_covers_list(len in 0usize..300, chunks in 0usize..400) {
        let parts = partition(len, chunks);

        let mut next = 0;
        for (i, chunk) in parts.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert_eq!(chunk.start, next);
            prop_assert!(chunk.len() >= 1);
            next = chunk.end;
        }
        prop_assert_eq!(next, len);
        prop_assert!(parts.len() <= chunks.max(1));
    }

    /// Every chunk but the last has the ceiling-division size.
    #[test]
    fn partition_uses_ceiling_size(len in 1usize..300, chunks in 1usize..300) {
        let parts = partition(len, chunks);
        let size = len.div_ceil(chunks.min(len));

        for chunk in &parts[..parts.len() - 1] {
            prop_assert_eq!(chunk.len(), size);
        }
        prop_assert!(parts[parts.len() - 1].len() <= size);
    }

    /// Built-in passes only enumerate live elements, each at most once.
    #[test]
    fn passes_enumerate_live_unique_targets(blueprints in artifact_blueprints()) {
        let artifact = build(&blueprints);

        for pass in default_passes() {
            let targets = pass.enumerate(&artifact);
            let mut seen = BTreeSet::new();
            for target in &targets {
                for id in &target.elements {
                    prop_assert!(artifact.contains(*id));
                    prop_assert!(seen.insert(*id), "{} listed twice by {}", id, pass.name());
                }
            }
        }
    }

    /// Text rendering parses back to the same structure.
    #[test]
    fn outline_render_parse_preserves_structure(blueprints in artifact_blueprints()) {
        let artifact = build(&blueprints);
        let codec = Format::Text.codec();

        let text = codec.render(&artifact).expect("render");
        let parsed = codec.parse(&text).expect("parse");

        prop_assert_eq!(parsed.size(), artifact.size());
        prop_assert_eq!(codec.render(&parsed).expect("render"), text);
    }
}
