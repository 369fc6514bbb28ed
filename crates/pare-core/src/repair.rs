//! # Consistency Repair
//!
//! Produces a structurally valid successor of an artifact after removing a set
//! of elements.
//!
//! 1. Every requested element is tombstoned together with its subtree.
//! 2. Every surviving reference into the tombstoned set becomes a placeholder
//!    of the same shape.
//! 3. A survivor whose *required* reference was just neutralized is tombstoned
//!    too, and step 2 repeats until nothing new dies.
//! 4. Parent/child links and roots are compacted and the result is validated.
//!
//! Repair is deterministic and never touches its input. References that were
//! already placeholders before the call never trigger pruning.

use crate::{Artifact, Element, ElementId, Operand, PareError};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of one repair.
#[derive(Debug, Clone)]
pub struct Repair {
    /// The successor version.
    pub artifact: Artifact,
    /// Every element tombstoned by this repair.
    pub removed: BTreeSet<ElementId>,
    /// Elements removed because they were asked for (subtrees included).
    pub requested: usize,
    /// Elements pruned because a required reference was neutralized.
    pub cascaded: usize,
    /// Reference slots rewritten to placeholders.
    pub placeholders: usize,
}

/// Remove `ids` from `artifact` and repair the result.
///
/// Identifiers that are not live are ignored. Returns
/// [`PareError::RepairAnomaly`] only if the successor fails validation, which
/// would indicate a bug in the repair itself.
pub fn remove(artifact: &Artifact, ids: &[ElementId]) -> Result<Repair, PareError> {
    let mut doomed = BTreeSet::new();
    for id in ids {
        if artifact.contains(*id) {
            doomed.extend(artifact.subtree(*id));
        }
    }
    let requested = doomed.len();

    let mut survivors: BTreeMap<ElementId, Element> = artifact
        .elements()
        .filter(|e| !doomed.contains(&e.id))
        .map(|e| (e.id, e.clone()))
        .collect();

    let mut placeholders = 0usize;
    loop {
        let mut newly_dead = Vec::new();

        for (id, element) in &mut survivors {
            let mut lost_required = false;
            for reference in &mut element.references {
                if let Operand::Element(target) = reference.target {
                    if doomed.contains(&target) {
                        reference.neutralize();
                        placeholders = placeholders.saturating_add(1);
                        lost_required |= reference.required;
                    }
                }
            }
            if lost_required {
                newly_dead.push(*id);
            }
        }

        if newly_dead.is_empty() {
            break;
        }

        for id in newly_dead {
            for dead in artifact.subtree(id) {
                doomed.insert(dead);
                survivors.remove(&dead);
            }
        }
    }

    for element in survivors.values_mut() {
        element.children.retain(|child| !doomed.contains(child));
    }

    let roots = artifact
        .roots()
        .iter()
        .copied()
        .filter(|id| !doomed.contains(id))
        .collect();

    let mut tombstones = artifact.tombstones().clone();
    tombstones.extend(doomed.iter().copied());

    let successor = Artifact::from_parts(
        survivors,
        roots,
        tombstones,
        artifact.next_id(),
        artifact.version().saturating_add(1),
    );
    successor.validate()?;

    let cascaded = doomed.len().saturating_sub(requested);
    Ok(Repair {
        artifact: successor,
        removed: doomed,
        requested,
        cascaded,
        placeholders,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Kind, Reference, Shape};

    /// main { call -> !helper, use -> call }, helper { inner }, data, user -> data
    fn program() -> Artifact {
        let mut b = Artifact::builder();
        let main = b.element(None, Kind::new("fn"), "main").expect("main");
        let call = b.element(Some(main), Kind::new("stmt"), "call").expect("call");
        let use_ = b.element(Some(main), Kind::new("stmt"), "use").expect("use");
        let helper = b.element(None, Kind::new("fn"), "helper").expect("helper");
        let _inner = b.element(Some(helper), Kind::new("stmt"), "inner").expect("inner");
        let data = b.element(None, Kind::new("global"), "data").expect("data");
        let user = b.element(None, Kind::new("fn"), "user").expect("user");

        b.reference(call, Reference::to(helper).with_shape(Shape::new("fn")).required())
            .expect("ref");
        b.reference(use_, Reference::to(call).with_shape(Shape::new("i32")))
            .expect("ref");
        b.reference(user, Reference::to(data).with_shape(Shape::new("ptr")))
            .expect("ref");
        b.build().expect("build")
    }

    #[test]
    fn removal_does_not_touch_input() {
        let artifact = program();
        let before = artifact.clone();
        let _ = remove(&artifact, &[ElementId(3)]).expect("repair");
        assert_eq!(artifact, before);
    }

    #[test]
    fn optional_reference_becomes_placeholder() {
        let artifact = program();
        let data = artifact.by_name("data").expect("data");
        let user = artifact.by_name("user").expect("user");

        let repair = remove(&artifact, &[data]).expect("repair");
        let user_el = repair.artifact.get(user).expect("user survives");

        assert!(user_el.references[0].target.is_placeholder());
        assert_eq!(user_el.references[0].shape, Shape::new("ptr"));
        assert_eq!(repair.placeholders, 1);
        assert_eq!(repair.cascaded, 0);
    }

    #[test]
    fn required_reference_cascades() {
        let artifact = program();
        let helper = artifact.by_name("helper").expect("helper");
        let call = artifact.by_name("call").expect("call");
        let use_ = artifact.by_name("use").expect("use");

        let repair = remove(&artifact, &[helper]).expect("repair");

        // helper + inner requested, call pruned because its callee vanished
        assert_eq!(repair.requested, 2);
        assert_eq!(repair.cascaded, 1);
        assert!(!repair.artifact.contains(call));

        // use forwarded call's value, so it now holds a placeholder
        let use_el = repair.artifact.get(use_).expect("use survives");
        assert!(use_el.references[0].target.is_placeholder());
    }

    #[test]
    fn tombstones_accumulate_across_versions() {
        let artifact = program();
        let first = remove(&artifact, &[ElementId(5)]).expect("first");
        let second = remove(&first.artifact, &[ElementId(6)]).expect("second");

        assert!(second.artifact.is_tombstoned(ElementId(5)));
        assert!(second.artifact.is_tombstoned(ElementId(6)));
        assert_eq!(second.artifact.version(), 2);
        assert_eq!(second.artifact.next_id(), artifact.next_id());
    }

    #[test]
    fn removing_parent_removes_children() {
        let artifact = program();
        let repair = remove(&artifact, &[ElementId(0)]).expect("repair");
        assert!(!repair.artifact.contains(ElementId(1)));
        assert!(!repair.artifact.contains(ElementId(2)));
        assert_eq!(repair.requested, 3);
    }

    #[test]
    fn dead_ids_are_ignored() {
        let artifact = program();
        let first = remove(&artifact, &[ElementId(5)]).expect("first");
        let again = remove(&first.artifact, &[ElementId(5), ElementId(42)]).expect("again");
        assert_eq!(again.artifact.size(), first.artifact.size());
        assert!(again.removed.is_empty());
    }

    #[test]
    fn preexisting_placeholder_does_not_prune() {
        let mut b = Artifact::builder();
        let f = b.element(None, Kind::new("fn"), "f").expect("f");
        let g = b.element(None, Kind::new("fn"), "g").expect("g");
        b.reference(f, Reference::placeholder(Shape::new("fn")).required())
            .expect("ref");
        let artifact = b.build().expect("build");

        let repair = remove(&artifact, &[g]).expect("repair");
        assert!(repair.artifact.contains(f));
        assert_eq!(repair.cascaded, 0);
    }
}
