//! # Artifact Model
//!
//! The in-memory representation of a structured program being reduced.
//!
//! Elements live in a flat arena keyed by `ElementId`. Hierarchy is expressed
//! through parent/child links, and reference edges point at other elements by
//! id. An `Artifact` is a snapshot: once built it is only read. Every
//! successful removal produces a new version through [`crate::repair`].

use crate::{Element, ElementId, Kind, Operand, PareError, Reference};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ARTIFACT
// =============================================================================

/// An immutable-per-version snapshot of a structured program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Live elements: ElementId -> Element
    elements: BTreeMap<ElementId, Element>,

    /// Top-level elements in document order.
    roots: Vec<ElementId>,

    /// Identifiers retired by earlier versions.
    tombstones: BTreeSet<ElementId>,

    /// Next identifier a builder would assign.
    next_id: u64,

    /// Number of repairs that led to this snapshot.
    version: u64,
}

impl Artifact {
    /// Create a new empty artifact.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building an artifact.
    #[must_use]
    pub fn builder() -> ArtifactBuilder {
        ArtifactBuilder::default()
    }

    /// Assemble a successor version. Used by repair only.
    pub(crate) fn from_parts(
        elements: BTreeMap<ElementId, Element>,
        roots: Vec<ElementId>,
        tombstones: BTreeSet<ElementId>,
        next_id: u64,
        version: u64,
    ) -> Self {
        Self {
            elements,
            roots,
            tombstones,
            next_id,
            version,
        }
    }

    /// Number of live elements. This is the size the session minimizes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Check if no element is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Repair generation of this snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Next identifier that would be assigned.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Look up a live element.
    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Check if an element is live.
    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Check if an identifier was retired.
    #[must_use]
    pub fn is_tombstoned(&self, id: ElementId) -> bool {
        self.tombstones.contains(&id)
    }

    /// Retired identifiers.
    #[must_use]
    pub fn tombstones(&self) -> &BTreeSet<ElementId> {
        &self.tombstones
    }

    /// Top-level elements in document order.
    #[must_use]
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    /// Live elements in identifier order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Find a live element by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ElementId> {
        self.elements
            .values()
            .find(|e| e.name == name)
            .map(|e| e.id)
    }

    /// All live elements in document (preorder) order.
    #[must_use]
    pub fn preorder(&self) -> Vec<ElementId> {
        let mut order = Vec::with_capacity(self.elements.len());
        let mut stack: Vec<ElementId> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let Some(element) = self.elements.get(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(element.children.iter().rev().copied());
        }

        order
    }

    /// The element and everything nested below it.
    #[must_use]
    pub fn subtree(&self, id: ElementId) -> BTreeSet<ElementId> {
        let mut found = BTreeSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(element) = self.elements.get(&current) else {
                continue;
            };
            if found.insert(current) {
                stack.extend(element.children.iter().copied());
            }
        }

        found
    }

    /// Number of live references pointing at each live element.
    ///
    /// Elements nobody points at are present with a count of zero.
    #[must_use]
    pub fn incoming_counts(&self) -> BTreeMap<ElementId, usize> {
        let mut counts: BTreeMap<ElementId, usize> =
            self.elements.keys().map(|id| (*id, 0)).collect();

        for element in self.elements.values() {
            for target in element.referenced() {
                if let Some(count) = counts.get_mut(&target) {
                    *count = count.saturating_add(1);
                }
            }
        }

        counts
    }

    /// Elements holding at least one reference to `id`.
    #[must_use]
    pub fn users_of(&self, id: ElementId) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| e.referenced().any(|t| t == id))
            .map(|e| e.id)
            .collect()
    }

    /// Number of slots holding a placeholder.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.elements
            .values()
            .flat_map(|e| e.references.iter())
            .filter(|r| r.target.is_placeholder())
            .count()
    }

    /// Check structural consistency.
    ///
    /// Every reference resolves to a live element or a placeholder, parent and
    /// child links agree, roots are exactly the live top-level elements, and no
    /// live identifier is tombstoned or beyond `next_id`.
    pub fn validate(&self) -> Result<(), PareError> {
        for (id, element) in &self.elements {
            if element.id != *id {
                return Err(PareError::Inconsistent {
                    element: *id,
                    message: format!("stored under {} but carries {}", id, element.id),
                });
            }
            if self.tombstones.contains(id) || id.0 >= self.next_id {
                return Err(PareError::Inconsistent {
                    element: *id,
                    message: "identifier is retired or unassigned".to_string(),
                });
            }

            match element.parent {
                Some(parent) => {
                    let linked = self
                        .elements
                        .get(&parent)
                        .is_some_and(|p| p.children.contains(id));
                    if !linked {
                        return Err(PareError::Inconsistent {
                            element: *id,
                            message: format!("parent {} does not list it", parent),
                        });
                    }
                }
                None => {
                    if !self.roots.contains(id) {
                        return Err(PareError::Inconsistent {
                            element: *id,
                            message: "top-level element missing from roots".to_string(),
                        });
                    }
                }
            }

            for child in &element.children {
                let owned = self
                    .elements
                    .get(child)
                    .is_some_and(|c| c.parent == Some(*id));
                if !owned {
                    return Err(PareError::Inconsistent {
                        element: *id,
                        message: format!("child {} is dead or owned elsewhere", child),
                    });
                }
            }

            for (slot, reference) in element.references.iter().enumerate() {
                if let Operand::Element(target) = reference.target {
                    if !self.elements.contains_key(&target) {
                        return Err(PareError::RepairAnomaly {
                            element: *id,
                            reference: slot,
                        });
                    }
                }
            }
        }

        for root in &self.roots {
            let top_level = self.elements.get(root).is_some_and(Element::is_top_level);
            if !top_level {
                return Err(PareError::Inconsistent {
                    element: *root,
                    message: "root is dead or nested".to_string(),
                });
            }
        }

        self.validate_forest()
    }

    /// Every live element is reached exactly once walking down from `roots`.
    fn validate_forest(&self) -> Result<(), PareError> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<ElementId> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(PareError::Inconsistent {
                    element: id,
                    message: "listed more than once in the hierarchy".to_string(),
                });
            }
            if let Some(element) = self.elements.get(&id) {
                stack.extend(element.children.iter().rev().copied());
            }
        }

        match self.elements.keys().find(|id| !visited.contains(*id)) {
            Some(orphan) => Err(PareError::Inconsistent {
                element: *orphan,
                message: "not reachable from any root".to_string(),
            }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Incremental construction of an artifact.
///
/// References may point forward; they are checked once in [`ArtifactBuilder::build`].
#[derive(Debug, Default)]
pub struct ArtifactBuilder {
    artifact: Artifact,
    names: BTreeMap<String, ElementId>,
}

impl ArtifactBuilder {
    /// Append an element, nested under `parent` when given.
    pub fn element(
        &mut self,
        parent: Option<ElementId>,
        kind: Kind,
        name: impl Into<String>,
    ) -> Result<ElementId, PareError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(PareError::DuplicateName(name));
        }

        let id = ElementId(self.artifact.next_id);
        match parent {
            Some(parent_id) => {
                let parent = self
                    .artifact
                    .elements
                    .get_mut(&parent_id)
                    .ok_or(PareError::ElementNotFound(parent_id))?;
                parent.children.push(id);
            }
            None => self.artifact.roots.push(id),
        }

        self.artifact.next_id = self.artifact.next_id.saturating_add(1);
        self.names.insert(name.clone(), id);
        self.artifact
            .elements
            .insert(id, Element::new(id, kind, name, parent));
        Ok(id)
    }

    /// Append a reference slot to `owner`.
    pub fn reference(&mut self, owner: ElementId, reference: Reference) -> Result<(), PareError> {
        let element = self
            .artifact
            .elements
            .get_mut(&owner)
            .ok_or(PareError::ElementNotFound(owner))?;
        element.references.push(reference);
        Ok(())
    }

    /// Identifier of a previously added element.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    /// Finish and validate the artifact.
    pub fn build(self) -> Result<Artifact, PareError> {
        self.artifact.validate()?;
        Ok(self.artifact)
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of an artifact, ids and tombstones included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableArtifact {
    pub elements: Vec<Element>,
    pub roots: Vec<ElementId>,
    #[serde(default)]
    pub tombstones: Vec<ElementId>,
    pub next_id: u64,
    #[serde(default)]
    pub version: u64,
}

impl From<&Artifact> for SerializableArtifact {
    fn from(artifact: &Artifact) -> Self {
        Self {
            elements: artifact.elements.values().cloned().collect(),
            roots: artifact.roots.clone(),
            tombstones: artifact.tombstones.iter().copied().collect(),
            next_id: artifact.next_id,
            version: artifact.version,
        }
    }
}

impl TryFrom<SerializableArtifact> for Artifact {
    type Error = PareError;

    fn try_from(sa: SerializableArtifact) -> Result<Self, Self::Error> {
        let mut elements = BTreeMap::new();
        for element in sa.elements {
            if elements.insert(element.id, element).is_some() {
                return Err(PareError::Serialization(
                    "duplicate element id".to_string(),
                ));
            }
        }

        let mut names = BTreeSet::new();
        for element in elements.values() {
            if !names.insert(element.name.as_str()) {
                return Err(PareError::DuplicateName(element.name.clone()));
            }
        }

        let artifact = Artifact {
            elements,
            roots: sa.roots,
            tombstones: sa.tombstones.into_iter().collect(),
            next_id: sa.next_id,
            version: sa.version,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn sample() -> Artifact {
        let mut b = Artifact::builder();
        let main = b.element(None, Kind::new("fn"), "main").expect("main");
        let call = b.element(Some(main), Kind::new("stmt"), "call").expect("call");
        let helper = b.element(None, Kind::new("fn"), "helper").expect("helper");
        let _unused = b.element(None, Kind::new("global"), "unused").expect("unused");
        b.reference(call, Reference::to(helper).with_shape(Shape::new("fn")).required())
            .expect("ref");
        b.build().expect("build")
    }

    #[test]
    fn builder_assigns_ids_in_order() {
        let artifact = sample();
        assert_eq!(artifact.size(), 4);
        assert_eq!(artifact.next_id(), 4);
        assert_eq!(artifact.roots(), &[ElementId(0), ElementId(2), ElementId(3)]);
        assert_eq!(artifact.by_name("helper"), Some(ElementId(2)));
    }

    #[test]
    fn preorder_visits_children_before_siblings() {
        let artifact = sample();
        assert_eq!(
            artifact.preorder(),
            vec![ElementId(0), ElementId(1), ElementId(2), ElementId(3)]
        );
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut b = Artifact::builder();
        b.element(None, Kind::new("fn"), "main").expect("first");
        let result = b.element(None, Kind::new("fn"), "main");
        assert_eq!(result, Err(PareError::DuplicateName("main".to_string())));
    }

    #[test]
    fn dangling_reference_fails_build() {
        let mut b = Artifact::builder();
        let main = b.element(None, Kind::new("fn"), "main").expect("main");
        b.reference(main, Reference::to(ElementId(99))).expect("ref");
        assert!(matches!(
            b.build(),
            Err(PareError::RepairAnomaly { reference: 0, .. })
        ));
    }

    #[test]
    fn incoming_counts_include_unreferenced() {
        let artifact = sample();
        let counts = artifact.incoming_counts();
        assert_eq!(counts.get(&ElementId(2)), Some(&1));
        assert_eq!(counts.get(&ElementId(3)), Some(&0));
        assert_eq!(artifact.users_of(ElementId(2)), vec![ElementId(1)]);
    }

    #[test]
    fn subtree_includes_nested() {
        let artifact = sample();
        let subtree: Vec<_> = artifact.subtree(ElementId(0)).into_iter().collect();
        assert_eq!(subtree, vec![ElementId(0), ElementId(1)]);
    }

    #[test]
    fn duplicate_root_rejected() {
        let mut sa = SerializableArtifact::from(&sample());
        sa.roots.push(ElementId(2));
        assert!(matches!(
            Artifact::try_from(sa),
            Err(PareError::Inconsistent { element: ElementId(2), .. })
        ));
    }

    #[test]
    fn parent_cycle_rejected() {
        let mut sa = SerializableArtifact::from(&sample());
        // helper and unused own each other and leave the roots
        sa.roots = vec![ElementId(0)];
        for element in &mut sa.elements {
            match element.id {
                ElementId(2) => {
                    element.parent = Some(ElementId(3));
                    element.children = vec![ElementId(3)];
                }
                ElementId(3) => {
                    element.parent = Some(ElementId(2));
                    element.children = vec![ElementId(2)];
                }
                _ => {}
            }
        }
        assert!(matches!(
            Artifact::try_from(sa),
            Err(PareError::Inconsistent { element: ElementId(2), .. })
        ));
    }

    #[test]
    fn serializable_roundtrip_preserves_ids() {
        let artifact = sample();
        let restored = Artifact::try_from(SerializableArtifact::from(&artifact)).expect("restore");
        assert_eq!(artifact, restored);
    }
}
