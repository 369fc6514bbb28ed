//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by every part of the reducer:
//! - Element identifiers (`ElementId`)
//! - Element classification (`Kind`, `Shape`)
//! - Reference edges (`Operand`, `Reference`)
//! - The addressable unit itself (`Element`)
//! - Error types (`PareError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer identifiers only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Never reuse an identifier once it has been tombstoned

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identifier of an element within one reduction session.
///
/// Identifiers are assigned in document order when an artifact is parsed and
/// survive every repair unchanged. A removed element's identifier is
/// tombstoned and never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Kind tag of an element (`fn`, `global`, `stmt`, ...).
///
/// The core never interprets kinds; they only travel through codecs so a
/// rendered artifact reads like its input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Kind(pub String);

impl Kind {
    /// Create a new kind from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Expected shape (type tag) of a reference slot.
///
/// A placeholder substituted into a slot always carries the slot's shape,
/// which is what keeps a repaired artifact well-formed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Shape(pub String);

impl Shape {
    /// The unconstrained shape.
    pub const ANY: &'static str = "any";

    /// Create a new shape from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The unconstrained shape.
    #[must_use]
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Check if this is the unconstrained shape.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    /// Get the shape as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self::any()
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

/// What a reference slot currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// A live element.
    Element(ElementId),
    /// The neutral value substituted for a removed element.
    Placeholder,
}

impl Operand {
    /// The referenced element, if the slot is not a placeholder.
    #[must_use]
    pub fn element(self) -> Option<ElementId> {
        match self {
            Operand::Element(id) => Some(id),
            Operand::Placeholder => None,
        }
    }

    /// Check if the slot holds a placeholder.
    #[must_use]
    pub fn is_placeholder(self) -> bool {
        matches!(self, Operand::Placeholder)
    }
}

/// A directed reference edge from its owning element to another element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Current value of the slot.
    pub target: Operand,
    /// Shape expected by the slot.
    pub shape: Shape,
    /// The owner cannot exist once this slot holds a placeholder.
    pub required: bool,
}

impl Reference {
    /// Reference to a live element with the unconstrained shape.
    #[must_use]
    pub fn to(id: ElementId) -> Self {
        Self {
            target: Operand::Element(id),
            shape: Shape::any(),
            required: false,
        }
    }

    /// Placeholder reference of the given shape.
    #[must_use]
    pub fn placeholder(shape: Shape) -> Self {
        Self {
            target: Operand::Placeholder,
            shape,
            required: false,
        }
    }

    /// Set the expected shape.
    #[must_use]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Mark the reference as required by its owner.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Replace the target with a placeholder of the same shape.
    pub fn neutralize(&mut self) {
        self.target = Operand::Placeholder;
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

/// An addressable, individually removable unit of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Stable identifier.
    pub id: ElementId,
    /// Kind tag.
    pub kind: Kind,
    /// Symbolic name, unique within the artifact.
    pub name: String,
    /// Enclosing element, `None` for top-level elements.
    pub parent: Option<ElementId>,
    /// Nested elements in document order.
    pub children: Vec<ElementId>,
    /// Outgoing references in slot order.
    pub references: Vec<Reference>,
}

impl Element {
    /// Create a childless element without references.
    #[must_use]
    pub fn new(id: ElementId, kind: Kind, name: impl Into<String>, parent: Option<ElementId>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            parent,
            children: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Check if the element sits at the top level.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Live elements this element points at, in slot order.
    pub fn referenced(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.references.iter().filter_map(|r| r.target.element())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the reduction model.
///
/// - No silent failures
/// - The model never panics; repair problems surface as `RepairAnomaly`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PareError {
    /// The input could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Two elements share a name.
    #[error("Duplicate element name: {0}")]
    DuplicateName(String),

    /// A reference names an element that does not exist.
    #[error("Unknown reference '{name}' at line {line}")]
    UnknownReference { line: usize, name: String },

    /// The requested element is not live.
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    /// Repair produced an artifact with an unresolvable reference.
    #[error("Repair anomaly: reference {reference} of {element} does not resolve")]
    RepairAnomaly { element: ElementId, reference: usize },

    /// Parent/child links or identifier bookkeeping disagree.
    #[error("Inconsistent structure at {element}: {message}")]
    Inconsistent { element: ElementId, message: String },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutralize_keeps_shape() {
        let mut reference = Reference::to(ElementId(3))
            .with_shape(Shape::new("fn"))
            .required();
        reference.neutralize();

        assert!(reference.target.is_placeholder());
        assert_eq!(reference.shape, Shape::new("fn"));
        assert!(reference.required);
    }

    #[test]
    fn referenced_skips_placeholders() {
        let mut element = Element::new(ElementId(0), Kind::new("fn"), "main", None);
        element.references.push(Reference::to(ElementId(1)));
        element.references.push(Reference::placeholder(Shape::any()));
        element.references.push(Reference::to(ElementId(2)));

        let targets: Vec<_> = element.referenced().collect();
        assert_eq!(targets, vec![ElementId(1), ElementId(2)]);
    }

    #[test]
    fn default_shape_is_any() {
        assert!(Shape::default().is_any());
        assert!(!Shape::new("i32").is_any());
    }

    #[test]
    fn element_id_display() {
        assert_eq!(ElementId(42).to_string(), "#42");
    }
}
