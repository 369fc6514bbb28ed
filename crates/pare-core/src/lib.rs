//! # pare-core
//!
//! The deterministic reduction model for pare - THE MODEL.
//!
//! This crate holds everything about test-case reduction that does not need
//! to run a process or wait on one:
//! - the Artifact Model: elements in a flat arena with stable ids, hierarchy
//!   links, reference edges and tombstones
//! - Consistency Repair: removal that never leaves a dangling reference
//! - Reduction Passes: strategies enumerating removable targets
//! - chunk partitioning and the granularity policy of the bisector
//! - codecs for the outline text format and JSON
//!
//! ## Architectural Constraints
//!
//! - No async, no process spawning, no filesystem I/O (the app layer owns those)
//! - `BTreeMap`/`BTreeSet` only, so every enumeration order is reproducible
//! - Snapshots are never mutated in place; repair returns a new version

// =============================================================================
// MODULES
// =============================================================================

pub mod artifact;
pub mod chunk;
pub mod formats;
pub mod pass;
pub mod primitives;
pub mod repair;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Element, ElementId, Kind, Operand, PareError, Reference, Shape};

// =============================================================================
// RE-EXPORTS: Model
// =============================================================================

pub use artifact::{Artifact, ArtifactBuilder, SerializableArtifact};
pub use chunk::{Chunk, GranularityPolicy, partition};
pub use pass::{
    NestedPass, PASS_NAMES, ReductionPass, Target, TopLevelPass, UnreferencedPass,
    default_passes, pass_by_name,
};
pub use repair::Repair;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{Codec, Format, JsonCodec, OutlineCodec, fingerprint};
