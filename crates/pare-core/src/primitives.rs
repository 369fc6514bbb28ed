//! # Primitives
//!
//! Hardcoded defaults and limits for the reduction model.
//!
//! These values are compiled into the binary. Anything a user may want to
//! change is exposed through the app's configuration instead, with the
//! constant here serving as its default.

/// Starting chunk count of the bisector: "split in half".
pub const DEFAULT_INITIAL_CHUNKS: usize = 2;

/// Indentation width of one nesting level in the outline format.
pub const OUTLINE_INDENT: usize = 2;

/// Marker for a required reference in the outline format.
pub const REQUIRED_MARKER: char = '!';

/// Spelling of a placeholder in the outline format.
pub const PLACEHOLDER_TOKEN: &str = "_";

/// Separator between an element header and its references.
pub const REFERENCE_ARROW: &str = "->";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of an input artifact (64 MiB).
///
/// Larger files are rejected before parsing.
pub const MAX_INPUT_SIZE: u64 = 64 * 1024 * 1024;

/// Maximum nesting depth accepted by the outline parser.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Maximum length of an element name.
pub const MAX_NAME_LENGTH: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bisection_starts_by_halving() {
        assert_eq!(DEFAULT_INITIAL_CHUNKS, 2);
    }

    #[test]
    fn outline_tokens_do_not_collide() {
        assert!(!PLACEHOLDER_TOKEN.contains(REQUIRED_MARKER));
        assert!(!REFERENCE_ARROW.contains(REQUIRED_MARKER));
    }
}
