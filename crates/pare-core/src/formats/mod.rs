//! # Formats Module
//!
//! Codecs translating between bytes on disk and an [`Artifact`].
//!
//! The reduction engine only ever sees the [`Codec`] contract; the concrete
//! syntax lives here:
//! - `outline`: indentation-structured text, the default
//! - `json`: serde representation preserving ids and tombstones

mod json;
mod outline;

pub use json::JsonCodec;
pub use outline::OutlineCodec;

use crate::{Artifact, PareError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parse/render contract for one artifact format.
///
/// Codecs must be stateless so trials can render concurrently.
pub trait Codec: Send + Sync {
    /// Parse raw bytes into an artifact.
    fn parse(&self, bytes: &[u8]) -> Result<Artifact, PareError>;

    /// Render an artifact back to bytes.
    fn render(&self, artifact: &Artifact) -> Result<Vec<u8>, PareError>;

    /// Preferred file extension, without the dot.
    fn extension(&self) -> &'static str;
}

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Indentation-structured text.
    #[default]
    Text,
    /// JSON.
    Json,
}

impl Format {
    /// Guess the format from a file extension (`.json` or anything else).
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Text,
        }
    }

    /// Parse a format name.
    pub fn from_name(name: &str) -> Result<Self, PareError> {
        match name {
            "text" | "outline" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(PareError::Serialization(format!(
                "Unknown format: {}. Use: text, json",
                other
            ))),
        }
    }

    /// The codec implementing this format.
    #[must_use]
    pub fn codec(self) -> Box<dyn Codec> {
        match self {
            Format::Text => Box::new(OutlineCodec),
            Format::Json => Box::new(JsonCodec),
        }
    }
}

// =============================================================================
// FINGERPRINTS
// =============================================================================

/// Content fingerprint of rendered candidate bytes.
///
/// BLAKE3 hex digest when the `crypto-hash` feature is enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Content fingerprint of rendered candidate bytes.
///
/// 64-bit std hash in hex; enable `crypto-hash` for a collision-resistant
/// digest.
#[cfg(not(feature = "crypto-hash"))]
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
