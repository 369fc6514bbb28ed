//! # Outline Format
//!
//! Indentation-structured text. One element per line:
//!
//! ```text
//! # comment
//! fn main -> !helper:fn, counter
//!   stmt call -> !helper:fn
//!   stmt ret -> call:i32
//! fn helper
//! global counter
//! ```
//!
//! - Two spaces of indentation per nesting level; a line nests at most one
//!   level deeper than the line before it.
//! - `<kind> <name>` heads the line; `->` introduces comma-separated
//!   references.
//! - A reference is `[!]<name|_>[:<shape>]`: `!` marks it required, `_` is a
//!   placeholder, and a missing shape means `any`.
//! - Names are unique and may be referenced before they are defined.

use super::Codec;
use crate::primitives::{
    MAX_NAME_LENGTH, MAX_NESTING_DEPTH, OUTLINE_INDENT, PLACEHOLDER_TOKEN, REFERENCE_ARROW,
    REQUIRED_MARKER,
};
use crate::{Artifact, ElementId, Kind, Operand, PareError, Reference, Shape};
use std::collections::BTreeMap;

/// Codec for the outline text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineCodec;

/// A reference as written, resolved once every name is known.
struct PendingReference {
    line: usize,
    owner: ElementId,
    target: String,
    shape: Shape,
    required: bool,
}

fn parse_error(line: usize, message: impl Into<String>) -> PareError {
    PareError::Parse {
        line,
        message: message.into(),
    }
}

fn check_name(line: usize, name: &str) -> Result<(), PareError> {
    if name == PLACEHOLDER_TOKEN {
        return Err(parse_error(line, "'_' is reserved for placeholders"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(parse_error(line, "element name too long"));
    }
    if name.contains([',', ':', REQUIRED_MARKER]) {
        return Err(parse_error(
            line,
            format!("element name '{}' contains a reserved character", name),
        ));
    }
    Ok(())
}

fn parse_reference(line: usize, token: &str) -> Result<(String, Shape, bool), PareError> {
    let (required, rest) = match token.strip_prefix(REQUIRED_MARKER) {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (target, shape) = match rest.split_once(':') {
        Some((target, shape)) => {
            let shape = shape.trim();
            if shape.is_empty() {
                return Err(parse_error(line, format!("empty shape in '{}'", token)));
            }
            (target.trim(), Shape::new(shape))
        }
        None => (rest.trim(), Shape::any()),
    };

    if target.is_empty() {
        return Err(parse_error(line, format!("empty reference in '{}'", token)));
    }

    Ok((target.to_string(), shape, required))
}

impl Codec for OutlineCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Artifact, PareError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| parse_error(0, format!("input is not UTF-8: {}", e)))?;

        let mut builder = Artifact::builder();
        let mut ancestors: Vec<ElementId> = Vec::new();
        let mut pending = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let body = raw.trim();
            if body.is_empty() || body.starts_with('#') {
                continue;
            }

            let indent = raw.len() - raw.trim_start_matches(' ').len();
            if raw[indent..].starts_with('\t') {
                return Err(parse_error(line, "tabs are not allowed in indentation"));
            }
            if indent % OUTLINE_INDENT != 0 {
                return Err(parse_error(
                    line,
                    format!("indentation must be a multiple of {} spaces", OUTLINE_INDENT),
                ));
            }

            let depth = indent / OUTLINE_INDENT;
            if depth > ancestors.len() {
                return Err(parse_error(line, "nested more than one level deeper"));
            }
            if depth > MAX_NESTING_DEPTH {
                return Err(parse_error(line, "nesting too deep"));
            }
            ancestors.truncate(depth);

            let (header, references) = match body.split_once(REFERENCE_ARROW) {
                Some((header, references)) => (header.trim(), Some(references.trim())),
                None => (body, None),
            };

            let mut words = header.split_whitespace();
            let kind = words
                .next()
                .ok_or_else(|| parse_error(line, "missing element kind"))?;
            let name = words
                .next()
                .ok_or_else(|| parse_error(line, "missing element name"))?;
            if let Some(extra) = words.next() {
                return Err(parse_error(line, format!("unexpected token '{}'", extra)));
            }
            check_name(line, name)?;

            let id = builder.element(ancestors.last().copied(), Kind::new(kind), name)?;
            ancestors.push(id);

            let Some(references) = references.filter(|r| !r.is_empty()) else {
                continue;
            };
            for token in references.split(',') {
                let (target, shape, required) = parse_reference(line, token.trim())?;
                pending.push(PendingReference {
                    line,
                    owner: id,
                    target,
                    shape,
                    required,
                });
            }
        }

        for reference in pending {
            let target = if reference.target == PLACEHOLDER_TOKEN {
                Operand::Placeholder
            } else {
                let id = builder.lookup(&reference.target).ok_or_else(|| {
                    PareError::UnknownReference {
                        line: reference.line,
                        name: reference.target.clone(),
                    }
                })?;
                Operand::Element(id)
            };

            builder.reference(
                reference.owner,
                Reference {
                    target,
                    shape: reference.shape,
                    required: reference.required,
                },
            )?;
        }

        builder.build()
    }

    fn render(&self, artifact: &Artifact) -> Result<Vec<u8>, PareError> {
        let mut out = String::new();
        let mut depths: BTreeMap<ElementId, usize> = BTreeMap::new();

        for id in artifact.preorder() {
            let element = artifact.get(id).ok_or(PareError::ElementNotFound(id))?;
            let depth = element
                .parent
                .and_then(|p| depths.get(&p))
                .map_or(0, |d| d + 1);
            depths.insert(id, depth);

            out.push_str(&" ".repeat(depth * OUTLINE_INDENT));
            out.push_str(element.kind.as_str());
            out.push(' ');
            out.push_str(&element.name);

            if !element.references.is_empty() {
                let mut rendered = Vec::with_capacity(element.references.len());
                for (slot, reference) in element.references.iter().enumerate() {
                    let mut token = String::new();
                    if reference.required {
                        token.push(REQUIRED_MARKER);
                    }
                    match reference.target {
                        Operand::Element(target) => {
                            let target = artifact.get(target).ok_or(PareError::RepairAnomaly {
                                element: id,
                                reference: slot,
                            })?;
                            token.push_str(&target.name);
                        }
                        Operand::Placeholder => token.push_str(PLACEHOLDER_TOKEN),
                    }
                    if !reference.shape.is_any() {
                        token.push(':');
                        token.push_str(reference.shape.as_str());
                    }
                    rendered.push(token);
                }
                out.push(' ');
                out.push_str(REFERENCE_ARROW);
                out.push(' ');
                out.push_str(&rendered.join(", "));
            }
            out.push('\n');
        }

        Ok(out.into_bytes())
    }

    fn extension(&self) -> &'static str {
        "pare"
    }
}

// =============================================================================
// TESTS
// =============================================================================
