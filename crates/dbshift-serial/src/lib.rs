//! Codec for the PHP `serialize()` wire format.
//!
//! Database cells frequently hold serialized payloads whose string
//! elements carry explicit byte lengths. Editing such a payload with a
//! flat text replace corrupts it the moment a replacement changes a
//! string's length, so this crate decodes the payload into a tree,
//! rewrites only the string leaves, and re-encodes with every length
//! recomputed from the new bytes.

mod decode;
mod encode;
mod node;
mod transform;

pub use decode::decode;
pub use encode::encode;
pub use node::Value;
pub use transform::{rewrite_cell, substitute_tree};

use thiserror::Error;

/// Reasons a byte sequence fails to parse as a serialized document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected byte {byte:#04x} at offset {pos}")]
    Unexpected { pos: usize, byte: u8 },
    #[error("input ends early at offset {pos}")]
    Truncated { pos: usize },
    #[error("malformed length field at offset {pos}")]
    BadLength { pos: usize },
    #[error("malformed integer at offset {pos}")]
    BadInt { pos: usize },
    #[error("malformed float at offset {pos}")]
    BadFloat { pos: usize },
    #[error("trailing bytes after document, starting at offset {pos}")]
    Trailing { pos: usize },
    #[error("containers nested too deeply at offset {pos}")]
    TooDeep { pos: usize },
}
