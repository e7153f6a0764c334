//! Error taxonomy.
//!
//! Running out of bytes is not an error for a streaming session -
//! [`Unpacker::try_next`](crate::Unpacker::try_next) reports it as
//! `Ok(None)`. The variants here are the terminal outcomes: malformed
//! input, a limit violation, or (for one-shot parses over a fixed range)
//! truncation.

use crate::limits::LimitCategory;

/// A failed unpack attempt.
///
/// `Malformed` and `LimitExceeded` poison the session that produced them:
/// the byte stream can no longer be trusted and the session must be reset
/// before further use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnpackError {
    /// A byte sequence does not correspond to any valid encoding.
    #[error("malformed encoding at byte {offset}")]
    Malformed { offset: u64 },

    /// A declared length or nesting depth exceeded the configured ceiling.
    /// Raised before any allocation proportional to `declared` happens.
    #[error("{category} limit exceeded: declared {declared}, maximum {max}")]
    LimitExceeded {
        category: LimitCategory,
        declared: u64,
        max: u64,
    },

    /// A fixed input range ended before one complete value was decoded.
    /// Only produced by the one-shot entry points; sessions report this
    /// condition as `Ok(None)` instead.
    #[error("insufficient bytes")]
    Insufficient,
}

/// A failed re-encode of a parsed value tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// A handle in the tree does not resolve against the given zone/input.
    #[error("value handle does not resolve against its zone")]
    Unresolved,
}
