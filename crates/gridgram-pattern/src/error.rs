//! Error types for pattern parsing and expansion.

use glam::UVec3;
use thiserror::Error;

/// Errors raised while parsing pattern text or symmetry flags.
///
/// All of these are configuration errors: the rule definition is malformed
/// and the import should be aborted, not retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Rule text did not contain exactly one `=` separator.
    #[error("rule text must contain exactly one '=', found {0}")]
    SeparatorCount(usize),

    /// Pattern text was empty or contained an empty cell.
    #[error("empty pattern text")]
    Empty,

    /// Rows or planes of the pattern text had inconsistent lengths.
    #[error("ragged pattern: all rows and planes must have equal extents")]
    Ragged,

    /// A cell token was neither alphanumeric nor the wildcard `*`.
    #[error("invalid token {0:?}: tokens must be alphanumeric or '*'")]
    InvalidToken(String),

    /// Input and output patterns of a rule had different extents.
    #[error("pattern dimensions differ: input {input}, output {output}")]
    DimensionMismatch {
        /// Extents of the input pattern.
        input: UVec3,
        /// Extents of the output pattern.
        output: UVec3,
    },

    /// A symmetry flag token was not `t` or `f`.
    #[error("invalid symmetry flag {0:?}: must be 't' or 'f'")]
    InvalidSymmetryFlag(String),

    /// A symmetry flag string did not have exactly six entries.
    #[error("symmetry flags need 6 entries, got {0}")]
    SymmetryCount(usize),
}
