//! Error types for the rewriting engine.

use gridgram_pattern::PatternError;
use thiserror::Error;

/// Errors raised while configuring or running the engine.
///
/// Configuration and lookup errors are fatal: the run or import is aborted
/// and never retried. Invalid cell-state writes during a run are not errors;
/// they are skipped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No grid registered under the given name.
    #[error("unknown grid {0:?}")]
    UnknownGrid(String),

    /// No ruleset registered under the given name.
    #[error("unknown ruleset {0:?}")]
    UnknownRuleSet(String),

    /// The root of a rule tree must be a ruleset, not a rule.
    #[error("root node {0:?} must be a ruleset")]
    RootNotSet(String),

    /// The root ruleset must not have its repeat flag set.
    #[error("root ruleset {0:?} must not repeat")]
    RootRepeat(String),

    /// A rule application mode token was not `single` or `parallel`.
    #[error("invalid rule mode {0:?}: must be 'single' or 'parallel'")]
    InvalidRuleMode(String),

    /// A ruleset strategy token was not one of the four strategies.
    #[error("invalid strategy {0:?}: must be 'series', 'sequence', 'retrace' or 'random'")]
    InvalidStrategy(String),

    /// A grid default state was not alphanumeric.
    #[error("invalid state token {0:?}: must be alphanumeric")]
    InvalidState(String),

    /// A pattern or symmetry definition was malformed.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}
