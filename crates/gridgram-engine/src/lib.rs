//! A grammar-driven rewriting engine for 3D cell grids.
//!
//! A [`Grid`] is a dense block of named cell states. A [`Rule`] rewrites a
//! rectangular region of the grid, with its pattern expanded under symmetry
//! flags into rotated and mirrored variants. Rules are arranged in a tree of
//! [`Node`]s whose rulesets control execution order, and the whole tree is
//! run against a grid with a seeded random source and a global operation
//! budget, so every run is reproducible.
//!
//! ```
//! use gridgram_engine::{ApplyMode, Engine, Grid, Node, Rule, Strategy};
//! use gridgram_pattern::Symmetries;
//!
//! # fn main() -> Result<(), gridgram_engine::EngineError> {
//! let mut engine = Engine::new();
//! engine.add_grid(Grid::new("world", 4, 4, 1, "a")?);
//!
//! let rule = Rule::parse("a=b", ApplyMode::Single, Symmetries::NONE)?;
//! engine.add_ruleset(Node::set(
//!     "fill",
//!     Strategy::Series,
//!     vec![Node::rule("ab", rule)],
//! ))?;
//!
//! engine.run("world", "fill", 100, 42)?;
//! assert_eq!(engine.grid("world").unwrap().snapshot().matches('b').count(), 16);
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod grid;
mod matcher;
mod rng;
mod rule;

pub use engine::{run_tree, Engine};
pub use error::EngineError;
pub use grid::{Cell, Grid};
pub use rule::{ApplyMode, Node, NodeKind, Rule, RuleSet, Strategy, Variant};

pub use gridgram_pattern::{Pattern, PatternError, Symmetries, Token, Transform};
