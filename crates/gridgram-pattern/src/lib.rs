//! Rewrite patterns for 3D cell grids.
//!
//! A [`Pattern`] is a dense 3D array of state tokens plus a wildcard, parsed
//! from a small textual mini-language: `,` separates cells along X, `;`
//! separates rows along Y, `/` separates planes along Z, and a single `=`
//! splits a rule into its input and output patterns.
//!
//! Patterns can be expanded into their rotational and reflective variants
//! with [`expand`] under a set of [`Symmetries`] flags, keyed by
//! [`Transform`].
//!
//! # Example
//!
//! ```
//! use gridgram_pattern::{parse_rule_text, expand_pair, Symmetries};
//!
//! // A 2x1x1 rule: "ab" becomes "ba", with rotation about Z enabled.
//! let (input, output) = parse_rule_text("a,b=b,a").unwrap();
//! let sym: Symmetries = "fftfff".parse().unwrap();
//! let variants = expand_pair(&input, &output, sym).unwrap();
//!
//! // base + rotz90/180/270, minus content duplicates.
//! assert!(!variants.is_empty());
//! ```

mod error;
mod pattern;
mod symmetry;

pub use error::PatternError;
pub use pattern::{parse_rule_text, Pattern, Token};
pub use symmetry::{expand, expand_pair, Symmetries, Transform};
