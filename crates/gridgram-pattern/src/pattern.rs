//! The 3D pattern data model and the pattern mini-language parser.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use glam::UVec3;
use std::fmt;

/// One cell of a pattern: a literal state or the wildcard `*`.
///
/// A wildcard in an input pattern matches any grid state; in an output
/// pattern it leaves the grid cell unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Token {
    /// Matches anything on input, writes nothing on output.
    Wildcard,
    /// A literal alphanumeric state token.
    State(String),
}

impl Token {
    /// Parses a single cell token.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        if text == "*" {
            return Ok(Token::Wildcard);
        }
        if text.is_empty() {
            return Err(PatternError::Empty);
        }
        if !text.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PatternError::InvalidToken(text.to_string()));
        }
        Ok(Token::State(text.to_string()))
    }

    /// Returns true for the wildcard token.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Token::Wildcard)
    }

    /// Returns the literal state, or None for the wildcard.
    pub fn state(&self) -> Option<&str> {
        match self {
            Token::Wildcard => None,
            Token::State(s) => Some(s),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Wildcard => write!(f, "*"),
            Token::State(s) => write!(f, "{}", s),
        }
    }
}

/// A dense 3D array of tokens with its own extents.
///
/// Storage is x-fastest: index = `z * sy * sx + y * sx + x`, the same layout
/// the grid uses.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pattern {
    tokens: Vec<Token>,
    size: UVec3,
}

impl Pattern {
    /// Builds a pattern from tokens in storage order.
    pub fn from_tokens(size: UVec3, tokens: Vec<Token>) -> Result<Self, PatternError> {
        let expected = (size.x * size.y * size.z) as usize;
        if expected == 0 || tokens.len() != expected {
            return Err(PatternError::Ragged);
        }
        Ok(Self { tokens, size })
    }

    /// Parses pattern text: `,` between cells, `;` between rows, `/` between
    /// planes.
    ///
    /// All rows must have the same cell count and all planes the same row
    /// count; every token must be alphanumeric or `*`.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        if text.is_empty() {
            return Err(PatternError::Empty);
        }
        let planes: Vec<&str> = text.split('/').collect();
        let sz = planes.len();
        let sy = planes[0].split(';').count();
        let sx = planes[0]
            .split(';')
            .next()
            .ok_or(PatternError::Empty)?
            .split(',')
            .count();

        let mut tokens = Vec::with_capacity(sx * sy * sz);
        for plane in &planes {
            let rows: Vec<&str> = plane.split(';').collect();
            if rows.len() != sy {
                return Err(PatternError::Ragged);
            }
            for row in rows {
                let cells: Vec<&str> = row.split(',').collect();
                if cells.len() != sx {
                    return Err(PatternError::Ragged);
                }
                for cell in cells {
                    tokens.push(Token::parse(cell)?);
                }
            }
        }
        let size = UVec3::new(sx as u32, sy as u32, sz as u32);
        Self::from_tokens(size, tokens)
    }

    /// Returns the pattern extents.
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the pattern has no cells.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (z * self.size.y * self.size.x + y * self.size.x + x) as usize
    }

    /// Gets the token at the given pattern coordinates.
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds.
    pub fn get(&self, x: u32, y: u32, z: u32) -> &Token {
        &self.tokens[self.index(x, y, z)]
    }

    /// Returns the tokens in storage order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Builds a pattern by evaluating `f` at every coordinate.
    pub(crate) fn from_fn(size: UVec3, mut f: impl FnMut(u32, u32, u32) -> Token) -> Self {
        let mut tokens = Vec::with_capacity((size.x * size.y * size.z) as usize);
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    tokens.push(f(x, y, z));
                }
            }
        }
        Self { tokens, size }
    }
}

/// Parses rule text of the form `input=output` into a pattern pair.
///
/// The text must contain exactly one `=`, and the two patterns must have
/// identical extents.
pub fn parse_rule_text(text: &str) -> Result<(Pattern, Pattern), PatternError> {
    let parts: Vec<&str> = text.split('=').collect();
    if parts.len() != 2 {
        return Err(PatternError::SeparatorCount(parts.len().saturating_sub(1)));
    }
    let input = Pattern::parse(parts[0])?;
    let output = Pattern::parse(parts[1])?;
    if input.size() != output.size() {
        return Err(PatternError::DimensionMismatch {
            input: input.size(),
            output: output.size(),
        });
    }
    Ok((input, output))
}
