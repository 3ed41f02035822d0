//! Symmetry flags and expansion of a base pattern into its rotated and
//! reflected variants.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::pattern::Pattern;
use std::fmt;
use std::str::FromStr;

/// The six symmetry flags of a rule: rotation and reflection about each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symmetries {
    /// Enable 90/180/270 degree rotations about X.
    pub rot_x: bool,
    /// Enable 90/180/270 degree rotations about Y.
    pub rot_y: bool,
    /// Enable 90/180/270 degree rotations about Z.
    pub rot_z: bool,
    /// Enable mirroring about X.
    pub ref_x: bool,
    /// Enable mirroring about Y.
    pub ref_y: bool,
    /// Enable mirroring about Z.
    pub ref_z: bool,
}

impl Symmetries {
    /// No symmetry: only the base pattern.
    pub const NONE: Self = Self {
        rot_x: false,
        rot_y: false,
        rot_z: false,
        ref_x: false,
        ref_y: false,
        ref_z: false,
    };

    /// All rotations and reflections enabled.
    pub const ALL: Self = Self {
        rot_x: true,
        rot_y: true,
        rot_z: true,
        ref_x: true,
        ref_y: true,
        ref_z: true,
    };

    /// Parses a single-character flag token: `t` or `f`.
    pub fn parse_flag(token: &str) -> Result<bool, PatternError> {
        match token {
            "t" => Ok(true),
            "f" => Ok(false),
            other => Err(PatternError::InvalidSymmetryFlag(other.to_string())),
        }
    }
}

impl FromStr for Symmetries {
    type Err = PatternError;

    /// Parses six flag characters in `rotx roty rotz refx refy refz` order,
    /// e.g. `"tftfff"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags: Vec<char> = s.chars().collect();
        if flags.len() != 6 {
            return Err(PatternError::SymmetryCount(flags.len()));
        }
        let mut parsed = [false; 6];
        for (slot, c) in parsed.iter_mut().zip(&flags) {
            *slot = Symmetries::parse_flag(&c.to_string())?;
        }
        Ok(Self {
            rot_x: parsed[0],
            rot_y: parsed[1],
            rot_z: parsed[2],
            ref_x: parsed[3],
            ref_y: parsed[4],
            ref_z: parsed[5],
        })
    }
}

/// One symmetry variant of a base pattern.
///
/// Rotations change which axis is the depth axis, so a transformed pattern
/// generally has different extents than its base (`RotX90` maps extents
/// `(x, y, z)` to `(x, z, y)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Transform {
    /// The untransformed pattern. Always present.
    Base,
    /// 90 degrees about X.
    RotX90,
    /// 180 degrees about X.
    RotX180,
    /// 270 degrees about X.
    RotX270,
    /// 90 degrees about Y.
    RotY90,
    /// 180 degrees about Y.
    RotY180,
    /// 270 degrees about Y.
    RotY270,
    /// 90 degrees about Z.
    RotZ90,
    /// 180 degrees about Z.
    RotZ180,
    /// 270 degrees about Z.
    RotZ270,
    /// Mirrored about X.
    RefX,
    /// Mirrored about Y.
    RefY,
    /// Mirrored about Z.
    RefZ,
}

impl Transform {
    /// Returns the transform key string (`"base"`, `"rotx90"`, `"refz"`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Transform::Base => "base",
            Transform::RotX90 => "rotx90",
            Transform::RotX180 => "rotx180",
            Transform::RotX270 => "rotx270",
            Transform::RotY90 => "roty90",
            Transform::RotY180 => "roty180",
            Transform::RotY270 => "roty270",
            Transform::RotZ90 => "rotz90",
            Transform::RotZ180 => "rotz180",
            Transform::RotZ270 => "rotz270",
            Transform::RefX => "refx",
            Transform::RefY => "refy",
            Transform::RefZ => "refz",
        }
    }

    /// Returns the transforms enabled by the given flags, `Base` first.
    pub fn enabled(sym: Symmetries) -> Vec<Transform> {
        let mut list = vec![Transform::Base];
        if sym.rot_x {
            list.extend([Transform::RotX90, Transform::RotX180, Transform::RotX270]);
        }
        if sym.rot_y {
            list.extend([Transform::RotY90, Transform::RotY180, Transform::RotY270]);
        }
        if sym.rot_z {
            list.extend([Transform::RotZ90, Transform::RotZ180, Transform::RotZ270]);
        }
        if sym.ref_x {
            list.push(Transform::RefX);
        }
        if sym.ref_y {
            list.push(Transform::RefY);
        }
        if sym.ref_z {
            list.push(Transform::RefZ);
        }
        list
    }

    /// Applies this transform to a base pattern.
    ///
    /// Each variant is computed from the base with its own index map, never
    /// by composing quarter turns.
    pub fn apply(self, base: &Pattern) -> Pattern {
        let s = base.size();
        match self {
            Transform::Base => base.clone(),
            Transform::RotX90 => Pattern::from_fn(s.with_y(s.z).with_z(s.y), |x, y, z| {
                base.get(x, s.y - 1 - z, y).clone()
            }),
            Transform::RotX180 => {
                Pattern::from_fn(s, |x, y, z| base.get(x, s.y - 1 - y, s.z - 1 - z).clone())
            }
            Transform::RotX270 => Pattern::from_fn(s.with_y(s.z).with_z(s.y), |x, y, z| {
                base.get(x, z, s.z - 1 - y).clone()
            }),
            Transform::RotY90 => Pattern::from_fn(s.with_x(s.z).with_z(s.x), |x, y, z| {
                base.get(z, y, s.z - 1 - x).clone()
            }),
            Transform::RotY180 => {
                Pattern::from_fn(s, |x, y, z| base.get(s.x - 1 - x, y, s.z - 1 - z).clone())
            }
            Transform::RotY270 => Pattern::from_fn(s.with_x(s.z).with_z(s.x), |x, y, z| {
                base.get(s.x - 1 - z, y, x).clone()
            }),
            Transform::RotZ90 => Pattern::from_fn(s.with_x(s.y).with_y(s.x), |x, y, z| {
                base.get(s.x - 1 - y, x, z).clone()
            }),
            Transform::RotZ180 => {
                Pattern::from_fn(s, |x, y, z| base.get(s.x - 1 - x, s.y - 1 - y, z).clone())
            }
            Transform::RotZ270 => Pattern::from_fn(s.with_x(s.y).with_y(s.x), |x, y, z| {
                base.get(y, s.y - 1 - x, z).clone()
            }),
            Transform::RefX => Pattern::from_fn(s, |x, y, z| base.get(s.x - 1 - x, y, z).clone()),
            Transform::RefY => Pattern::from_fn(s, |x, y, z| base.get(x, s.y - 1 - y, z).clone()),
            Transform::RefZ => Pattern::from_fn(s, |x, y, z| base.get(x, y, s.z - 1 - z).clone()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Expands a base pattern into its distinct variants under the given flags.
///
/// Variants whose content structurally equals an already-recorded variant
/// are dropped, so a self-symmetric pattern yields fewer entries.
pub fn expand(base: &Pattern, sym: Symmetries) -> Vec<(Transform, Pattern)> {
    let mut variants: Vec<(Transform, Pattern)> = Vec::new();
    for t in Transform::enabled(sym) {
        let p = t.apply(base);
        if variants.iter().any(|(_, seen)| *seen == p) {
            continue;
        }
        variants.push((t, p));
    }
    variants
}

/// Expands a rule's input and output patterns together under the same flags.
///
/// De-duplication is decided jointly over the (input, output) pair, so both
/// families always expose exactly the same transform keys even when one side
/// is self-symmetric and the other is not. Input and output must have
/// identical extents.
pub fn expand_pair(
    input: &Pattern,
    output: &Pattern,
    sym: Symmetries,
) -> Result<Vec<(Transform, Pattern, Pattern)>, PatternError> {
    if input.size() != output.size() {
        return Err(PatternError::DimensionMismatch {
            input: input.size(),
            output: output.size(),
        });
    }
    let mut variants: Vec<(Transform, Pattern, Pattern)> = Vec::new();
    for t in Transform::enabled(sym) {
        let pi = t.apply(input);
        let po = t.apply(output);
        if variants.iter().any(|(_, si, so)| *si == pi && *so == po) {
            continue;
        }
        variants.push((t, pi, po));
    }
    Ok(variants)
}
