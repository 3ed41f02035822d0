//! Randomized search for rule placements in a grid.

use crate::grid::Grid;
use crate::rng::Rng;
use crate::rule::{Rule, Variant};
use glam::UVec3;
use tracing::{debug, trace};

/// One placement of a rule variant: the anchor position of the pattern's
/// `(0,0,0)` corner and the index of the matched variant.
///
/// A match references grid positions, never cell copies; it is created and
/// consumed within a single search-and-apply step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    /// Grid position the pattern origin is anchored at.
    pub origin: UVec3,
    /// Index into the rule's variant list.
    pub variant: usize,
}

/// Searches the grid for placements of the rule's variants in randomized
/// order.
///
/// The search itself counts one operation. Cells are visited in a shuffled
/// order, and at each cell the variants are tried in a fresh shuffled order
/// with the pattern origin anchored at the cell. Fully-matched placements
/// whose output would change nothing are discarded. With `find_all` the
/// whole space is scanned and every valid match collected (they may
/// overlap); otherwise the first valid match returns immediately.
///
/// Returns an empty list when no valid match exists, in which case the rule
/// is marked finished for this round.
pub fn find_matches(
    grid: &mut Grid,
    rule: &mut Rule,
    rng: &mut Rng,
    max_ops: usize,
    find_all: bool,
) -> Vec<RuleMatch> {
    grid.increment_op();
    trace!(ops = grid.op_count(), find_all, "searching for matches");

    let mut order = grid.positions();
    rng.shuffle(&mut order);
    let mut variant_order: Vec<usize> = (0..rule.variants().len()).collect();

    let mut matches = Vec::new();
    for origin in order {
        if grid.op_count() >= max_ops {
            break;
        }
        rng.shuffle(&mut variant_order);
        for &vi in &variant_order {
            let variant = &rule.variants()[vi];
            if !placement_matches(grid, variant, origin) {
                continue;
            }
            if is_noop(grid, variant, origin) {
                trace!(
                    x = origin.x,
                    y = origin.y,
                    z = origin.z,
                    "discarding no-op match"
                );
                continue;
            }
            matches.push(RuleMatch {
                origin,
                variant: vi,
            });
            if !find_all {
                return matches;
            }
        }
    }

    if matches.is_empty() {
        debug!("no match found, rule finished for this round");
        rule.mark_finished();
    }
    matches
}

/// Checks a placement: every non-wildcard input cell must be in bounds and
/// equal the grid state. Any failure aborts the whole placement.
fn placement_matches(grid: &Grid, variant: &Variant, origin: UVec3) -> bool {
    let size = variant.input.size();
    for z in 0..size.z {
        for y in 0..size.y {
            for x in 0..size.x {
                let pos = origin + UVec3::new(x, y, z);
                if !grid.in_bounds(pos) {
                    return false;
                }
                if let Some(state) = variant.input.get(x, y, z).state() {
                    if grid.state(pos) != state {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Returns true if applying the variant's output at this placement would
/// leave every cell unchanged.
fn is_noop(grid: &Grid, variant: &Variant, origin: UVec3) -> bool {
    let size = variant.output.size();
    for z in 0..size.z {
        for y in 0..size.y {
            for x in 0..size.x {
                if let Some(state) = variant.output.get(x, y, z).state() {
                    if grid.state(origin + UVec3::new(x, y, z)) != state {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Writes the match's output pattern into the grid. Wildcard cells are left
/// unchanged. Usage counters, the operation counter and frame output are the
/// caller's responsibility.
pub fn apply_match(grid: &mut Grid, rule: &Rule, m: &RuleMatch) {
    let variant = &rule.variants()[m.variant];
    let size = variant.output.size();
    for z in 0..size.z {
        for y in 0..size.y {
            for x in 0..size.x {
                if let Some(state) = variant.output.get(x, y, z).state() {
                    grid.set_state(m.origin + UVec3::new(x, y, z), state);
                }
            }
        }
    }
}
