//! The 3D cell grid that rules rewrite in place.

use crate::error::EngineError;
use glam::UVec3;
use tracing::{debug, warn};

fn is_valid_state(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// One cell of a grid: fixed coordinates, mutable state token.
#[derive(Debug, Clone)]
pub struct Cell {
    pos: UVec3,
    state: String,
}

impl Cell {
    fn new(pos: UVec3, state: &str) -> Self {
        Self {
            pos,
            state: state.to_string(),
        }
    }

    /// Returns the cell's coordinates.
    pub fn pos(&self) -> UVec3 {
        self.pos
    }

    /// Returns the current state token.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Sets the state token.
    ///
    /// Non-alphanumeric tokens are rejected with a warning and the state is
    /// left unchanged; the rest of the rewrite proceeds.
    pub fn set_state(&mut self, state: &str) {
        if is_valid_state(state) {
            self.state = state.to_string();
        } else {
            warn!(
                x = self.pos.x,
                y = self.pos.y,
                z = self.pos.z,
                state,
                "cell state not set: invalid state token"
            );
        }
    }
}

/// A fixed-size 3D grid of cells.
///
/// The grid owns the per-run operation counter and an append-only history of
/// serialized frames. Frames are separated by `&`; within a frame Z-planes
/// are separated by `/`, rows by `;` and cells by `,`. A frame is appended on
/// construction, on reset, after every single-mode rule application and once
/// per parallel batch.
#[derive(Debug, Clone)]
pub struct Grid {
    name: String,
    size: UVec3,
    default_state: String,
    cells: Vec<Cell>,
    op_count: usize,
    history: String,
    frame_count: usize,
}

impl Grid {
    /// Creates a grid with every cell in the default state.
    ///
    /// The default state must be alphanumeric. The initial frame is appended
    /// immediately.
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        depth: u32,
        default_state: &str,
    ) -> Result<Self, EngineError> {
        if !is_valid_state(default_state) {
            return Err(EngineError::InvalidState(default_state.to_string()));
        }
        let size = UVec3::new(width, height, depth);
        let mut cells = Vec::with_capacity((width * height * depth) as usize);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    cells.push(Cell::new(UVec3::new(x, y, z), default_state));
                }
            }
        }
        debug!(name, width, height, depth, "creating grid");
        let mut grid = Self {
            name: name.to_string(),
            size,
            default_state: default_state.to_string(),
            cells,
            op_count: 0,
            history: String::new(),
            frame_count: 0,
        };
        grid.append_frame();
        Ok(grid)
    }

    /// Returns the grid's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the grid dimensions.
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Returns the default state cells are reset to.
    pub fn default_state(&self) -> &str {
        &self.default_state
    }

    /// Returns the number of counted operations this run.
    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Counts one operation. The counter only ever increases between resets.
    pub fn increment_op(&mut self) {
        self.op_count += 1;
    }

    /// Returns the number of frames appended so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns the `&`-separated frame history for this run.
    pub fn history(&self) -> &str {
        &self.history
    }

    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (z * self.size.y * self.size.x + y * self.size.x + x) as usize
    }

    /// Returns true if the coordinates are within bounds.
    pub fn in_bounds(&self, pos: UVec3) -> bool {
        pos.x < self.size.x && pos.y < self.size.y && pos.z < self.size.z
    }

    /// Returns the cell at the given coordinates.
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds.
    pub fn cell(&self, pos: UVec3) -> &Cell {
        &self.cells[self.index(pos.x, pos.y, pos.z)]
    }

    /// Returns the state token at the given coordinates.
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds.
    pub fn state(&self, pos: UVec3) -> &str {
        self.cell(pos).state()
    }

    /// Sets the state at the given coordinates, subject to the cell's
    /// alphanumeric check.
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds.
    pub fn set_state(&mut self, pos: UVec3, state: &str) {
        let idx = self.index(pos.x, pos.y, pos.z);
        self.cells[idx].set_state(state);
    }

    /// Returns every cell position, in storage order.
    pub fn positions(&self) -> Vec<UVec3> {
        self.cells.iter().map(Cell::pos).collect()
    }

    /// Serializes the current cell states as one frame.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for z in 0..self.size.z {
            if z > 0 {
                out.push('/');
            }
            for y in 0..self.size.y {
                if y > 0 {
                    out.push(';');
                }
                for x in 0..self.size.x {
                    if x > 0 {
                        out.push(',');
                    }
                    out.push_str(self.state(UVec3::new(x, y, z)));
                }
            }
        }
        out
    }

    /// Appends the current state to the frame history.
    pub fn append_frame(&mut self) {
        self.frame_count += 1;
        if !self.history.is_empty() {
            self.history.push('&');
        }
        let frame = self.snapshot();
        self.history.push_str(&frame);
        debug!(frames = self.frame_count, "appended output frame");
    }

    /// Resets every cell to the default state, zeroes the operation counter,
    /// clears the history and appends the initial frame.
    pub fn reset(&mut self) {
        debug!(name = %self.name, "resetting grid");
        self.op_count = 0;
        for cell in &mut self.cells {
            cell.state = self.default_state.clone();
        }
        self.history.clear();
        self.frame_count = 0;
        self.append_frame();
    }
}
