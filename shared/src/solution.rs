//! Target shapes and the puzzle grid they are docked into.

use crate::entity::AttachedBlock;
use crate::vector::{GridPoint, Vector2};
use crate::{NUM_COLS, NUM_ROWS, SQUARE_SEPARATION, SQUARE_SIZE, WORLD_HEIGHT, WORLD_WIDTH};
use rand::Rng;
use std::collections::HashSet;

/// A target shape: a set of lattice cells with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub blocks: Vec<GridPoint>,
    pub width: i32,
    pub height: i32,
}

impl Solution {
    pub fn new(blocks: Vec<GridPoint>) -> Self {
        let width = blocks.iter().map(|b| b.x).max().unwrap_or(0) + 1;
        let height = blocks.iter().map(|b| b.y).max().unwrap_or(0) + 1;
        Self {
            blocks,
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// World position of the centre of `cell` when this solution is shown
    /// in the puzzle grid.
    pub fn cell_center(&self, cell: GridPoint) -> Vector2 {
        let origin = grid_origin();
        let column_offset = (NUM_COLS - self.width).div_euclid(2);
        let row_offset = (NUM_ROWS - self.height + 1).div_euclid(2);

        Vector2::new(
            origin.x + SQUARE_SEPARATION / 2.0 + (column_offset + cell.x) as f32 * SQUARE_SEPARATION,
            origin.y + SQUARE_SEPARATION / 2.0 + (row_offset + cell.y) as f32 * SQUARE_SEPARATION,
        )
    }

    /// Every cell paired with its world position, in catalog order.
    pub fn cell_centers(&self) -> impl Iterator<Item = (GridPoint, Vector2)> + '_ {
        self.blocks.iter().map(move |cell| (*cell, self.cell_center(*cell)))
    }

    /// Returns true when `blocks` forms exactly this shape and the primary
    /// block (index 0) sits on `claimed` once both are re-origined to (0, 0).
    pub fn matches(&self, blocks: &[AttachedBlock], claimed: GridPoint) -> bool {
        if blocks.len() != self.blocks.len() {
            return false;
        }
        let Some(primary) = blocks.first() else {
            return false;
        };

        let min_x = blocks.iter().map(|b| b.offset.x).min().unwrap_or(0);
        let min_y = blocks.iter().map(|b| b.offset.y).min().unwrap_or(0);
        let shift = GridPoint::new(-min_x, -min_y);

        if primary.offset.add(&shift) != claimed {
            return false;
        }

        let player_cells: HashSet<GridPoint> =
            blocks.iter().map(|b| b.offset.add(&shift)).collect();
        if player_cells.len() != blocks.len() {
            return false;
        }
        let solution_cells: HashSet<GridPoint> = self.blocks.iter().copied().collect();

        player_cells == solution_cells
    }
}

/// The fixed set of shapes players race to assemble.
#[derive(Debug, Clone)]
pub struct SolutionCatalog {
    solutions: Vec<Solution>,
}

impl SolutionCatalog {
    pub fn new(solutions: Vec<Solution>) -> Self {
        Self { solutions }
    }

    pub fn get(&self, index: usize) -> Option<&Solution> {
        self.solutions.get(index)
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.solutions.is_empty() {
            0
        } else {
            rng.gen_range(0..self.solutions.len())
        }
    }
}

impl Default for SolutionCatalog {
    fn default() -> Self {
        let shape = |cells: &[(i32, i32)]| {
            Solution::new(cells.iter().map(|&(x, y)| GridPoint::new(x, y)).collect())
        };

        Self::new(vec![
            shape(&[(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (2, 0), (2, 1)]),
            shape(&[(0, 0), (0, 1), (1, 1), (1, 0), (1, 2), (2, 1), (2, 2)]),
            shape(&[
                (0, 1), (0, 2), (0, 3), (0, 4), (2, 0),
                (3, 0), (3, 1), (3, 2), (2, 2), (1, 2),
            ]),
            shape(&[
                (1, 0), (1, 1), (1, 2), (1, 3), (2, 1), (2, 2),
                (2, 3), (3, 2), (0, 3), (0, 4), (0, 5),
            ]),
            shape(&[
                (0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0),
                (1, 1), (1, 2), (2, 2), (3, 2), (3, 1),
            ]),
            shape(&[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (1, 3), (1, 4), (1, 5), (1, 6)]),
        ])
    }
}

/// Top-left corner of the puzzle grid, which is centred in the world.
pub fn grid_origin() -> Vector2 {
    Vector2::new(
        WORLD_WIDTH / 2.0 - NUM_COLS as f32 * SQUARE_SEPARATION / 2.0,
        WORLD_HEIGHT / 2.0 - NUM_ROWS as f32 * SQUARE_SEPARATION / 2.0,
    )
}

/// Returns true if a block centred at `position` would overlap the puzzle grid.
pub fn in_grid_exclusion(position: Vector2) -> bool {
    let origin = grid_origin();
    let margin = SQUARE_SIZE / 2.0;
    let max_x = origin.x + NUM_COLS as f32 * SQUARE_SEPARATION;
    let max_y = origin.y + NUM_ROWS as f32 * SQUARE_SEPARATION;

    position.x >= origin.x - margin
        && position.x < max_x + margin
        && position.y >= origin.y - margin
        && position.y < max_y + margin
}
