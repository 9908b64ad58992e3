use crate::vector::{GridPoint, Vector2};
use serde::{Deserialize, Serialize};

/// Side of a square block, used for collision separation and for choosing
/// where a candidate block attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    None,
}

impl Edge {
    /// Classifies the direction vector between two blocks into the edge it
    /// passes through, comparing the horizontal and vertical components.
    pub fn from_direction(direction: Vector2) -> Edge {
        if direction.x > 0.0 {
            if direction.y.abs() < direction.x {
                Edge::Left
            } else if direction.y >= direction.x {
                Edge::Top
            } else {
                Edge::Bottom
            }
        } else if direction.y.abs() < -direction.x {
            Edge::Right
        } else if direction.y >= -direction.x {
            Edge::Top
        } else {
            Edge::Bottom
        }
    }

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
            Edge::None => Edge::None,
        }
    }

    pub fn is_valid(self) -> bool {
        self != Edge::None
    }

    /// Lattice step from a block to the neighbouring cell across this edge.
    pub fn relative_offset(self) -> GridPoint {
        match self {
            Edge::Top => GridPoint::new(0, -1),
            Edge::Bottom => GridPoint::new(0, 1),
            Edge::Right => GridPoint::new(1, 0),
            Edge::Left => GridPoint::new(-1, 0),
            Edge::None => GridPoint::ORIGIN,
        }
    }
}
