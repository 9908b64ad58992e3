use serde::{Deserialize, Serialize};

/// Linearly interpolates between `first` and `second`.
///
/// The interpolation point is clamped to `[0, 1]`: a point of 0 yields
/// `first`, a point of 1 yields `second`.
pub fn interpolate(first: f32, second: f32, point: f32) -> f32 {
    let point = point.clamp(0.0, 1.0);
    first + point * (second - first)
}

/// Represents a vector in 2D world (screen) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    /// Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    /// Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the unit vector pointing the same way, or zero for the zero vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Returns `self - other`.
    pub fn subtract(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        self.subtract(other).magnitude()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Component-wise interpolation towards `other`, see [`interpolate`].
    pub fn interpolate(&self, other: &Vector2, point: f32) -> Vector2 {
        Vector2 {
            x: interpolate(self.x, other.x, point),
            y: interpolate(self.y, other.y, point),
        }
    }
}

/// A point on the integer lattice used for attached-block offsets and
/// solution cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const ORIGIN: GridPoint = GridPoint { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        GridPoint { x, y }
    }

    pub fn add(&self, other: &GridPoint) -> GridPoint {
        GridPoint {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// World-space displacement of this lattice offset for cells of `separation` pixels.
    pub fn to_world(&self, separation: f32) -> Vector2 {
        Vector2 {
            x: self.x as f32 * separation,
            y: self.y as f32 * separation,
        }
    }
}
