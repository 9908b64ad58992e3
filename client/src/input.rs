//! Client input sampling and direction normalisation

use macroquad::prelude::*;
use shared::{Vector2, MAX_DIRECTION_MAGNITUDE, SQUARE_SIZE};

/// Key presses detected this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Pointer position in screen space.
    pub pointer: Vector2,
    pub attach: bool,
    pub detach: bool,
    pub toggle_prediction: bool,
    pub toggle_reconciliation: bool,
    pub toggle_interpolation: bool,
}

/// Converts the raw pointer offset from the local player into a movement
/// direction of at most unit length.
///
/// Offsets inside the dead zone, or any offset while movement is disabled,
/// give zero. Otherwise the offset is scaled so that `MAX_DIRECTION_MAGNITUDE`
/// pixels map to full speed.
pub fn normalize_direction(raw: Vector2, movement_enabled: bool) -> Vector2 {
    if !movement_enabled || raw.magnitude() < SQUARE_SIZE / 2.0 {
        return Vector2::ZERO;
    }

    let scaled = raw.scale(1.0 / MAX_DIRECTION_MAGNITUDE);
    if scaled.magnitude() > 1.0 {
        scaled.normalize()
    } else {
        scaled
    }
}

/// Returns true on the frame a key goes down.
fn pressed(previous: &mut bool, down: bool) -> bool {
    let edge = down && !*previous;
    *previous = down;
    edge
}

/// Samples the pointer and the action keys once per frame.
#[derive(Default)]
pub struct InputManager {
    prev_space: bool,
    prev_backspace: bool,
    prev_key_1: bool,
    prev_key_2: bool,
    prev_key_3: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self) -> FrameInput {
        let (x, y) = mouse_position();

        FrameInput {
            pointer: Vector2::new(x, y),
            attach: pressed(&mut self.prev_space, is_key_down(KeyCode::Space)),
            detach: pressed(&mut self.prev_backspace, is_key_down(KeyCode::Backspace)),
            toggle_prediction: pressed(&mut self.prev_key_1, is_key_down(KeyCode::Key1)),
            toggle_reconciliation: pressed(&mut self.prev_key_2, is_key_down(KeyCode::Key2)),
            toggle_interpolation: pressed(&mut self.prev_key_3, is_key_down(KeyCode::Key3)),
        }
    }
}
