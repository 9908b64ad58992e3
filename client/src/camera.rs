use shared::{Vector2, WORLD_HEIGHT, WORLD_WIDTH};

/// Viewport into the world, following the local player and clamped to the
/// world edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World position of the viewport's top-left corner.
    pub view: Vector2,
    pub width: f32,
    pub height: f32,
}

impl Camera {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            view: Vector2::ZERO,
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    /// Centres the viewport on `target` without showing outside the world.
    pub fn follow(&mut self, target: Vector2) {
        let max_x = (WORLD_WIDTH - self.width).max(0.0);
        let max_y = (WORLD_HEIGHT - self.height).max(0.0);

        self.view = Vector2::new(
            (target.x - self.width / 2.0).clamp(0.0, max_x),
            (target.y - self.height / 2.0).clamp(0.0, max_y),
        );
    }

    pub fn to_screen(&self, world: Vector2) -> Vector2 {
        world.subtract(&self.view)
    }

    pub fn to_world(&self, screen: Vector2) -> Vector2 {
        screen.add(&self.view)
    }

    /// True if a square of `size` centred at `world` overlaps the viewport.
    pub fn is_visible(&self, world: Vector2, size: f32) -> bool {
        let screen = self.to_screen(world);
        let half = size / 2.0;
        screen.x + half >= 0.0
            && screen.y + half >= 0.0
            && screen.x - half <= self.width
            && screen.y - half <= self.height
    }
}
