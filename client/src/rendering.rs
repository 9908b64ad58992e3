use crate::camera::Camera;
use crate::game::{ClientGameState, Toggles};
use macroquad::prelude::*;
use shared::solution::grid_origin;
use shared::{Player, Rgb, Vector2, NUM_COLS, NUM_ROWS, OUTLINE_SIZE, SQUARE_SEPARATION, SQUARE_SIZE};

const LEADERBOARD_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub connected: bool,
    pub toggles: Toggles,
    pub ping_ms: f64,
    pub fake_ping_ms: u64,
    pub player_count: usize,
}

fn color(rgb: Rgb, opacity: f32) -> Color {
    Color::from_rgba(rgb.0, rgb.1, rgb.2, (opacity.clamp(0.0, 1.0) * 255.0) as u8)
}

pub struct Renderer {
    fake_ping_ms: u64,
}

impl Renderer {
    pub fn new(fake_ping_ms: u64) -> Self {
        Renderer { fake_ping_ms }
    }

    pub fn render(&self, game: &ClientGameState, camera: &Camera) {
        clear_background(Color::from_rgba(245, 245, 240, 255));

        self.draw_grid(camera);
        self.draw_solution(game, camera);

        let candidate = game.local_player().and_then(|player| player.candidate_block);
        for block in game.blocks() {
            if !camera.is_visible(block.position, SQUARE_SIZE) {
                continue;
            }
            let highlighted = Some(block.id) == candidate;
            let outline = if highlighted { ORANGE } else { DARKGRAY };
            self.draw_square(camera, block.position, color(block.color, block.opacity), outline);
        }

        for player in game.players() {
            let is_local_player = Some(player.id) == game.player_id();
            self.draw_player(player, camera, is_local_player);
        }

        self.draw_leaderboard(game);
        self.draw_ui(UiConfig {
            connected: game.is_connected(),
            toggles: game.toggles(),
            ping_ms: game.net_ping(),
            fake_ping_ms: self.fake_ping_ms,
            player_count: game.players().count(),
        });
    }

    fn draw_square(&self, camera: &Camera, center: Vector2, fill: Color, outline: Color) {
        let screen = camera.to_screen(center);
        let half = SQUARE_SIZE / 2.0;
        draw_rectangle(screen.x - half, screen.y - half, SQUARE_SIZE, SQUARE_SIZE, fill);
        draw_rectangle_lines(
            screen.x - half,
            screen.y - half,
            SQUARE_SIZE,
            SQUARE_SIZE,
            OUTLINE_SIZE,
            outline,
        );
    }

    fn draw_grid(&self, camera: &Camera) {
        let origin = camera.to_screen(grid_origin());
        let line = Color::from_rgba(200, 200, 200, 255);

        for column in 0..=NUM_COLS {
            let x = origin.x + column as f32 * SQUARE_SEPARATION;
            draw_line(x, origin.y, x, origin.y + NUM_ROWS as f32 * SQUARE_SEPARATION, 1.0, line);
        }
        for row in 0..=NUM_ROWS {
            let y = origin.y + row as f32 * SQUARE_SEPARATION;
            draw_line(origin.x, y, origin.x + NUM_COLS as f32 * SQUARE_SEPARATION, y, 1.0, line);
        }
    }

    fn draw_solution(&self, game: &ClientGameState, camera: &Camera) {
        let Some(solution) = game.solution() else {
            return;
        };
        let fill = Color::from_rgba(0, 173, 238, 60);
        for (_, center) in solution.cell_centers() {
            self.draw_square(camera, center, fill, Color::from_rgba(0, 173, 238, 120));
        }
    }

    fn draw_player(&self, player: &Player, camera: &Camera, is_local_player: bool) {
        if !camera.is_visible(player.position, SQUARE_SIZE * 10.0) {
            return;
        }

        let outline = if is_local_player { BLACK } else { GRAY };
        for (block, position) in player.blocks.iter().zip(player.block_positions()) {
            self.draw_square(camera, position, color(block.color, block.opacity), outline);
        }

        if !player.name.is_empty() {
            let screen = camera.to_screen(player.position);
            let dimensions = measure_text(&player.name, None, 16, 1.0);
            draw_text(
                &player.name,
                screen.x - dimensions.width / 2.0,
                screen.y - SQUARE_SIZE,
                16.0,
                BLACK,
            );
        }
    }

    fn draw_leaderboard(&self, game: &ClientGameState) {
        let x = screen_width() - 180.0;
        let mut y = 20.0;
        draw_text("Leaderboard", x, y, 18.0, BLACK);

        for (rank, player) in game.leaderboard(LEADERBOARD_SIZE).into_iter().enumerate() {
            y += 18.0;
            let name = if player.name.is_empty() {
                player.id.to_string()
            } else {
                player.name.clone()
            };
            let line = format!("{}. {} {}", rank + 1, name, player.score);
            let text_color = if Some(player.id) == game.player_id() {
                BLUE
            } else {
                DARKGRAY
            };
            draw_text(&line, x, y, 16.0, text_color);
        }
    }

    fn draw_ui(&self, config: UiConfig) {
        let y_start = 10.0;
        let indicator_size = 12.0;
        let spacing = 25.0;

        let features = [
            ("P", config.toggles.prediction),
            ("R", config.toggles.reconciliation),
            ("I", config.toggles.interpolation),
        ];

        for (i, (label, enabled)) in features.iter().enumerate() {
            let x = 10.0 + (i as f32) * spacing;
            let indicator = if *enabled { GREEN } else { RED };

            draw_rectangle(x, y_start, indicator_size, indicator_size, indicator);
            draw_rectangle_lines(x, y_start, indicator_size, indicator_size, 1.0, BLACK);

            draw_text(label, x + 3.0, y_start + indicator_size + 12.0, 12.0, BLACK);
        }

        let connection_color = if config.connected { GREEN } else { RED };
        draw_rectangle(10.0, y_start + 35.0, 8.0, 8.0, connection_color);
        draw_text(
            &format!("CON ({} players)", config.player_count),
            20.0,
            y_start + 35.0 + 8.0,
            12.0,
            BLACK,
        );

        let ping_y = y_start + 50.0;
        let total_ping = config.ping_ms.max(0.0) as u64 + config.fake_ping_ms;
        let ping_bars = (total_ping / 20).min(10) as i32;

        for i in 0..10i32 {
            let bar_color = if i < ping_bars {
                if total_ping < 50 {
                    GREEN
                } else if total_ping < 100 {
                    YELLOW
                } else {
                    RED
                }
            } else {
                Color::from_rgba(200, 200, 200, 255)
            };

            draw_rectangle(10.0 + (i as f32) * 3.0, ping_y, 2.0, 8.0, bar_color);
        }

        draw_text(&format!("{}ms", total_ping), 45.0, ping_y + 8.0, 12.0, BLACK);
    }
}
