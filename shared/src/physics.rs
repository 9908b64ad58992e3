//! Simulation rules common to the authoritative server and the predicting
//! client. Both sides must call exactly these functions so that replayed
//! inputs land on the same position the server computed.

use crate::edge::Edge;
use crate::entity::{Block, Player};
use crate::vector::Vector2;
use crate::{
    MAX_PLAYER_SPEED, PHYSICS_UPDATE_PERIOD_MS, SQUARE_SEPARATION, SQUARE_SIZE, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use std::time::Duration;

/// Distance covered in one physics tick by a unit direction.
pub const DISPLACEMENT_PER_TICK: f32 = MAX_PLAYER_SPEED * PHYSICS_UPDATE_PERIOD_MS as f32 / 1000.0;

/// Local time base advanced by measured wall-clock deltas.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    local_time_ms: f64,
    delta_ms: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(local_time_ms: f64) -> Self {
        Self {
            local_time_ms,
            delta_ms: 0.0,
        }
    }

    pub fn advance(&mut self, delta: Duration) {
        self.delta_ms = delta.as_secs_f64() * 1000.0;
        self.local_time_ms += self.delta_ms;
    }

    pub fn local_time_ms(&self) -> f64 {
        self.local_time_ms
    }

    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }
}

/// Sums the directions of every buffered input newer than the player's last
/// rendered input and converts the sum into a displacement for one tick.
///
/// Advances `last_rendered_input` and `last_input_time` to the newest
/// buffered input. A player without inputs yields zero displacement.
pub fn process_direction_inputs(player: &mut Player) -> Vector2 {
    let mut direction = Vector2::ZERO;

    for input in &player.inputs {
        if input.sequence > player.last_rendered_input {
            direction = direction.add(&input.direction);
        }
    }

    if let Some(last) = player.inputs.last() {
        player.last_input_time = last.time;
        player.last_rendered_input = player.last_rendered_input.max(last.sequence);
    }

    direction.scale(DISPLACEMENT_PER_TICK)
}

/// Pushes the player out of any free block overlapping one of its attached
/// blocks, then keeps every attached block inside the world walls.
///
/// Resolution is along a single axis per contact, leaving the blocks exactly
/// `SQUARE_SEPARATION` apart.
pub fn resolve_collisions<'a, I>(player: &mut Player, free_blocks: I)
where
    I: IntoIterator<Item = &'a Block>,
    I::IntoIter: Clone,
{
    let free_blocks = free_blocks.into_iter();

    for index in 0..player.blocks.len() {
        let offset = player.blocks[index].offset.to_world(SQUARE_SEPARATION);

        for free in free_blocks.clone() {
            let block_position = player.position.add(&offset);
            let direction = free.position.subtract(&block_position);

            match Edge::from_direction(direction) {
                Edge::Top if direction.y < SQUARE_SEPARATION => {
                    player.position.y -= SQUARE_SEPARATION - direction.y;
                }
                Edge::Bottom if direction.y > -SQUARE_SEPARATION => {
                    player.position.y += SQUARE_SEPARATION + direction.y;
                }
                Edge::Right if direction.x > -SQUARE_SEPARATION => {
                    player.position.x += SQUARE_SEPARATION + direction.x;
                }
                Edge::Left if direction.x < SQUARE_SEPARATION => {
                    player.position.x -= SQUARE_SEPARATION - direction.x;
                }
                _ => {}
            }
        }

        let block_position = player.position.add(&offset);
        player.position.x += wall_correction(block_position.x, WORLD_WIDTH);
        player.position.y += wall_correction(block_position.y, WORLD_HEIGHT);
    }
}

fn wall_correction(coordinate: f32, extent: f32) -> f32 {
    if coordinate <= SQUARE_SIZE {
        SQUARE_SIZE - coordinate
    } else if coordinate >= extent - SQUARE_SIZE {
        extent - SQUARE_SIZE - coordinate
    } else {
        0.0
    }
}

/// Applies one physics tick to a player: displacement from buffered inputs,
/// then collision resolution. Returns the displacement that was applied.
pub fn step_player<'a, I>(player: &mut Player, free_blocks: I) -> Vector2
where
    I: IntoIterator<Item = &'a Block>,
    I::IntoIter: Clone,
{
    let displacement = process_direction_inputs(player);
    player.position = player.position.add(&displacement);
    resolve_collisions(player, free_blocks);
    displacement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttachedBlock, BlockId, Input, PlayerId};
    use crate::vector::GridPoint;
    use assert_approx_eq::assert_approx_eq;

    fn input(sequence: u32, x: f32, y: f32) -> Input {
        Input {
            time: sequence as f64 * 16.0,
            direction: Vector2::new(x, y),
            sequence,
        }
    }

    fn player_at(x: f32, y: f32) -> Player {
        Player::new(PlayerId(1), Vector2::new(x, y))
    }

    #[test]
    fn test_displacement_per_tick() {
        assert_approx_eq!(DISPLACEMENT_PER_TICK, 4.5);
    }

    #[test]
    fn test_no_inputs_yields_zero_displacement() {
        let mut player = player_at(100.0, 100.0);
        assert_eq!(process_direction_inputs(&mut player), Vector2::ZERO);
        assert_eq!(player.last_rendered_input, 0);
    }

    #[test]
    fn test_sums_only_unrendered_inputs() {
        let mut player = player_at(100.0, 100.0);
        player.last_rendered_input = 1;
        player.inputs = vec![input(1, 1.0, 0.0), input(2, 1.0, 0.0), input(3, 0.0, 1.0)];

        let displacement = process_direction_inputs(&mut player);

        assert_approx_eq!(displacement.x, 4.5);
        assert_approx_eq!(displacement.y, 4.5);
        assert_eq!(player.last_rendered_input, 3);
        assert_eq!(player.last_input_time, 48.0);

        // Nothing new to render on a second pass.
        assert_eq!(process_direction_inputs(&mut player), Vector2::ZERO);
    }

    #[test]
    fn test_overlap_pushes_player_to_separation() {
        let mut player = player_at(500.0, 500.0);
        let block = Block::new(BlockId(1), Vector2::new(520.0, 505.0));

        resolve_collisions(&mut player, [&block]);

        let dx = block.position.x - player.position.x;
        assert_approx_eq!(dx, SQUARE_SEPARATION);
        assert_approx_eq!(player.position.y, 500.0);
    }

    #[test]
    fn test_vertical_overlap_resolved_on_y() {
        let mut player = player_at(500.0, 500.0);
        let block = Block::new(BlockId(1), Vector2::new(495.0, 470.0));

        resolve_collisions(&mut player, [&block]);

        assert_approx_eq!(player.position.y - block.position.y, SQUARE_SEPARATION);
        assert_approx_eq!(player.position.x, 500.0);
    }

    #[test]
    fn test_distant_block_is_ignored() {
        let mut player = player_at(500.0, 500.0);
        let block = Block::new(BlockId(1), Vector2::new(700.0, 500.0));

        resolve_collisions(&mut player, [&block]);

        assert_eq!(player.position, Vector2::new(500.0, 500.0));
    }

    #[test]
    fn test_attached_blocks_are_kept_inside_walls() {
        let mut player = player_at(30.0, WORLD_HEIGHT - 10.0);
        player.blocks.push(AttachedBlock::new(GridPoint::new(-1, 0)));

        resolve_collisions(&mut player, std::iter::empty::<&Block>());

        for position in player.block_positions() {
            assert!(position.x >= SQUARE_SIZE - 1e-3);
            assert!(position.y <= WORLD_HEIGHT - SQUARE_SIZE + 1e-3);
        }
    }

    #[test]
    fn test_step_player_moves_then_collides() {
        let mut player = player_at(1000.0, 1000.0);
        player.inputs.push(input(1, 1.0, 0.0));
        let block = Block::new(BlockId(1), Vector2::new(1040.0, 1000.0));

        let displacement = step_player(&mut player, [&block]);

        assert_approx_eq!(displacement.x, 4.5);
        assert_approx_eq!(block.position.x - player.position.x, SQUARE_SEPARATION);
    }

    fn assert_separated(player: &Player, free_blocks: &[Block]) {
        for position in player.block_positions() {
            for free in free_blocks {
                let d = free.position.subtract(&position);
                assert!(
                    d.x.abs().max(d.y.abs()) >= SQUARE_SEPARATION - 1e-3,
                    "block at {:?} overlaps free block at {:?}",
                    position,
                    free.position
                );
            }
        }
    }

    #[test]
    fn test_attached_block_stops_at_free_block() {
        for (offset, direction) in [
            (GridPoint::new(1, 0), Vector2::new(1.0, 0.0)),
            (GridPoint::new(0, 1), Vector2::new(0.0, 1.0)),
        ] {
            let mut player = player_at(1000.0, 1000.0);
            player.blocks.push(AttachedBlock::new(offset));
            player.inputs.push(input(1, direction.x, direction.y));

            // Two pixels of gap beyond the attached block.
            let gap = offset.to_world(SQUARE_SEPARATION).scale(2.0);
            let free = Block::new(
                BlockId(1),
                Vector2::new(1000.0, 1000.0).add(&gap).add(&direction.scale(2.0)),
            );

            step_player(&mut player, [&free]);

            let attached = player.block_positions().nth(1).unwrap();
            let along = free.position.subtract(&attached);
            assert_approx_eq!(along.x.abs().max(along.y.abs()), SQUARE_SEPARATION, 1e-3);
            assert_approx_eq!(player.position.x, 1000.0 + direction.x * 2.0, 1e-3);
            assert_approx_eq!(player.position.y, 1000.0 + direction.y * 2.0, 1e-3);
        }
    }

    #[test]
    fn test_several_free_blocks_against_several_attached_blocks() {
        let mut player = player_at(1000.0, 1000.0);
        player.blocks.push(AttachedBlock::new(GridPoint::new(1, 0)));
        let free_blocks = [
            Block::new(BlockId(1), Vector2::new(1079.0, 1000.0)),
            Block::new(BlockId(2), Vector2::new(1000.0, 1039.0)),
        ];

        resolve_collisions(&mut player, free_blocks.iter());

        assert_approx_eq!(player.position.x, 995.0, 1e-3);
        assert_approx_eq!(player.position.y, 997.0, 1e-3);
        assert_separated(&player, &free_blocks);
    }

    #[test]
    fn test_random_single_overlaps_are_resolved() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let mut player = player_at(2000.0, 2000.0);
            let free = Block::new(
                BlockId(1),
                Vector2::new(
                    2000.0 + rng.gen_range(-SQUARE_SEPARATION..SQUARE_SEPARATION),
                    2000.0 + rng.gen_range(-SQUARE_SEPARATION..SQUARE_SEPARATION),
                ),
            );

            resolve_collisions(&mut player, [&free]);

            assert_separated(&player, std::slice::from_ref(&free));
        }
    }

    #[test]
    fn test_clock_advances_by_delta() {
        let mut clock = SimClock::new();
        clock.advance(Duration::from_millis(4));
        clock.advance(Duration::from_millis(6));
        assert_approx_eq!(clock.local_time_ms(), 10.0);
        assert_approx_eq!(clock.delta_ms(), 6.0);
    }
}
