//! # Shared
//!
//! Types and rules used by both the authoritative server and the predicting
//! client. Anything that influences where a player ends up after an input
//! lives here, so both sides compute it identically:
//!
//! - [`vector`]: 2D world vectors and lattice points
//! - [`edge`]: classification of the contact side between two blocks
//! - [`entity`]: players, free blocks, attached blocks and inputs
//! - [`solution`]: the target shapes, the puzzle grid and the validity check
//! - [`physics`]: input displacement, collision resolution and the sim clock
//! - [`protocol`]: wire events and the JSON/bincode frame codec

pub mod edge;
pub mod entity;
pub mod physics;
pub mod protocol;
pub mod solution;
pub mod vector;

pub use edge::Edge;
pub use entity::{
    leaderboard, sanitize_name, AttachedBlock, Block, BlockId, Input, Player, PlayerId, Rgb,
};
pub use protocol::{
    ClientEvent, ConnectedPayload, Frame, PlayerSnapshot, ProtocolError, ServerEvent, Snapshot,
    WireFormat,
};
pub use solution::{Solution, SolutionCatalog};
pub use vector::{GridPoint, Vector2};

// Timing, in milliseconds.
pub const TIMER_PERIOD_MS: u64 = 4;
pub const PHYSICS_UPDATE_PERIOD_MS: u64 = 15;
pub const SERVER_UPDATE_PERIOD_MS: u64 = 45;
pub const PING_PERIOD_MS: u64 = 1000;
pub const SOLUTION_HOLD_TIME_MS: u64 = 2000;
pub const LOCK_ACK_TIMEOUT_MS: u64 = 1000;
pub const BLOCK_GENERATION_PERIOD_MS: u64 = 30_000;
pub const FPS: usize = 60;

// Geometry, in world pixels.
pub const SQUARE_SIZE: f32 = 40.0;
pub const OUTLINE_SIZE: f32 = 4.0;
pub const SQUARE_SEPARATION: f32 = SQUARE_SIZE + OUTLINE_SIZE / 2.0;
pub const WORLD_WIDTH: f32 = 4000.0;
pub const WORLD_HEIGHT: f32 = 4000.0;
pub const NUM_ROWS: i32 = 16;
pub const NUM_COLS: i32 = 11;

pub const MAX_PLAYER_SPEED: f32 = 300.0;
/// Pointer distance from the player that maps to full speed.
pub const MAX_DIRECTION_MAGNITUDE: f32 = 400.0;
pub const MAX_SOLUTION_DISTANCE: f32 = SQUARE_SIZE / 2.0;
pub const MAX_PICKUP_DISTANCE: f32 = 2.0 * SQUARE_SIZE;

pub const MAX_PLAYER_BLOCKS: usize = 15;
pub const MAX_HEALTH: u32 = 100;
pub const SCORE_SCALE_FACTOR: u32 = 10;
pub const MAX_NAME_LENGTH: usize = 16;

// Sessions.
pub const MAX_PLAYERS_PER_GAME: usize = 10;
pub const INITIAL_NUM_BLOCKS: usize = 160;
pub const MAX_BLOCKS_GENERATED: usize = 180;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_constants() {
        assert_eq!(SQUARE_SEPARATION, 42.0);
        assert_eq!(MAX_SOLUTION_DISTANCE, 20.0);
        assert_eq!(MAX_PICKUP_DISTANCE, 80.0);
    }
}
