//! World objects shared by the server simulation and the client engine.

use crate::edge::Edge;
use crate::protocol::PlayerSnapshot;
use crate::vector::{GridPoint, Vector2};
use crate::{MAX_HEALTH, MAX_NAME_LENGTH, SQUARE_SEPARATION, SQUARE_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned player identifier. Opaque to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PlayerId(pub u32);

/// Session-assigned identifier of a free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BlockId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const PLAYER_COLOR: Rgb = Rgb(45, 48, 146);
pub const BLOCK_COLOR: Rgb = Rgb(0, 173, 238);

/// A free block lying in the world, positioned by its centre in world pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub position: Vector2,
    pub size: Vector2,
    pub color: Rgb,
    pub health: u32,
    pub opacity: f32,
}

impl Block {
    pub fn new(id: BlockId, position: Vector2) -> Self {
        Self {
            id,
            position,
            size: Vector2::new(SQUARE_SIZE, SQUARE_SIZE),
            color: BLOCK_COLOR,
            health: MAX_HEALTH,
            opacity: 1.0,
        }
    }
}

/// A block carried by a player, positioned on the lattice relative to the
/// player's primary block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedBlock {
    pub offset: GridPoint,
    pub color: Rgb,
    pub health: u32,
    pub opacity: f32,
}

impl AttachedBlock {
    pub fn new(offset: GridPoint) -> Self {
        Self {
            offset,
            color: BLOCK_COLOR,
            health: MAX_HEALTH,
            opacity: 1.0,
        }
    }

    pub fn primary() -> Self {
        Self {
            color: PLAYER_COLOR,
            ..Self::new(GridPoint::ORIGIN)
        }
    }

    /// Converts this block back into a free world block anchored at `anchor`.
    pub fn into_free(self, id: BlockId, anchor: Vector2) -> Block {
        let mut block = Block::new(id, anchor.add(&self.offset.to_world(SQUARE_SEPARATION)));
        block.color = self.color;
        block
    }
}

/// One sampled movement intent. `direction` is already normalised to at most
/// unit length by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub time: f64,
    pub direction: Vector2,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub position: Vector2,
    /// Index 0 is the primary block and is never removed.
    pub blocks: Vec<AttachedBlock>,
    pub score: u32,
    pub name: String,
    pub inputs: Vec<Input>,
    pub last_rendered_input: u32,
    pub last_input_time: f64,
    pub candidate_block: Option<BlockId>,
    pub active_block_index: usize,
    pub active_edge: Edge,
}

impl Player {
    pub fn new(id: PlayerId, position: Vector2) -> Self {
        Self {
            id,
            position,
            blocks: vec![AttachedBlock::primary()],
            score: 0,
            name: String::new(),
            inputs: Vec::new(),
            last_rendered_input: 0,
            last_input_time: 0.0,
            candidate_block: None,
            active_block_index: 0,
            active_edge: Edge::None,
        }
    }

    /// World position of the attached block at `index`.
    pub fn block_position(&self, index: usize) -> Option<Vector2> {
        self.blocks
            .get(index)
            .map(|block| self.position.add(&block.offset.to_world(SQUARE_SEPARATION)))
    }

    pub fn block_positions(&self) -> impl Iterator<Item = Vector2> + '_ {
        self.blocks
            .iter()
            .map(|block| self.position.add(&block.offset.to_world(SQUARE_SEPARATION)))
    }

    pub fn has_block_at(&self, offset: GridPoint) -> bool {
        self.blocks.iter().any(|block| block.offset == offset)
    }

    pub fn clear_candidate(&mut self) {
        self.candidate_block = None;
        self.active_block_index = 0;
        self.active_edge = Edge::None;
    }

    /// The state other parties are allowed to see.
    pub fn light_copy(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            position: self.position,
            blocks: self.blocks.clone(),
            score: self.score,
            name: self.name.clone(),
            last_rendered_input: self.last_rendered_input,
        }
    }

    pub fn from_snapshot(snapshot: &PlayerSnapshot) -> Self {
        let mut player = Player::new(snapshot.id, snapshot.position);
        player.blocks = snapshot.blocks.clone();
        player.score = snapshot.score;
        player.name = snapshot.name.clone();
        player.last_rendered_input = snapshot.last_rendered_input;
        player
    }
}

/// Cleans a display name: trimmed, control characters removed and cut to
/// `MAX_NAME_LENGTH` characters.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LENGTH)
        .collect()
}

/// Players ranked by score (descending), ties broken by name.
pub fn leaderboard<'a>(players: impl IntoIterator<Item = &'a Player>, limit: usize) -> Vec<&'a Player> {
    let mut ranked: Vec<&Player> = players.into_iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}
