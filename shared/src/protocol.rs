//! Wire protocol between the game server and its clients.
//!
//! Events are externally tagged with kebab-case names so that a JSON text
//! frame reads like a named event (`{"player-added": {...}}`), which is what
//! browser clients speak. Native clients use the same enums encoded with
//! bincode in binary frames.

use crate::entity::{AttachedBlock, Block, BlockId, Input, PlayerId};
use crate::vector::{GridPoint, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What other parties see of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Vector2,
    pub blocks: Vec<AttachedBlock>,
    pub score: u32,
    pub name: String,
    pub last_rendered_input: u32,
}

/// Periodic authoritative state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub players: Vec<PlayerSnapshot>,
    pub blocks: Vec<Block>,
}

impl Snapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|player| player.id == id)
    }
}

/// Initial state handed to a joining client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub client_player_id: PlayerId,
    pub server_time: f64,
    pub players: Vec<PlayerSnapshot>,
    pub blocks: Vec<Block>,
    pub solution_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientEvent {
    Input(Input),
    Attach {
        player_id: PlayerId,
        block_id: BlockId,
        relative_position: GridPoint,
    },
    Detach {
        player_id: PlayerId,
    },
    #[serde(rename = "playername")]
    PlayerName {
        name: String,
    },
    ManualPing {
        time: f64,
    },
    SetPositionAck {
        locked: bool,
    },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    PlayerAdded {
        player: PlayerSnapshot,
    },
    PlayerRemoved {
        player_id: PlayerId,
    },
    ServerUpdate(Snapshot),
    /// Snaps the receiving player to `position` and locks or releases it.
    SetPosition {
        locked: bool,
        position: Vector2,
    },
    SolutionChanged {
        solution_index: usize,
    },
    ManualPing {
        time: f64,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),
}

/// A single transport frame, independent of the socket library.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Encoding chosen by a connection when it is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

impl WireFormat {
    /// Request path that selects this format on the server.
    pub fn path(self) -> &'static str {
        match self {
            WireFormat::Json => "/",
            WireFormat::Binary => "/bin",
        }
    }

    pub fn from_path(path: &str) -> Self {
        if path.trim_end_matches('/') == "/bin" {
            WireFormat::Binary
        } else {
            WireFormat::Json
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Frame, ProtocolError> {
        match self {
            WireFormat::Json => Ok(Frame::Text(serde_json::to_string(value)?)),
            WireFormat::Binary => Ok(Frame::Binary(bincode::serialize(value)?)),
        }
    }
}

/// Decodes a frame by its own kind: text is JSON, binary is bincode.
pub fn decode<T: for<'de> Deserialize<'de>>(frame: &Frame) -> Result<T, ProtocolError> {
    match frame {
        Frame::Text(text) => Ok(serde_json::from_str(text)?),
        Frame::Binary(bytes) => Ok(bincode::deserialize(bytes)?),
    }
}
