//! # Game Client Library
//!
//! Client side of the block-assembly game. Input is applied to the local
//! player immediately and reconciled against the authoritative snapshots the
//! server broadcasts, while everybody else is rendered a fixed delay in the
//! past, interpolated between buffered snapshots.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The prediction, reconciliation and interpolation engine. It owns the
//! client's view of the world and turns server events and local input into
//! rendered positions plus a queue of events for the server.
//!
//! ### Snapshots Module (`snapshots`)
//! Bounded history of server snapshots and the bracket search used by
//! interpolation.
//!
//! ### Input Module (`input`)
//! Pointer and key sampling with rising-edge detection, and the direction
//! normalisation shared by every input the client sends.
//!
//! ### Camera Module (`camera`)
//! Viewport that follows the local player and maps between screen and
//! world coordinates.
//!
//! ### Network Module (`network`)
//! WebSocket connection on a background thread, JSON or bincode frames,
//! with optional simulated latency.
//!
//! ### Rendering Module (`rendering`)
//! Draws the grid, the target shape, blocks, players and the overlays.
//!
//! ## Runtime Toggles
//!
//! - `1`: client-side prediction
//! - `2`: server reconciliation
//! - `3`: interpolation
//!
//! `Space` attaches the highlighted block and `Backspace` drops the last
//! attached one.

pub mod camera;
pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod snapshots;
