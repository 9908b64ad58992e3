//! # Block Party Server Library
//!
//! Authoritative server for the multiplayer block puzzle. Players steer a
//! square avatar, pick up free blocks, and race to dock a shape matching the
//! active solution in the centre grid. The server owns every position in the
//! world; clients predict their own movement and reconcile against the
//! snapshots broadcast from here.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each [`session::Session`] advances its players with the shared displacement
//! law and collision rules on a fixed physics tick, owns the free-block pool,
//! and runs the solution matching and lock sequence. Only the session mutates
//! its players and blocks.
//!
//! ### Matchmaking
//! The [`matchmaker::Matchmaker`] places each new player in the first session
//! with room, creates a session when all are full, and destroys sessions once
//! their last player leaves.
//!
//! ### State Broadcasting
//! Snapshots of every session (players, free blocks, server time) go out on a
//! slower cadence than physics. Each snapshot carries the last input the server
//! applied for every player, which is what clients reconcile against.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! One task owns the matchmaker and all sessions. Connection tasks never touch
//! game state; they forward decoded events over a channel, and the main loop
//! applies them between ticks. Handlers therefore run to completion and a
//! session is never mutated concurrently.
//!
//! ### WebSocket Transport
//! Connections are WebSockets. The request path picks the encoding: `/bin`
//! gets bincode binary frames, anything else JSON text frames with named
//! events.
//!
//! ### Outbox Delivery
//! Session operations append to an outbox instead of writing to sockets. After
//! each step the loop drains the outboxes, resolves broadcasts to the current
//! members and hands frames to the [`connections::ConnectionManager`].
//!
//! ## Module Organization
//!
//! - `config`: server and per-session settings, JSON config file loading
//! - `lock`: the solution lock state machine
//! - `session`: one game's simulation
//! - `matchmaker`: session registry and event routing
//! - `connections`: per-player outbound channels and inactivity timeouts
//! - `network`: listener, connection tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     // Accepts connections, ticks physics every 15 ms, broadcasts
//!     // snapshots and tops up block pools until shut down.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connections;
pub mod lock;
pub mod matchmaker;
pub mod network;
pub mod session;
