//! Authoritative simulation of one game session.
//!
//! A session is the single writer of its players and free blocks. Every
//! operation runs to completion on the caller's task and records what has to
//! be sent in an outbox, which the network layer drains after each step.

use crate::config::SessionSettings;
use crate::lock::{LockStep, SolutionLock};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::physics::{process_direction_inputs, step_player, SimClock};
use shared::solution::in_grid_exclusion;
use shared::{
    sanitize_name, AttachedBlock, Block, BlockId, ConnectedPayload, GridPoint, Input, Player, PlayerId,
    ServerEvent, Snapshot, SolutionCatalog, Vector2, MAX_PLAYER_BLOCKS, MAX_SOLUTION_DISTANCE,
    SCORE_SCALE_FACTOR, SQUARE_SIZE, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A message the session wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        to: PlayerId,
        event: ServerEvent,
    },
    Broadcast {
        event: ServerEvent,
        exclude: Option<PlayerId>,
    },
}

pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    players: BTreeMap<PlayerId, Player>,
    blocks: BTreeMap<BlockId, Block>,
    next_block_id: u64,
    catalog: SolutionCatalog,
    solution_index: usize,
    lock: SolutionLock,
    clock: SimClock,
    rng: StdRng,
    outbox: Vec<Outbound>,
}

impl Session {
    /// Creates a session with a random active solution and a seeded block pool.
    pub fn new(id: SessionId, settings: SessionSettings, mut rng: StdRng) -> Self {
        let catalog = SolutionCatalog::default();
        let solution_index = catalog.random_index(&mut rng);

        let mut session = Self {
            id,
            settings,
            players: BTreeMap::new(),
            blocks: BTreeMap::new(),
            next_block_id: 1,
            catalog,
            solution_index,
            lock: SolutionLock::default(),
            clock: SimClock::new(),
            rng,
            outbox: Vec::new(),
        };
        session.generate_blocks(settings.initial_blocks);
        info!(
            "Created {} with {} blocks, solution {}",
            id,
            session.blocks.len(),
            solution_index
        );
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.keys().copied()
    }

    pub fn blocks(&self) -> &BTreeMap<BlockId, Block> {
        &self.blocks
    }

    pub fn solution_index(&self) -> usize {
        self.solution_index
    }

    pub fn lock(&self) -> &SolutionLock {
        &self.lock
    }

    pub fn local_time(&self) -> f64 {
        self.clock.local_time_ms()
    }

    /// Adds a player at a random spawn point, replies with the full initial
    /// state and announces it to everybody else.
    pub fn add_player(&mut self, id: PlayerId) -> &Player {
        let spawn = self.random_free_position();
        let player = Player::new(id, spawn);
        let snapshot = player.light_copy();
        self.players.insert(id, player);

        self.outbox.push(Outbound::Send {
            to: id,
            event: ServerEvent::Connected(ConnectedPayload {
                client_player_id: id,
                server_time: self.clock.local_time_ms(),
                players: self.players.values().map(Player::light_copy).collect(),
                blocks: self.blocks.values().cloned().collect(),
                solution_index: self.solution_index,
            }),
        });
        self.outbox.push(Outbound::Broadcast {
            event: ServerEvent::PlayerAdded { player: snapshot },
            exclude: Some(id),
        });

        info!("{} joined {} at ({:.0}, {:.0})", id, self.id, spawn.x, spawn.y);
        &self.players[&id]
    }

    /// Removes a player, releasing the solution if it held it.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        if self.players.remove(&id).is_none() {
            return false;
        }
        if self.lock.cancel_for(id) {
            info!("{} left {} while holding the solution", id, self.id);
        }

        self.outbox.push(Outbound::Broadcast {
            event: ServerEvent::PlayerRemoved { player_id: id },
            exclude: None,
        });
        info!("{} left {}", id, self.id);
        true
    }

    /// Buffers a validated input for the next physics tick.
    pub fn process_client_update(&mut self, id: PlayerId, mut input: Input) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            debug!("Input for unknown {} in {}", id, self.id);
            return false;
        };

        if !input.direction.is_finite() || !input.time.is_finite() {
            warn!("Dropping malformed input {} from {}", input.sequence, id);
            return false;
        }
        if input.sequence <= player.last_rendered_input {
            debug!("Dropping stale input {} from {}", input.sequence, id);
            return false;
        }
        if input.direction.magnitude() > 1.0 {
            input.direction = input.direction.normalize();
        }

        player.inputs.push(input);
        player.inputs.sort_by_key(|i| i.sequence);
        true
    }

    /// Moves the free block `block_id` onto `id` at lattice `offset`.
    pub fn attach(&mut self, id: PlayerId, block_id: BlockId, offset: GridPoint) -> bool {
        if self.lock.holder() == Some(id) {
            return false;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if player.blocks.len() >= MAX_PLAYER_BLOCKS || player.has_block_at(offset) {
            debug!("{} cannot attach at ({}, {})", id, offset.x, offset.y);
            return false;
        }
        // First request to arrive wins; the block is gone for later ones.
        let Some(block) = self.blocks.remove(&block_id) else {
            debug!("{} no longer free for {}", block_id, id);
            return false;
        };

        player.blocks.push(AttachedBlock {
            color: block.color,
            ..AttachedBlock::new(offset)
        });
        debug!("{} attached {} at ({}, {})", id, block_id, offset.x, offset.y);
        true
    }

    /// Drops the most recently attached block back into the world.
    pub fn detach(&mut self, id: PlayerId) -> bool {
        if self.lock.holder() == Some(id) {
            return false;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if player.blocks.len() < 2 {
            return false;
        }
        let Some(attached) = player.blocks.pop() else {
            return false;
        };

        let block_id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        let block = attached.into_free(block_id, player.position);
        debug!("{} detached {}", id, block_id);
        self.blocks.insert(block_id, block);
        true
    }

    pub fn set_name(&mut self, id: PlayerId, raw: &str) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.name = sanitize_name(raw);
                true
            }
            None => false,
        }
    }

    pub fn echo_ping(&mut self, id: PlayerId, time: f64) {
        if self.players.contains_key(&id) {
            self.outbox.push(Outbound::Send {
                to: id,
                event: ServerEvent::ManualPing { time },
            });
        }
    }

    /// The holder's client confirmed the `set-position` lock.
    pub fn acknowledge_lock(&mut self, id: PlayerId, locked: bool) -> bool {
        locked && self.lock.acknowledge(id, self.clock.local_time_ms())
    }

    pub fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    /// One physics tick: move every player, then run the solution logic.
    pub fn update_physics(&mut self) {
        let holder = self.lock.holder();

        for player in self.players.values_mut() {
            if Some(player.id) == holder {
                // Acknowledge the inputs without moving.
                process_direction_inputs(player);
            } else {
                step_player(player, self.blocks.values());
            }
            player.inputs.clear();
        }

        self.process_solution_logic();
    }

    fn process_solution_logic(&mut self) {
        let now = self.clock.local_time_ms();
        let step = self.lock.poll(
            now,
            self.settings.solution_hold_time_ms,
            self.settings.lock_ack_timeout_ms,
        );

        match step {
            LockStep::Idle => {
                self.check_solution();
            }
            LockStep::Hold { player, opacity } => {
                if let Some(player) = self.players.get_mut(&player) {
                    for block in player.blocks.iter_mut().skip(1) {
                        block.opacity = opacity;
                    }
                }
            }
            LockStep::Complete { player, .. } => self.complete_solution(player),
        }
    }

    /// Looks for a player whose primary block sits on a cell of the active
    /// solution with a matching shape. The first match in join order wins.
    pub fn check_solution(&mut self) -> Option<PlayerId> {
        if self.lock.is_occupied() {
            return None;
        }
        let solution = self.catalog.get(self.solution_index)?;

        let found = self.players.values().find_map(|player| {
            solution.cell_centers().find_map(|(cell, center)| {
                let close = player.position.distance(&center) < MAX_SOLUTION_DISTANCE;
                (close && solution.matches(&player.blocks, cell)).then_some((player.id, cell, center))
            })
        });

        let (id, cell, center) = found?;
        let now = self.clock.local_time_ms();
        if !self.lock.begin(id, cell, now) {
            return None;
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.position = center;
            player.inputs.clear();
        }
        self.outbox.push(Outbound::Send {
            to: id,
            event: ServerEvent::SetPosition {
                locked: true,
                position: center,
            },
        });

        info!("{} claimed solution {} in {}", id, self.solution_index, self.id);
        Some(id)
    }

    fn complete_solution(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            let count = player.blocks.len() as u32;
            player.blocks.truncate(1);
            player.blocks[0].opacity = 1.0;
            player.score += count * SCORE_SCALE_FACTOR;

            self.outbox.push(Outbound::Send {
                to: id,
                event: ServerEvent::SetPosition {
                    locked: false,
                    position: player.position,
                },
            });
            info!("{} completed a solution, score {}", id, player.score);
        }

        self.solution_index = self.catalog.random_index(&mut self.rng);
        self.outbox.push(Outbound::Broadcast {
            event: ServerEvent::SolutionChanged {
                solution_index: self.solution_index,
            },
            exclude: None,
        });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.clock.local_time_ms(),
            players: self.players.values().map(Player::light_copy).collect(),
            blocks: self.blocks.values().cloned().collect(),
        }
    }

    pub fn broadcast_snapshot(&mut self) {
        if self.players.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.outbox.push(Outbound::Broadcast {
            event: ServerEvent::ServerUpdate(snapshot),
            exclude: None,
        });
    }

    /// Scatters `count` new free blocks outside the puzzle grid.
    pub fn generate_blocks(&mut self, count: usize) {
        for _ in 0..count {
            let position = self.random_free_position();
            let id = BlockId(self.next_block_id);
            self.next_block_id += 1;
            self.blocks.insert(id, Block::new(id, position));
        }
    }

    /// Refills the free pool up to the configured maximum.
    pub fn top_up_blocks(&mut self) -> usize {
        let missing = self.settings.max_blocks.saturating_sub(self.blocks.len());
        if missing > 0 {
            self.generate_blocks(missing);
            debug!("{} generated {} blocks", self.id, missing);
        }
        missing
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn random_free_position(&mut self) -> Vector2 {
        // Inside the walls the collision clamp enforces.
        loop {
            let position = Vector2::new(
                self.rng.gen_range(SQUARE_SIZE..WORLD_WIDTH - SQUARE_SIZE),
                self.rng.gen_range(SQUARE_SIZE..WORLD_HEIGHT - SQUARE_SIZE),
            );
            if !in_grid_exclusion(position) {
                return position;
            }
        }
    }
}
