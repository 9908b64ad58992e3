//! Client-side engine: prediction of the local player, reconciliation with
//! server snapshots and interpolation of everybody else.
//!
//! The engine never touches the network or the window. Server events are fed
//! in through [`ClientGameState::handle_server_event`] and everything the
//! client wants to tell the server is collected in an outbox that the caller
//! drains once per frame.

use crate::config::ClientConfig;
use crate::input::normalize_direction;
use crate::snapshots::SnapshotBuffer;
use log::{debug, info, warn};
use shared::physics::{process_direction_inputs, step_player, SimClock};
use shared::{
    leaderboard, sanitize_name, Block, BlockId, ClientEvent, ConnectedPayload, Edge, Input, Player,
    PlayerId, PlayerSnapshot, ServerEvent, Snapshot, Solution, SolutionCatalog, Vector2,
    MAX_PICKUP_DISTANCE, MAX_PLAYER_BLOCKS, PHYSICS_UPDATE_PERIOD_MS, PING_PERIOD_MS,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency above which the connection is reported as poor.
const HIGH_LATENCY_MS: f64 = 80.0;

/// Netcode features that can be switched at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    pub prediction: bool,
    pub reconciliation: bool,
    pub interpolation: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            prediction: true,
            reconciliation: true,
            interpolation: true,
        }
    }
}

pub struct ClientGameState {
    config: ClientConfig,
    player_id: Option<PlayerId>,
    players: BTreeMap<PlayerId, Player>,
    blocks: BTreeMap<BlockId, Block>,
    catalog: SolutionCatalog,
    solution_index: usize,
    snapshots: SnapshotBuffer,
    clock: SimClock,
    server_time: f64,
    /// Virtual clock used to pick snapshots for interpolation.
    client_time: f64,
    next_sequence: u32,
    locked: bool,
    toggles: Toggles,
    net_ping: f64,
    net_latency: f64,
    physics_accumulator_ms: f64,
    ping_accumulator_ms: f64,
    outbox: Vec<ClientEvent>,
}

impl ClientGameState {
    pub fn new(config: ClientConfig) -> Self {
        let snapshots = SnapshotBuffer::with_capacity(config.snapshot_capacity());
        Self {
            config,
            player_id: None,
            players: BTreeMap::new(),
            blocks: BTreeMap::new(),
            catalog: SolutionCatalog::default(),
            solution_index: 0,
            snapshots,
            clock: SimClock::new(),
            server_time: 0.0,
            client_time: 0.0,
            next_sequence: 0,
            locked: false,
            toggles: Toggles::default(),
            net_ping: 0.0,
            net_latency: 0.0,
            physics_accumulator_ms: 0.0,
            ping_accumulator_ms: 0.0,
            outbox: Vec::new(),
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn is_connected(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.player_id.and_then(|id| self.players.get(&id))
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn solution_index(&self) -> usize {
        self.solution_index
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.catalog.get(self.solution_index)
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<&Player> {
        leaderboard(self.players.values(), limit)
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snapshots
    }

    pub fn toggles(&self) -> Toggles {
        self.toggles
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn server_time(&self) -> f64 {
        self.server_time
    }

    pub fn client_time(&self) -> f64 {
        self.client_time
    }

    pub fn local_time(&self) -> f64 {
        self.clock.local_time_ms()
    }

    pub fn net_ping(&self) -> f64 {
        self.net_ping
    }

    pub fn net_latency(&self) -> f64 {
        self.net_latency
    }

    pub fn drain_outbox(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(payload) => self.on_connected(payload),
            ServerEvent::PlayerAdded { player } => self.on_player_added(player),
            ServerEvent::PlayerRemoved { player_id } => self.on_player_removed(player_id),
            ServerEvent::ServerUpdate(snapshot) => self.on_server_update(snapshot),
            ServerEvent::SetPosition { locked, position } => self.on_set_position(locked, position),
            ServerEvent::SolutionChanged { solution_index } => {
                self.on_solution_changed(solution_index)
            }
            ServerEvent::ManualPing { time } => self.on_ping(time),
        }
    }

    pub fn on_connected(&mut self, payload: ConnectedPayload) {
        info!(
            "Connected as {} with {} players and {} blocks",
            payload.client_player_id,
            payload.players.len(),
            payload.blocks.len()
        );

        self.player_id = Some(payload.client_player_id);
        self.server_time = payload.server_time + self.net_latency;
        self.client_time = self.server_time - self.config.client_server_offset_ms;
        self.players = payload
            .players
            .iter()
            .map(|state| (state.id, Player::from_snapshot(state)))
            .collect();
        self.blocks = payload.blocks.into_iter().map(|block| (block.id, block)).collect();
        self.solution_index = payload.solution_index;
        self.snapshots.clear();
        self.next_sequence = 0;
        self.locked = false;

        if !self.players.contains_key(&payload.client_player_id) {
            warn!("Initial state does not contain {}", payload.client_player_id);
        }
    }

    pub fn on_player_added(&mut self, state: PlayerSnapshot) {
        debug!("{} joined", state.id);
        self.players
            .entry(state.id)
            .or_insert_with(|| Player::from_snapshot(&state));
    }

    pub fn on_player_removed(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_some() {
            debug!("{} left", id);
        }
    }

    /// Stores a snapshot for interpolation, adopts the authoritative free
    /// blocks, scores and names, then reconciles the local player.
    pub fn on_server_update(&mut self, snapshot: Snapshot) {
        self.server_time = snapshot.time;
        self.client_time = self.server_time - self.config.client_server_offset_ms;

        self.blocks = snapshot
            .blocks
            .iter()
            .map(|block| (block.id, block.clone()))
            .collect();

        for state in &snapshot.players {
            match self.players.get_mut(&state.id) {
                Some(player) => {
                    player.blocks = state.blocks.clone();
                    player.score = state.score;
                    player.name = state.name.clone();
                    if Some(state.id) != self.player_id {
                        player.last_rendered_input = state.last_rendered_input;
                    }
                }
                None => {
                    debug!("{} appeared in a snapshot before its join notice", state.id);
                    self.players.insert(state.id, Player::from_snapshot(state));
                }
            }
        }

        let local = self
            .player_id
            .and_then(|id| snapshot.player(id))
            .cloned();
        self.snapshots.push(snapshot);

        if let Some(state) = local {
            self.reconcile(&state);
        }
    }

    /// Drops inputs the server has already applied, snaps to the server
    /// position and replays the rest.
    ///
    /// Returns false when nothing was reconciled: the feature is off, the
    /// local player is interpolated instead, or the acknowledged input is
    /// no longer buffered.
    pub fn reconcile(&mut self, state: &PlayerSnapshot) -> bool {
        if !self.toggles.prediction || !self.toggles.reconciliation {
            return false;
        }
        let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) else {
            return false;
        };

        let acknowledged = state.last_rendered_input;
        let Some(index) = player
            .inputs
            .iter()
            .position(|input| input.sequence == acknowledged)
        else {
            return false;
        };

        player.inputs.drain(..=index);
        player.position = state.position;
        player.last_rendered_input = acknowledged;
        step_player(player, self.blocks.values());
        true
    }

    /// Samples one movement intent towards `pointer_world`, applies it to the
    /// local prediction buffer and queues it for the server.
    pub fn record_input(&mut self, pointer_world: Vector2) -> Option<Input> {
        let id = self.player_id?;
        let player = self.players.get_mut(&id)?;

        let raw = pointer_world.subtract(&player.position);
        let direction = normalize_direction(raw, !self.locked);

        self.next_sequence += 1;
        let input = Input {
            time: self.clock.local_time_ms(),
            direction,
            sequence: self.next_sequence,
        };

        if self.toggles.prediction {
            player.inputs.push(input.clone());
        }
        self.outbox.push(ClientEvent::Input(input.clone()));
        Some(input)
    }

    /// Advances the local clock and runs the fixed-rate work that falls due:
    /// physics ticks and the periodic ping.
    pub fn tick(&mut self, delta: Duration) {
        self.clock.advance(delta);
        let elapsed = self.clock.delta_ms();

        self.physics_accumulator_ms += elapsed;
        let period = PHYSICS_UPDATE_PERIOD_MS as f64;
        while self.physics_accumulator_ms >= period {
            self.physics_accumulator_ms -= period;
            self.update_physics();
        }

        self.ping_accumulator_ms += elapsed;
        if self.ping_accumulator_ms >= PING_PERIOD_MS as f64 {
            self.ping_accumulator_ms = 0.0;
            self.send_ping();
        }
    }

    /// One speculative physics tick of the local player.
    pub fn update_physics(&mut self) {
        if !self.toggles.prediction {
            return;
        }
        let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) else {
            return;
        };

        if self.locked {
            process_direction_inputs(player);
        } else {
            step_player(player, self.blocks.values());
        }

        // Nothing will acknowledge these, keep only what is still unrendered.
        if !self.toggles.reconciliation {
            let rendered = player.last_rendered_input;
            player.inputs.retain(|input| input.sequence > rendered);
        }
    }

    /// Moves rendered players towards their interpolated snapshot positions.
    pub fn process_server_updates(&mut self) {
        let Some((previous, target)) = self.snapshots.bracket(self.client_time) else {
            return;
        };
        let Some(latest) = self.snapshots.latest() else {
            return;
        };

        let span = target.time - previous.time;
        let fraction = if span != 0.0 {
            (target.time - self.client_time) / span
        } else {
            0.0
        };
        if fraction > 1.0 {
            debug!("Interpolation fraction {:.3} above 1", fraction);
        }

        for (id, player) in self.players.iter_mut() {
            if Some(*id) == self.player_id && self.toggles.prediction {
                continue;
            }

            match (latest.player(*id), previous.player(*id)) {
                (Some(newest), Some(earlier)) if self.toggles.interpolation => {
                    let theoretical = newest.position.interpolate(&earlier.position, fraction as f32);
                    player.position = player
                        .position
                        .interpolate(&theoretical, self.config.client_smoothing);
                }
                (Some(newest), _) if !self.toggles.interpolation => {
                    player.position = newest.position;
                }
                _ => debug!("{} missing from snapshot history", id),
            }
        }
    }

    /// Marks the free block nearest to any of the local player's blocks as
    /// the attach candidate, if it is within pickup range.
    pub fn determine_candidate_block(&mut self) {
        let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) else {
            return;
        };

        let mut best: Option<(BlockId, usize, f32, Vector2)> = None;
        for block in self.blocks.values() {
            for (index, position) in player.block_positions().enumerate() {
                let distance = position.distance(&block.position);
                if best.map_or(true, |(_, _, closest, _)| distance < closest) {
                    best = Some((block.id, index, distance, position.subtract(&block.position)));
                }
            }
        }

        match best {
            Some((block_id, index, distance, towards)) if distance < MAX_PICKUP_DISTANCE => {
                player.candidate_block = Some(block_id);
                player.active_block_index = index;
                player.active_edge = Edge::from_direction(towards);
            }
            _ => player.clear_candidate(),
        }
    }

    /// Queues an attach of the current candidate. Returns false if there is
    /// nothing valid to attach.
    pub fn request_attach(&mut self) -> bool {
        if self.locked {
            return false;
        }
        let Some(player) = self.local_player() else {
            return false;
        };
        let Some(block_id) = player.candidate_block else {
            return false;
        };
        if !player.active_edge.is_valid()
            || !self.blocks.contains_key(&block_id)
            || player.blocks.len() >= MAX_PLAYER_BLOCKS
        {
            return false;
        }
        let Some(active) = player.blocks.get(player.active_block_index) else {
            return false;
        };

        let relative_position = player.active_edge.relative_offset().add(&active.offset);
        if player.has_block_at(relative_position) {
            debug!("Cell ({}, {}) already occupied", relative_position.x, relative_position.y);
            return false;
        }

        let player_id = player.id;
        self.outbox.push(ClientEvent::Attach {
            player_id,
            block_id,
            relative_position,
        });
        true
    }

    /// Queues a detach of the last attached block.
    pub fn request_detach(&mut self) -> bool {
        if self.locked {
            return false;
        }
        let Some(player) = self.local_player() else {
            return false;
        };
        if player.blocks.len() < 2 {
            return false;
        }

        let player_id = player.id;
        self.outbox.push(ClientEvent::Detach { player_id });
        true
    }

    pub fn set_name(&mut self, raw: &str) {
        let name = sanitize_name(raw);
        if let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) {
            player.name = name.clone();
        }
        self.outbox.push(ClientEvent::PlayerName { name });
    }

    pub fn send_ping(&mut self) {
        self.outbox.push(ClientEvent::ManualPing {
            time: self.clock.local_time_ms(),
        });
    }

    pub fn on_ping(&mut self, time: f64) {
        self.net_ping = self.clock.local_time_ms() - time;
        self.net_latency = self.net_ping / 2.0;
        if self.net_latency > HIGH_LATENCY_MS {
            warn!("High latency: {:.0} ms", self.net_latency);
        }
    }

    /// Server lock or release of the local player. Pending inputs are
    /// discarded since the server consumes them without moving the player.
    pub fn on_set_position(&mut self, locked: bool, position: Vector2) {
        self.locked = locked;
        if let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) {
            player.position = position;
            if let Some(last) = player.inputs.last() {
                player.last_rendered_input = player.last_rendered_input.max(last.sequence);
            }
            player.inputs.clear();
            player.clear_candidate();
        }
        info!("Player {}", if locked { "locked" } else { "released" });
        self.outbox.push(ClientEvent::SetPositionAck { locked });
    }

    pub fn on_solution_changed(&mut self, index: usize) {
        if self.catalog.get(index).is_none() {
            warn!("Unknown solution index {}", index);
            return;
        }
        self.solution_index = index;
    }

    pub fn toggle_prediction(&mut self) {
        self.toggles.prediction = !self.toggles.prediction;
        if let Some(player) = self.player_id.and_then(|id| self.players.get_mut(&id)) {
            player.inputs.clear();
        }
        info!("Client-side prediction: {}", self.toggles.prediction);
    }

    pub fn toggle_reconciliation(&mut self) {
        self.toggles.reconciliation = !self.toggles.reconciliation;
        info!("Server reconciliation: {}", self.toggles.reconciliation);
    }

    pub fn toggle_interpolation(&mut self) {
        self.toggles.interpolation = !self.toggles.interpolation;
        info!("Interpolation: {}", self.toggles.interpolation);
    }
}
