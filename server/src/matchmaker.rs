//! Session registry: routes players into sessions with room and fans the
//! simulation's outboxes out to concrete recipients.

use crate::config::SessionSettings;
use crate::session::{Outbound, Session, SessionId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientEvent, PlayerId, ServerEvent};
use std::collections::HashMap;
use std::time::Duration;

/// An event and every player that should receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipients: Vec<PlayerId>,
    pub event: ServerEvent,
}

pub struct Matchmaker {
    /// Kept in creation order so the first-fit scan is stable.
    sessions: Vec<Session>,
    player_sessions: HashMap<PlayerId, SessionId>,
    next_session_id: u64,
    next_player_id: u32,
    settings: SessionSettings,
    rng: StdRng,
}

impl Matchmaker {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic registry for tests: every session's RNG derives from `seed`.
    pub fn with_seed(settings: SessionSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: SessionSettings, rng: StdRng) -> Self {
        Self {
            sessions: Vec::new(),
            player_sessions: HashMap::new(),
            next_session_id: 1,
            next_player_id: 1,
            settings,
            rng,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn player_count(&self) -> usize {
        self.player_sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn session_of(&self, player: PlayerId) -> Option<&Session> {
        let id = self.player_sessions.get(&player)?;
        self.sessions.iter().find(|session| session.id() == *id)
    }

    fn session_of_mut(&mut self, player: PlayerId) -> Option<&mut Session> {
        let id = *self.player_sessions.get(&player)?;
        self.sessions.iter_mut().find(|session| session.id() == id)
    }

    /// Assigns a new player id and places the player in the first session
    /// with room, creating one when every session is full.
    pub fn join(&mut self) -> (PlayerId, SessionId) {
        let player = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        let index = match self.sessions.iter().position(|session| !session.is_full()) {
            Some(index) => index,
            None => {
                let id = SessionId(self.next_session_id);
                self.next_session_id += 1;
                let rng = StdRng::seed_from_u64(self.rng.gen());
                self.sessions.push(Session::new(id, self.settings, rng));
                self.sessions.len() - 1
            }
        };

        let session = &mut self.sessions[index];
        session.add_player(player);
        let session_id = session.id();
        self.player_sessions.insert(player, session_id);
        (player, session_id)
    }

    /// Removes a player; its session is destroyed once empty.
    pub fn leave(&mut self, player: PlayerId) -> bool {
        let Some(session_id) = self.player_sessions.remove(&player) else {
            return false;
        };
        let Some(index) = self.sessions.iter().position(|s| s.id() == session_id) else {
            return false;
        };

        self.sessions[index].remove_player(player);
        if self.sessions[index].is_empty() {
            self.sessions.remove(index);
            info!("Destroyed empty {}", session_id);
        }
        true
    }

    /// Routes one decoded client event into the player's session.
    pub fn handle_event(&mut self, player: PlayerId, event: ClientEvent) {
        if let ClientEvent::Disconnect = event {
            self.leave(player);
            return;
        }

        let Some(session) = self.session_of_mut(player) else {
            debug!("Event from {} without a session", player);
            return;
        };

        match event {
            ClientEvent::Input(input) => {
                session.process_client_update(player, input);
            }
            ClientEvent::Attach {
                player_id,
                block_id,
                relative_position,
            } => {
                if player_id != player {
                    debug!("{} tried to attach for {}", player, player_id);
                    return;
                }
                session.attach(player, block_id, relative_position);
            }
            ClientEvent::Detach { .. } => {
                session.detach(player);
            }
            ClientEvent::PlayerName { name } => {
                session.set_name(player, &name);
            }
            ClientEvent::ManualPing { time } => session.echo_ping(player, time),
            ClientEvent::SetPositionAck { locked } => {
                session.acknowledge_lock(player, locked);
            }
            ClientEvent::Disconnect => {}
        }
    }

    pub fn advance_clock(&mut self, delta: Duration) {
        for session in &mut self.sessions {
            session.advance_clock(delta);
        }
    }

    pub fn update_physics(&mut self) {
        for session in &mut self.sessions {
            session.update_physics();
        }
    }

    pub fn broadcast_snapshots(&mut self) {
        for session in &mut self.sessions {
            session.broadcast_snapshot();
        }
    }

    pub fn top_up_blocks(&mut self) {
        for session in &mut self.sessions {
            session.top_up_blocks();
        }
    }

    /// Drains every session's outbox, resolving broadcasts to the players
    /// currently in that session.
    pub fn drain_outbound(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        for session in &mut self.sessions {
            for outbound in session.drain_outbox() {
                let delivery = match outbound {
                    Outbound::Send { to, event } => Delivery {
                        recipients: vec![to],
                        event,
                    },
                    Outbound::Broadcast { event, exclude } => Delivery {
                        recipients: session
                            .player_ids()
                            .filter(|id| Some(*id) != exclude)
                            .collect(),
                        event,
                    },
                };
                if !delivery.recipients.is_empty() {
                    deliveries.push(delivery);
                }
            }
        }

        deliveries
    }
}
