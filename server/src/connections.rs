//! Outbound handles and liveness tracking for connected players.
//!
//! The simulation never touches sockets. Each connection task registers an
//! unbounded frame channel here; the main loop encodes events in the
//! connection's wire format and pushes frames into that channel.

use crate::matchmaker::Delivery;
use log::{error, info, warn};
use shared::{Frame, PlayerId, ServerEvent, WireFormat};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A connected player's transport endpoint.
#[derive(Debug)]
pub struct Connection {
    pub player_id: PlayerId,
    pub addr: SocketAddr,
    pub format: WireFormat,
    /// Last time any frame arrived from this connection.
    pub last_seen: Instant,
    sender: mpsc::UnboundedSender<Frame>,
}

impl Connection {
    pub fn new(
        player_id: PlayerId,
        addr: SocketAddr,
        format: WireFormat,
        sender: mpsc::UnboundedSender<Frame>,
    ) -> Self {
        Self {
            player_id,
            addr,
            format,
            last_seen: Instant::now(),
            sender,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ConnectionManager {
    connections: HashMap<PlayerId, Connection>,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            timeout,
        }
    }

    pub fn add(&mut self, connection: Connection) {
        info!(
            "{} connected from {} ({:?})",
            connection.player_id, connection.addr, connection.format
        );
        self.connections.insert(connection.player_id, connection);
    }

    /// Returns false if the player was already gone.
    pub fn remove(&mut self, player_id: PlayerId) -> bool {
        match self.connections.remove(&player_id) {
            Some(connection) => {
                info!("{} disconnected from {}", player_id, connection.addr);
                true
            }
            None => false,
        }
    }

    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(connection) = self.connections.get_mut(&player_id) {
            connection.last_seen = Instant::now();
        }
    }

    pub fn format_of(&self, player_id: PlayerId) -> Option<WireFormat> {
        self.connections.get(&player_id).map(|c| c.format)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Encodes `event` once per wire format and queues it for every recipient.
    pub fn deliver(&self, delivery: &Delivery) {
        let mut json: Option<Frame> = None;
        let mut binary: Option<Frame> = None;

        for player_id in &delivery.recipients {
            let Some(connection) = self.connections.get(player_id) else {
                continue;
            };
            let cached = match connection.format {
                WireFormat::Json => &mut json,
                WireFormat::Binary => &mut binary,
            };

            if cached.is_none() {
                match connection.format.encode(&delivery.event) {
                    Ok(frame) => *cached = Some(frame),
                    Err(e) => {
                        error!("Failed to encode event as {:?}: {}", connection.format, e);
                        continue;
                    }
                }
            }

            if let Some(frame) = cached {
                if connection.sender.send(frame.clone()).is_err() {
                    warn!("Outbound channel closed for {}", player_id);
                }
            }
        }
    }

    pub fn send(&self, player_id: PlayerId, event: ServerEvent) {
        self.deliver(&Delivery {
            recipients: vec![player_id],
            event,
        });
    }

    /// Removes and returns every connection that has been silent too long.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .connections
            .values()
            .filter(|connection| connection.is_timed_out(self.timeout))
            .map(|connection| connection.player_id)
            .collect();

        for player_id in &timed_out {
            warn!("{} timed out", player_id);
            self.remove(*player_id);
        }

        timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::decode;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn connect(
        manager: &mut ConnectionManager,
        id: u32,
        format: WireFormat,
    ) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.add(Connection::new(PlayerId(id), addr(8000 + id as u16), format, tx));
        rx
    }

    #[test]
    fn test_add_and_remove() {
        let mut manager = ConnectionManager::new(Duration::from_secs(5));
        let _rx = connect(&mut manager, 1, WireFormat::Json);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.format_of(PlayerId(1)), Some(WireFormat::Json));
        assert!(manager.remove(PlayerId(1)));
        assert!(!manager.remove(PlayerId(1)));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_delivery_uses_each_connection_format() {
        let mut manager = ConnectionManager::new(Duration::from_secs(5));
        let mut json_rx = connect(&mut manager, 1, WireFormat::Json);
        let mut binary_rx = connect(&mut manager, 2, WireFormat::Binary);

        let event = ServerEvent::SolutionChanged { solution_index: 4 };
        manager.deliver(&Delivery {
            recipients: vec![PlayerId(1), PlayerId(2), PlayerId(3)],
            event: event.clone(),
        });

        let json = json_rx.try_recv().unwrap();
        let binary = binary_rx.try_recv().unwrap();
        assert!(matches!(json, Frame::Text(_)));
        assert!(matches!(binary, Frame::Binary(_)));
        assert_eq!(decode::<ServerEvent>(&json).unwrap(), event);
        assert_eq!(decode::<ServerEvent>(&binary).unwrap(), event);
    }

    #[test]
    fn test_delivery_continues_past_closed_recipient() {
        let mut manager = ConnectionManager::new(Duration::from_secs(5));
        drop(connect(&mut manager, 1, WireFormat::Json));
        let mut json_rx = connect(&mut manager, 2, WireFormat::Json);
        let mut binary_rx = connect(&mut manager, 3, WireFormat::Binary);

        manager.deliver(&Delivery {
            recipients: vec![PlayerId(1), PlayerId(2), PlayerId(3)],
            event: ServerEvent::PlayerRemoved { player_id: PlayerId(9) },
        });

        assert!(json_rx.try_recv().is_ok());
        assert!(binary_rx.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_single_player() {
        let mut manager = ConnectionManager::new(Duration::from_secs(5));
        let mut first = connect(&mut manager, 1, WireFormat::Json);
        let mut second = connect(&mut manager, 2, WireFormat::Json);

        manager.send(PlayerId(2), ServerEvent::ManualPing { time: 5.0 });

        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_ok());
    }

    #[test]
    fn test_timeouts() {
        let mut manager = ConnectionManager::new(Duration::from_millis(0));
        let _rx = connect(&mut manager, 1, WireFormat::Json);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(manager.check_timeouts(), vec![PlayerId(1)]);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_touch_keeps_connection_alive() {
        let mut manager = ConnectionManager::new(Duration::from_millis(50));
        let _rx = connect(&mut manager, 1, WireFormat::Json);
        std::thread::sleep(Duration::from_millis(30));
        manager.touch(PlayerId(1));
        std::thread::sleep(Duration::from_millis(30));

        assert!(manager.check_timeouts().is_empty());
    }
}
