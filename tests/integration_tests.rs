//! Integration tests for the game server, the client engine and the
//! WebSocket transport between them.

use assert_approx_eq::assert_approx_eq;
use client::config::ClientConfig;
use client::game::ClientGameState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{ServerConfig, SessionSettings};
use server::matchmaker::{Delivery, Matchmaker};
use server::session::{Session, SessionId};
use shared::physics::DISPLACEMENT_PER_TICK;
use shared::{
    AttachedBlock, BlockId, ClientEvent, GridPoint, Input, PlayerId, ServerEvent, SolutionCatalog,
    Vector2, SCORE_SCALE_FACTOR, SQUARE_SIZE, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::time::Duration;

fn empty_settings() -> SessionSettings {
    SessionSettings {
        initial_blocks: 0,
        ..SessionSettings::default()
    }
}

fn session() -> Session {
    Session::new(SessionId(1), empty_settings(), StdRng::seed_from_u64(11))
}

fn input(sequence: u32, x: f32, y: f32) -> Input {
    Input {
        time: sequence as f64 * 16.0,
        direction: Vector2::new(x, y),
        sequence,
    }
}

/// SERVER SIMULATION TESTS
mod simulation_tests {
    use super::*;

    /// Ten unit inputs move a player 45 px in ten physics ticks
    #[test]
    fn ten_ticks_of_full_input() {
        let mut session = session();
        let id = PlayerId(1);
        session.add_player(id);
        session.player_mut(id).unwrap().position = Vector2::new(1000.0, 1000.0);

        for sequence in 1..=10 {
            assert!(session.process_client_update(id, input(sequence, 1.0, 0.0)));
            session.update_physics();
        }

        let player = session.player(id).unwrap();
        assert_approx_eq!(player.position.x, 1045.0, 1e-3);
        assert_approx_eq!(player.position.y, 1000.0, 1e-3);
        assert_eq!(player.last_rendered_input, 10);
        assert!(player.inputs.is_empty());
    }

    /// Attaching removes the block from the free pool exactly once
    #[test]
    fn attach_is_exclusive_and_validated() {
        let mut session = session();
        let (first, second) = (PlayerId(1), PlayerId(2));
        session.add_player(first);
        session.add_player(second);
        session.generate_blocks(2);
        let ids: Vec<BlockId> = session.blocks().keys().copied().collect();

        assert!(session.attach(first, ids[0], GridPoint::new(1, 0)));
        assert!(!session.attach(second, ids[0], GridPoint::new(1, 0)));
        assert!(!session.attach(first, ids[1], GridPoint::new(1, 0)));
        assert!(!session.attach(first, BlockId(999), GridPoint::new(0, 1)));

        assert_eq!(session.blocks().len(), 1);
        assert_eq!(session.player(first).unwrap().blocks.len(), 2);
        assert_eq!(session.player(second).unwrap().blocks.len(), 1);
    }

    /// Detaching never removes the primary block
    #[test]
    fn detach_stops_at_primary_block() {
        let mut session = session();
        let id = PlayerId(1);
        session.add_player(id);
        session.generate_blocks(1);
        let block = *session.blocks().keys().next().unwrap();
        session.attach(id, block, GridPoint::new(0, 1));

        assert!(session.detach(id));
        assert!(!session.detach(id));

        let player = session.player(id).unwrap();
        assert_eq!(player.blocks.len(), 1);
        assert_eq!(player.blocks[0].offset, GridPoint::ORIGIN);
        assert_eq!(session.blocks().len(), 1);
    }

    /// No attached block ever leaves the world bounds
    #[test]
    fn players_stay_inside_the_walls() {
        let mut session = session();
        let id = PlayerId(1);
        session.add_player(id);
        session.generate_blocks(1);
        let block = *session.blocks().keys().next().unwrap();
        session.attach(id, block, GridPoint::new(-1, -1));
        session.player_mut(id).unwrap().position = Vector2::new(120.0, 120.0);

        for sequence in 1..=40 {
            session.process_client_update(id, input(sequence, -1.0, -1.0));
            session.update_physics();
        }

        let player = session.player(id).unwrap();
        for position in player.block_positions() {
            assert!(position.x >= SQUARE_SIZE - 1e-3 && position.x <= WORLD_WIDTH - SQUARE_SIZE);
            assert!(position.y >= SQUARE_SIZE - 1e-3 && position.y <= WORLD_HEIGHT - SQUARE_SIZE);
        }
    }

    fn place_on_solution(session: &mut Session, id: PlayerId) {
        let catalog = SolutionCatalog::default();
        let solution = catalog.get(session.solution_index()).unwrap().clone();
        let primary = solution.blocks[0];

        let player = session.player_mut(id).unwrap();
        player.position = solution.cell_center(primary);
        player.blocks = std::iter::once(AttachedBlock::primary())
            .chain(solution.blocks.iter().skip(1).map(|cell| {
                AttachedBlock::new(GridPoint::new(cell.x - primary.x, cell.y - primary.y))
            }))
            .collect();
    }

    /// Only one player holds the solution, and completing it scores
    #[test]
    fn solution_lock_is_exclusive() {
        let mut session = session();
        let (first, second) = (PlayerId(1), PlayerId(2));
        session.add_player(first);
        session.add_player(second);
        place_on_solution(&mut session, first);
        place_on_solution(&mut session, second);
        let size = session.player(first).unwrap().blocks.len() as u32;
        session.drain_outbox();

        session.update_physics();
        assert_eq!(session.lock().holder(), Some(first));
        assert!(!session.attach(first, BlockId(0), GridPoint::new(9, 9)));

        assert!(session.acknowledge_lock(first, true));
        session.advance_clock(Duration::from_millis(1000));
        session.update_physics();
        assert_eq!(session.lock().holder(), Some(first));

        session.advance_clock(Duration::from_millis(1000));
        session.update_physics();

        let player = session.player(first).unwrap();
        assert_eq!(player.score, size * SCORE_SCALE_FACTOR);
        assert_eq!(player.blocks.len(), 1);
        assert_eq!(session.player(second).unwrap().score, 0);
        assert_ne!(session.lock().holder(), Some(first));
    }

    /// A holder leaving frees the solution for others
    #[test]
    fn holder_disconnect_releases_lock() {
        let mut session = session();
        let (first, second) = (PlayerId(1), PlayerId(2));
        session.add_player(first);
        session.add_player(second);
        place_on_solution(&mut session, first);
        place_on_solution(&mut session, second);

        session.update_physics();
        assert_eq!(session.lock().holder(), Some(first));

        session.remove_player(first);
        session.update_physics();
        assert_eq!(session.lock().holder(), Some(second));
    }
}

/// MATCHMAKING TESTS
mod matchmaking_tests {
    use super::*;

    /// The eleventh player opens a second session
    #[test]
    fn full_session_overflows_into_new_one() {
        let mut matchmaker = Matchmaker::with_seed(empty_settings(), 5);

        let joined: Vec<_> = (0..11).map(|_| matchmaker.join()).collect();

        assert_eq!(matchmaker.session_count(), 2);
        assert!(joined[..10].iter().all(|(_, session)| *session == joined[0].1));
        assert_ne!(joined[10].1, joined[0].1);

        assert!(matchmaker.leave(joined[10].0));
        assert_eq!(matchmaker.session_count(), 1);
        assert_eq!(matchmaker.player_count(), 10);
    }

    /// Broadcasts stay inside a session
    #[test]
    fn snapshots_only_reach_session_members() {
        let settings = SessionSettings {
            max_players: 1,
            ..empty_settings()
        };
        let mut matchmaker = Matchmaker::with_seed(settings, 5);
        let (alone, _) = matchmaker.join();
        let (other, _) = matchmaker.join();
        matchmaker.drain_outbound();

        matchmaker.broadcast_snapshots();
        let deliveries = matchmaker.drain_outbound();

        assert_eq!(deliveries.len(), 2);
        for delivery in deliveries {
            assert_eq!(delivery.recipients.len(), 1);
            let ServerEvent::ServerUpdate(snapshot) = &delivery.event else {
                panic!("Unexpected event {:?}", delivery.event);
            };
            assert_eq!(snapshot.players.len(), 1);
            assert_eq!(snapshot.players[0].id, delivery.recipients[0]);
            assert!(delivery.recipients[0] == alone || delivery.recipients[0] == other);
        }
    }
}

/// CLIENT/SERVER CONVERGENCE TESTS
mod reconciliation_tests {
    use super::*;

    fn deliver(client: &mut ClientGameState, player: PlayerId, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if delivery.recipients.contains(&player) {
                client.handle_server_event(delivery.event);
            }
        }
    }

    /// Prediction with delayed inputs converges on the server position
    #[test]
    fn prediction_converges_with_server() {
        let mut matchmaker = Matchmaker::with_seed(empty_settings(), 9);
        let mut client = ClientGameState::new(ClientConfig::default());
        let (player, _) = matchmaker.join();
        deliver(&mut client, player, matchmaker.drain_outbound());
        assert_eq!(client.player_id(), Some(player));

        let target = Vector2::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);
        let latency = 3;
        let mut in_flight: Vec<(usize, ClientEvent)> = Vec::new();

        for frame in 0..30 {
            if frame < 20 {
                client.record_input(target);
            }
            client.update_physics();
            for event in client.drain_outbox() {
                in_flight.push((frame + latency, event));
            }

            let (arrived, pending): (Vec<_>, Vec<_>) =
                in_flight.into_iter().partition(|(due, _)| *due <= frame);
            in_flight = pending;
            for (_, event) in arrived {
                matchmaker.handle_event(player, event);
            }

            matchmaker.update_physics();
            if frame % 3 == 0 {
                matchmaker.broadcast_snapshots();
            }
            deliver(&mut client, player, matchmaker.drain_outbound());

            let server = matchmaker.session_of(player).unwrap().player(player).unwrap();
            let local = client.local_player().unwrap();
            let unacknowledged = local.inputs.len() as f32;
            let drift = local.position.distance(&server.position);
            assert!(
                drift <= (unacknowledged + latency as f32 + 3.0) * DISPLACEMENT_PER_TICK + 1e-3,
                "frame {}: drift {} with {} unacknowledged inputs",
                frame,
                drift,
                unacknowledged
            );
        }

        matchmaker.broadcast_snapshots();
        deliver(&mut client, player, matchmaker.drain_outbound());

        let server = matchmaker.session_of(player).unwrap().player(player).unwrap();
        let local = client.local_player().unwrap();
        assert!(local.inputs.is_empty());
        assert_approx_eq!(local.position.x, server.position.x, 1e-3);
        assert_approx_eq!(local.position.y, server.position.y, 1e-3);
        assert_eq!(server.last_rendered_input, 20);
    }

    /// A server-confirmed attach shows up in the client's view
    #[test]
    fn attach_round_trip_through_matchmaker() {
        let settings = SessionSettings {
            initial_blocks: 0,
            ..SessionSettings::default()
        };
        let mut matchmaker = Matchmaker::with_seed(settings, 2);
        let mut client = ClientGameState::new(ClientConfig::default());
        let (player, _) = matchmaker.join();
        deliver(&mut client, player, matchmaker.drain_outbound());

        matchmaker.top_up_blocks();
        matchmaker.broadcast_snapshots();
        deliver(&mut client, player, matchmaker.drain_outbound());
        let block = client.blocks().next().unwrap().id;

        matchmaker.handle_event(
            player,
            ClientEvent::Attach {
                player_id: player,
                block_id: block,
                relative_position: GridPoint::new(0, -1),
            },
        );
        matchmaker.broadcast_snapshots();
        deliver(&mut client, player, matchmaker.drain_outbound());

        assert!(client.block(block).is_none());
        assert_eq!(client.local_player().unwrap().blocks.len(), 2);
    }
}

/// REAL SOCKET TESTS
mod network_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use server::network::{Server, ServerMessage};
    use shared::protocol::decode;
    use shared::{Frame, WireFormat};
    use std::net::SocketAddr;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    async fn start_server() -> (SocketAddr, UnboundedSender<ServerMessage>) {
        start_server_with_timeout(ServerConfig::default().client_timeout_ms).await
    }

    async fn start_server_with_timeout(
        client_timeout_ms: u64,
    ) -> (SocketAddr, UnboundedSender<ServerMessage>) {
        let config = ServerConfig {
            port: 0,
            client_timeout_ms,
            session: SessionSettings {
                initial_blocks: 3,
                ..SessionSettings::default()
            },
            ..ServerConfig::default()
        };
        let matchmaker = Matchmaker::with_seed(config.session, 4);
        let mut server = tokio_test::assert_ok!(Server::with_matchmaker(config, matchmaker).await);
        let addr = server.local_addr();
        let handle = server.handle();

        tokio::spawn(async move {
            let _ = server.run().await;
        });
        (addr, handle)
    }

    fn frame_of(message: Message) -> Option<Frame> {
        match message {
            Message::Text(text) => Some(Frame::Text(text)),
            Message::Binary(bytes) => Some(Frame::Binary(bytes)),
            _ => None,
        }
    }

    /// JSON clients get the initial state and their pings echoed
    #[tokio::test]
    async fn websocket_json_round_trip() {
        let (addr, handle) = start_server().await;
        let (mut ws, _) = tokio_test::assert_ok!(connect_async(format!("ws://{}/", addr)).await);

        let first = timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(first, Message::Text(_)));
        let event: ServerEvent = decode(&frame_of(first).unwrap()).unwrap();
        let ServerEvent::Connected(payload) = event else {
            panic!("Expected connected, got {:?}", event);
        };
        assert_eq!(payload.blocks.len(), 3);

        let Frame::Text(ping) = WireFormat::Json
            .encode(&ClientEvent::ManualPing { time: 42.0 })
            .unwrap()
        else {
            panic!("JSON must encode to text");
        };
        tokio_test::assert_ok!(ws.send(Message::Text(ping)).await);

        let echoed = timeout(Duration::from_secs(5), async {
            while let Some(Ok(message)) = ws.next().await {
                if let Some(frame) = frame_of(message) {
                    if let Ok(ServerEvent::ManualPing { time }) = decode::<ServerEvent>(&frame) {
                        return Some(time);
                    }
                }
            }
            None
        })
        .await
        .unwrap();
        assert_eq!(echoed, Some(42.0));

        handle.send(ServerMessage::Shutdown).unwrap();
    }

    /// A silent client is dropped from the game and its socket is closed
    #[tokio::test]
    async fn silent_client_is_closed_after_timeout() {
        let (addr, handle) = start_server_with_timeout(100).await;
        let (mut ws, _) = tokio_test::assert_ok!(connect_async(format!("ws://{}/", addr)).await);

        // Never send anything; keep reading until the server closes the socket.
        let closed = timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;

        assert!(matches!(closed, Ok(true)));
        handle.send(ServerMessage::Shutdown).unwrap();
    }

    /// The native client engine joins over a binary connection
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn network_client_joins_over_binary() {
        use client::network::{NetworkClient, NetworkEvent};

        let (addr, handle) = start_server().await;
        let mut network =
            NetworkClient::connect(format!("ws://{}/bin", addr), WireFormat::Binary, 0).unwrap();
        let mut game = ClientGameState::new(ClientConfig::default());

        let mut snapshots = 0;
        for _ in 0..200 {
            for event in network.poll() {
                match event {
                    NetworkEvent::Event(ServerEvent::ServerUpdate(snapshot)) => {
                        snapshots += 1;
                        game.handle_server_event(ServerEvent::ServerUpdate(snapshot));
                    }
                    NetworkEvent::Event(event) => game.handle_server_event(event),
                    NetworkEvent::Disconnected(reason) => panic!("Disconnected: {}", reason),
                }
            }
            if game.is_connected() && snapshots >= 2 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }

        assert!(game.is_connected());
        assert!(snapshots >= 2);
        assert_eq!(game.blocks().count(), 3);
        assert!(game.local_player().is_some());

        game.set_name("tester");
        for event in game.drain_outbox() {
            assert!(network.send(event));
        }
        handle.send(ServerMessage::Shutdown).unwrap();
    }
}
