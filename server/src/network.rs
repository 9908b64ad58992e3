//! Server network layer: WebSocket connections and the main event loop

use crate::config::ServerConfig;
use crate::connections::{Connection, ConnectionManager};
use crate::matchmaker::Matchmaker;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::protocol::decode;
use shared::{ClientEvent, Frame, PlayerId, WireFormat, PHYSICS_UPDATE_PERIOD_MS};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_hdr_async;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        addr: SocketAddr,
        format: WireFormat,
        sender: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<PlayerId>,
    },
    EventReceived {
        player_id: PlayerId,
        event: ClientEvent,
    },
    ClientDisconnected {
        player_id: PlayerId,
    },
    Shutdown,
}

/// Main server coordinating connections and the session simulations
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    matchmaker: Matchmaker,
    connections: ConnectionManager,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let matchmaker = Matchmaker::new(config.session);
        Self::with_matchmaker(config, matchmaker).await
    }

    pub async fn with_matchmaker(
        config: ServerConfig,
        matchmaker: Matchmaker,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            connections: ConnectionManager::new(config.client_timeout()),
            config,
            matchmaker,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the server from another task.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts incoming WebSocket connections
    fn spawn_acceptor(&self, listener: TcpListener) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(stream, addr, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Applies one message from a connection task
    fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::ClientConnected {
                addr,
                format,
                sender,
                reply,
            } => {
                let (player_id, session_id) = self.matchmaker.join();
                self.connections
                    .add(Connection::new(player_id, addr, format, sender));
                debug!("{} placed in {}", player_id, session_id);

                if reply.send(player_id).is_err() {
                    warn!("Connection task for {} went away during join", player_id);
                    self.disconnect(player_id);
                }
            }
            ServerMessage::EventReceived { player_id, event } => {
                self.connections.touch(player_id);
                self.matchmaker.handle_event(player_id, event);
            }
            ServerMessage::ClientDisconnected { player_id } => {
                self.disconnect(player_id);
            }
            ServerMessage::Shutdown => return false,
        }
        self.flush_outbound();
        true
    }

    fn disconnect(&mut self, player_id: PlayerId) {
        self.connections.remove(player_id);
        self.matchmaker.leave(player_id);
    }

    /// Sends everything the sessions queued since the last flush
    fn flush_outbound(&mut self) {
        for delivery in self.matchmaker.drain_outbound() {
            self.connections.deliver(&delivery);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.listener.take().ok_or("server is already running")?;
        self.spawn_acceptor(listener);

        let mut clock = interval(self.config.timer_period());
        let mut physics = interval(Duration::from_millis(PHYSICS_UPDATE_PERIOD_MS));
        let mut broadcast = interval(self.config.broadcast_period());
        let mut generation = interval(self.config.block_generation_period());
        let mut timeouts = interval(Duration::from_secs(1));
        for timer in [&mut clock, &mut physics, &mut broadcast, &mut timeouts] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }
        // The first generation tick fires immediately; sessions are seeded on creation.
        generation.tick().await;

        let mut last_clock = Instant::now();
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => {
                            if !self.handle_message(message) {
                                info!("Server shutting down");
                                break;
                            }
                        }
                        None => break,
                    }
                },

                _ = clock.tick() => {
                    let now = Instant::now();
                    self.matchmaker.advance_clock(now.duration_since(last_clock));
                    last_clock = now;
                },

                _ = physics.tick() => {
                    self.matchmaker.update_physics();
                    self.flush_outbound();
                },

                _ = broadcast.tick() => {
                    self.matchmaker.broadcast_snapshots();
                    self.flush_outbound();
                },

                _ = generation.tick() => {
                    self.matchmaker.top_up_blocks();
                },

                _ = timeouts.tick() => {
                    for player_id in self.connections.check_timeouts() {
                        self.matchmaker.leave(player_id);
                    }
                    self.flush_outbound();

                    if self.matchmaker.player_count() > 0 {
                        debug!(
                            "{} players in {} sessions",
                            self.matchmaker.player_count(),
                            self.matchmaker.session_count()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

/// Drives one WebSocket connection until either side closes it.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut format = WireFormat::Json;
    let select_format = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        format = WireFormat::from_path(request.uri().path());
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, select_format).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();
    let (reply_tx, reply_rx) = oneshot::channel();

    let connected = ServerMessage::ClientConnected {
        addr,
        format,
        sender: frame_tx,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        return;
    }
    let Ok(player_id) = reply_rx.await else {
        return;
    };

    loop {
        tokio::select! {
            outbound = frame_rx.recv() => {
                let Some(frame) = outbound else {
                    // Evicted on timeout or shutdown; tell the peer.
                    debug!("Closing evicted connection {} from {}", player_id, addr);
                    let _ = ws_sender.close().await;
                    return;
                };
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                if ws_sender.send(message).await.is_err() {
                    break;
                }
            },

            inbound = ws_receiver.next() => {
                let frame = match inbound {
                    Some(Ok(Message::Text(text))) => Frame::Text(text),
                    Some(Ok(Message::Binary(bytes))) => Frame::Binary(bytes),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                };

                match decode::<ClientEvent>(&frame) {
                    Ok(ClientEvent::Disconnect) => break,
                    Ok(event) => {
                        if server_tx
                            .send(ServerMessage::EventReceived { player_id, event })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to decode event from {}: {}", addr, e),
                }
            },
        }
    }

    let _ = server_tx.send(ServerMessage::ClientDisconnected { player_id });
}
