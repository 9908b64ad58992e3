//! WebSocket link to the game server.
//!
//! The render loop is synchronous, so the socket lives on its own thread
//! with a single-threaded tokio runtime. Events cross over on unbounded
//! channels and are polled once per frame.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::decode;
use shared::{ClientEvent, Frame, ServerEvent, WireFormat};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Event(ServerEvent),
    Disconnected(String),
}

pub struct NetworkClient {
    outgoing: UnboundedSender<ClientEvent>,
    incoming: UnboundedReceiver<NetworkEvent>,
}

impl NetworkClient {
    /// Starts the connection thread. Connection failures are reported later
    /// as [`NetworkEvent::Disconnected`].
    pub fn connect(
        url: String,
        format: WireFormat,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let delay = Duration::from_millis(fake_ping_ms / 2);

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let result = runtime.block_on(run_connection(
                    url,
                    format,
                    delay,
                    outgoing_rx,
                    incoming_tx.clone(),
                ));
                let reason = match result {
                    Ok(()) => "connection closed".to_string(),
                    Err(e) => e.to_string(),
                };
                let _ = incoming_tx.send(NetworkEvent::Disconnected(reason));
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    pub fn send(&self, event: ClientEvent) -> bool {
        self.outgoing.send(event).is_ok()
    }

    /// Everything received since the last poll, in arrival order.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        let _ = self.outgoing.send(ClientEvent::Disconnect);
    }
}

/// Hands `value` to `tx`, after `delay` if one is configured.
fn forward_after<T: Send + 'static>(tx: &UnboundedSender<T>, value: T, delay: Duration) {
    if delay.is_zero() {
        let _ = tx.send(value);
        return;
    }
    let tx = tx.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = tx.send(value);
    });
}

/// Runs one connection until the server closes it or the client hangs up.
pub async fn run_connection(
    url: String,
    format: WireFormat,
    delay: Duration,
    mut outgoing: UnboundedReceiver<ClientEvent>,
    incoming: UnboundedSender<NetworkEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (delayed_tx, mut delayed_rx) = mpsc::unbounded_channel::<ClientEvent>();
    info!("Connected to {}", url);

    loop {
        tokio::select! {
            event = outgoing.recv() => match event {
                Some(event) => forward_after(&delayed_tx, event, delay),
                None => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },

            Some(event) = delayed_rx.recv() => {
                let hang_up = event == ClientEvent::Disconnect;
                let message = match format.encode(&event)? {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                ws_sender.send(message).await?;
                if hang_up {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },

            message = ws_receiver.next() => {
                let frame = match message {
                    Some(Ok(Message::Text(text))) => Frame::Text(text),
                    Some(Ok(Message::Binary(bytes))) => Frame::Binary(bytes),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                match decode::<ServerEvent>(&frame) {
                    Ok(event) => forward_after(&incoming, NetworkEvent::Event(event), delay),
                    Err(e) => warn!("Failed to decode server event: {}", e),
                }
            },
        }
    }

    debug!("Connection to {} finished", url);
    Ok(())
}
