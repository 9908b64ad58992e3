use clap::Parser;
use client::camera::Camera;
use client::config::ClientConfig;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::{NetworkClient, NetworkEvent};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::WireFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server WebSocket address, e.g. ws://127.0.0.1:8080
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Name shown above the player and on the leaderboard
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Speak JSON text frames instead of bincode
    #[arg(long)]
    json: bool,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long)]
    fake_ping: Option<u64>,

    /// Window width
    #[arg(short = 'w', long)]
    width: Option<u32>,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long)]
    height: Option<u32>,

    /// How far behind the server clock other players are shown, in milliseconds
    #[arg(long)]
    offset_ms: Option<f64>,

    /// Per-frame smoothing factor for interpolated players
    #[arg(long)]
    smoothing: Option<f32>,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };

        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        if self.json {
            config.binary = false;
        }
        if let Some(fake_ping) = self.fake_ping {
            config.fake_ping_ms = fake_ping;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(offset) = self.offset_ms {
            config.client_server_offset_ms = offset;
        }
        if let Some(smoothing) = self.smoothing {
            config.client_smoothing = smoothing;
        }
        Ok(config)
    }
}

fn load_config() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    Args::parse().into_config()
}

fn window_conf() -> Conf {
    let config = load_config().unwrap_or_default();
    Conf {
        window_title: "Block Party".to_string(),
        window_width: config.width as i32,
        window_height: config.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    info!("Starting client...");
    info!("Connecting to: {}", config.url());
    if config.fake_ping_ms > 0 {
        info!("Simulating {}ms latency", config.fake_ping_ms);
    }
    info!("Controls: mouse to steer, Space to attach, Backspace to detach");
    info!("Press 1/2/3 to toggle Prediction/Reconciliation/Interpolation");

    let format = if config.binary {
        WireFormat::Binary
    } else {
        WireFormat::Json
    };
    let mut network = match NetworkClient::connect(config.url(), format, config.fake_ping_ms) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network thread: {}", e);
            return;
        }
    };

    let renderer = Renderer::new(config.fake_ping_ms);
    let mut camera = Camera::new(screen_width(), screen_height());
    let mut input_manager = InputManager::new();
    let name = config.name.clone();
    let mut game = ClientGameState::new(config);
    if !name.is_empty() {
        game.set_name(&name);
    }

    let mut online = true;
    while !is_key_pressed(KeyCode::Escape) {
        for event in network.poll() {
            match event {
                NetworkEvent::Event(event) => game.handle_server_event(event),
                NetworkEvent::Disconnected(reason) => {
                    warn!("Disconnected: {}", reason);
                    online = false;
                }
            }
        }

        let frame = input_manager.update();
        if frame.toggle_prediction {
            game.toggle_prediction();
        }
        if frame.toggle_reconciliation {
            game.toggle_reconciliation();
        }
        if frame.toggle_interpolation {
            game.toggle_interpolation();
        }

        camera.resize(screen_width(), screen_height());
        if let Some(player) = game.local_player() {
            camera.follow(player.position);
        }

        game.record_input(camera.to_world(frame.pointer));
        game.tick(Duration::from_secs_f32(get_frame_time().max(0.0)));
        game.process_server_updates();
        game.determine_candidate_block();

        if frame.attach {
            game.request_attach();
        }
        if frame.detach {
            game.request_detach();
        }

        for event in game.drain_outbox() {
            if online && !network.send(event) {
                online = false;
            }
        }

        renderer.render(&game, &camera);
        next_frame().await;
    }

    info!("Client shutting down");
}
