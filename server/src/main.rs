use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON config file; flags below override its values
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Server IP address to bind to
    #[clap(short = 'H', long)]
    host: Option<String>,
    /// Server port to listen on
    #[clap(short, long)]
    port: Option<u16>,
    /// Snapshot broadcast period in milliseconds
    #[clap(long)]
    broadcast_period_ms: Option<u64>,
    /// Maximum players per session
    #[clap(long)]
    max_players: Option<usize>,
    /// Free blocks seeded into a new session
    #[clap(long)]
    initial_blocks: Option<usize>,
    /// Free block pool size restored by periodic generation
    #[clap(long)]
    max_blocks: Option<usize>,
    /// How long a completed solution is held before scoring, in milliseconds
    #[clap(long)]
    hold_time_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(period) = self.broadcast_period_ms {
            config.broadcast_period_ms = period;
        }
        if let Some(max_players) = self.max_players {
            config.session.max_players = max_players;
        }
        if let Some(initial_blocks) = self.initial_blocks {
            config.session.initial_blocks = initial_blocks;
        }
        if let Some(max_blocks) = self.max_blocks {
            config.session.max_blocks = max_blocks;
        }
        if let Some(hold) = self.hold_time_ms {
            config.session.solution_hold_time_ms = hold;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Args::parse().into_config()?;
    info!(
        "Starting server on {} ({} players per session, {} ms broadcast)",
        config.address(),
        config.session.max_players,
        config.broadcast_period_ms
    );

    let mut server = Server::new(config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = handle.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
