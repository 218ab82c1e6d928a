use clap::Parser;
use log::{error, info, warn};
use server::game::ServerGame;
use server::network::{Server, ServerConfig};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Turns per second
    #[arg(short, long, default_value_t = shared::DEFAULT_TURNS_PER_SECOND)]
    tick_rate: f64,
    /// Maximum number of connected clients
    #[arg(short, long, default_value = "8")]
    max_clients: usize,
    /// Map width in tiles
    #[arg(long, default_value = "32")]
    width: i32,
    /// Map height in tiles
    #[arg(long, default_value = "32")]
    height: i32,
    /// Seed for map generation and creature movement
    #[arg(long, default_value = "1")]
    seed: u64,
    /// World snapshot to resume from and to save on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        width: args.width,
        height: args.height,
        seed: args.seed,
        snapshot: args.snapshot,
    };

    let game = match &config.snapshot {
        Some(path) if path.exists() => ServerGame::load_snapshot(path, config.seed)?,
        _ => {
            info!(
                "Generating a {}x{} map with seed {}",
                config.width, config.height, config.seed
            );
            ServerGame::generate(config.width, config.height, config.seed, config.tick_rate)
        }
    };

    let mut server = Server::bind(&config, game).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    if let Some(path) = &config.snapshot {
        if let Err(e) = server.game().save_snapshot(path) {
            warn!("Could not save snapshot: {}", e);
        }
    }

    Ok(())
}
