use clap::Parser;
use log::info;
use server::config::{EngineSettings, ServerConfig, WallSpec};
use server::network::Server;
use shared::protocol::DEFAULT_PORT;
use shared::GridMode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Grid width in cells
    #[arg(long, default_value = "20")]
    width: u16,

    /// Grid height in cells
    #[arg(long, default_value = "20")]
    height: u16,

    /// Food items kept on the grid
    #[arg(short, long, default_value = "2")]
    food: usize,

    /// Milliseconds per tick
    #[arg(short, long, default_value = "200")]
    tick_ms: u64,

    /// Grid edges: "bounded" kills, "wrapping" re-enters on the other side
    #[arg(short, long, default_value = "wrapping")]
    mode: GridMode,

    /// Maximum number of registered players
    #[arg(long, default_value = "5")]
    max_players: usize,

    /// Seconds of silence before a player's snake is killed
    #[arg(long, default_value = "10")]
    kill_secs: u64,

    /// Seconds of silence before a player is removed
    #[arg(long, default_value = "20")]
    kick_secs: u64,

    /// Seconds between player status reports (0 disables them)
    #[arg(long, default_value = "2")]
    status_secs: u64,

    /// Seed for spawn placement
    #[arg(long)]
    seed: Option<u64>,

    /// Static wall as X,Y or X,Y:X,Y (repeatable)
    #[arg(short, long = "wall")]
    walls: Vec<WallSpec>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            tick: Duration::from_millis(self.tick_ms),
            engine: EngineSettings {
                width: self.width,
                height: self.height,
                mode: self.mode,
                target_food: self.food,
                seed: self.seed,
                walls: self.walls,
            },
            max_players: self.max_players,
            kill_after: Duration::from_secs(self.kill_secs),
            kick_after: Duration::from_secs(self.kick_secs),
            status_interval: Duration::from_secs(self.status_secs),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting {}x{} {:?} grid, {} food, {:?} per tick",
        config.engine.width,
        config.engine.height,
        config.engine.mode,
        config.engine.target_food,
        config.tick
    );

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
