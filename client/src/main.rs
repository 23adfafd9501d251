use clap::Parser;
use client::{ClientError, ClientGameState, SnekClient};
use log::{info, warn};
use std::time::Duration;

/// Registration ids are random, so a refusal may just be a collision.
const REGISTER_ATTEMPTS: usize = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Name shown for this player's snake
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Milliseconds between state polls
    #[arg(short, long, default_value = "200")]
    poll_ms: u64,

    /// Steer towards food instead of just watching
    #[arg(short, long)]
    autopilot: bool,
}

async fn register(client: &mut SnekClient, name: &str) -> Result<(), ClientError> {
    let mut attempt = 1;
    loop {
        match client.register(name).await {
            Ok(player) => {
                info!("Registered as {} ({})", player, name);
                return Ok(());
            }
            Err(ClientError::RegistrationRefused) if attempt < REGISTER_ATTEMPTS => {
                warn!("Registration refused, retrying ({}/{})", attempt, REGISTER_ATTEMPTS);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn play(client: &SnekClient, game: &mut ClientGameState, args: &Args) -> Result<(), ClientError> {
    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_ms));

    while game.alive {
        ticker.tick().await;
        game.apply_update(&client.updated_state().await?);

        if !args.autopilot || !game.alive {
            continue;
        }
        match game.choose_direction() {
            Some(direction) if direction != game.heading => {
                match client.set_direction(direction).await {
                    Ok(()) => game.heading = direction,
                    Err(ClientError::DirectionRejected(ack)) => warn!("{:?} refused: {:?}", direction, ack),
                    Err(e) => return Err(e),
                }
            }
            Some(_) => {}
            None => warn!("No safe move from {:?}", game.head),
        }
    }

    info!("Snake died");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = SnekClient::new(args.server.clone());
    let info = client.engine_info().await?;
    info!("Engine: {}x{} {:?}", info.width, info.height, info.grid_mode());

    register(&mut client, &args.name).await?;

    let mut game = ClientGameState::new(info);
    game.apply_full(&client.current_state().await?);

    tokio::select! {
        result = play(&client, &mut game, &args) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
