//! # Snake Game Server Library
//!
//! This library provides the authoritative server for the multiplayer snake
//! game. It owns the one shared grid, advances it on a fixed clock, and answers
//! short-lived client requests with exactly the state each player has not
//! seen yet.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The engine runs the definitive simulation. Every tick resolves deaths
//! (walls, grid edges in bounded mode, other snakes, self), then feeding, then
//! movement, then tops up food. Spawn positions come from a seedable RNG and
//! all iteration follows creation order, so a seeded run is reproducible.
//!
//! ### Differential Sync
//! Each registered player owns a tracker that accumulates the blocks gained
//! and lost by every entity since that player last read the state. A block
//! added and later removed inside one window cancels out. Reading the state
//! serializes the tracker and starts a new window.
//!
//! ### Player Lifecycle
//! Handles registration under random 64-bit ids with a player cap, steering
//! requests, and liveness:
//! - A player silent for the kill time loses their snake
//! - A player silent for the kick time is removed
//! - A player whose dead snake has been reported to them is removed
//!
//! ## Architecture Design
//!
//! ### Request per Connection
//! A client opens a TCP connection, writes one command byte and its
//! arguments, half-closes, and reads the reply until the server closes. There
//! is no session state in the connection itself.
//!
//! ### Shared State
//! The engine and the player map each sit behind an async `RwLock`, and every
//! player behind its own mutex. The tick task holds the engine and player map
//! for the length of one step; request tasks only lock the single player
//! they address. The tick task never touches the network.
//!
//! ## Module Organization
//!
//! ### Engine Module (`engine`)
//! Grid, entities and the tick itself. Reports per-entity block changes.
//!
//! ### Tracker Module (`tracker`)
//! Per-player accumulation of tick reports.
//!
//! ### Player Manager Module (`player_manager`)
//! Registered players, capacity and timeouts.
//!
//! ### World Module (`world`)
//! Ties the engine to the players and implements every command.
//!
//! ### Snapshot Module (`snapshot`)
//! Binary encoders for the state replies.
//!
//! ### Dispatch Module (`dispatch`)
//! Parses requests and serves a single connection.
//!
//! ### Network Module (`network`)
//! TCP accept loop plus the tick and status tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ServerConfig::default();
//!     config.bind_addr = "127.0.0.1:12345".to_string();
//!     config.engine.seed = Some(42);
//!
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod network;
pub mod player_manager;
pub mod snapshot;
pub mod tracker;
pub mod world;

pub use config::{EngineSettings, ServerConfig, WallSpec};
pub use error::{DispatchError, RegisterError, ServerError};
pub use network::Server;
pub use world::World;
