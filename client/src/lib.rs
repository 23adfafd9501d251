//! # Snake Game Client Library
//!
//! This library talks to the snake server over its one-request-per-connection
//! protocol and keeps a local picture of the grid built from the replies.
//!
//! ## Architecture Overview
//!
//! Every call opens a TCP connection, writes a command byte and its
//! arguments, half-closes the stream and reads the reply to EOF. The server
//! keeps one accumulator per registered player, so a client that polls
//! [`network::SnekClient::updated_state`] receives only what changed since its
//! previous read.
//!
//! ### Local State
//! [`game::ClientGameState`] is replaced wholesale by a full state and patched
//! by updated states. Within one update every removal is applied before any
//! addition, since a cell freed by one snake may be taken by another in the
//! same tick.
//!
//! ### Autopilot
//! [`game::ClientGameState::choose_direction`] picks a greedy move towards the
//! nearest food that neither reverses the snake nor enters an occupied cell.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! One method per server command, with timeouts and reply validation.
//!
//! ### Game Module (`game`)
//! The local cell map and the autopilot.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::SnekClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = SnekClient::new("127.0.0.1:12345");
//!     client.register("bot").await?;
//!
//!     let mut game = ClientGameState::new(client.engine_info().await?);
//!     game.apply_full(&client.current_state().await?);
//!
//!     while game.alive {
//!         tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//!         game.apply_update(&client.updated_state().await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod network;

pub use error::ClientError;
pub use game::{ClientGameState, Occupant};
pub use network::SnekClient;
