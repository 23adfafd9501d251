use shared::{CodecError, PlayerId};
use std::time::Duration;
use thiserror::Error;

/// Why a registration produced no player. Every variant is answered with an
/// empty reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("player id {0} is already taken")]
    IdCollision(PlayerId),
    #[error("server is full ({0} players)")]
    Full(usize),
    #[error("no free cell to spawn a snake")]
    NoSpace,
}

/// A request that could not be served.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("empty request")]
    Empty,
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    #[error("malformed arguments for command {command:#04x} ({len} bytes)")]
    Malformed { command: u8, len: usize },
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("request exceeds {0} bytes")]
    TooLarge(usize),
    #[error("no complete request within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
