//! Request parsing and the one-shot connection handler.
//!
//! A connection carries exactly one request: the client writes a command
//! byte and its arguments, half-closes, and the server answers once before
//! closing. Every failure is confined to its connection; the worst a bad
//! request gets is an empty reply.

use crate::error::DispatchError;
use crate::world::World;
use log::{info, warn};
use shared::codec::encode_json_blob;
use shared::protocol::{MAX_REQUEST_LEN, PLAYER_ID_LEN};
use shared::{Command, Direction, DirectionAck, PlayerId};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register { name: String },
    SetDirection { player: PlayerId, direction: Direction },
    EngineInfo,
    CurrentState(Option<PlayerId>),
    UpdatedState(PlayerId),
    CurrentBlocks(Option<PlayerId>),
    UpdatedBlocks(PlayerId),
}

impl Request {
    pub fn parse(bytes: &[u8]) -> Result<Self, DispatchError> {
        let (&byte, args) = bytes.split_first().ok_or(DispatchError::Empty)?;
        let command = Command::from_byte(byte).ok_or(DispatchError::UnknownCommand(byte))?;
        let malformed = || DispatchError::Malformed {
            command: byte,
            len: args.len(),
        };
        let player = || PlayerId::from_bytes(args).ok_or_else(malformed);
        let optional_player = || {
            if args.is_empty() {
                Ok(None)
            } else {
                player().map(Some)
            }
        };

        Ok(match command {
            Command::Register => {
                let name = std::str::from_utf8(args).map_err(|_| malformed())?;
                Request::Register {
                    name: name.to_string(),
                }
            }
            Command::SetDirection => {
                if args.len() != PLAYER_ID_LEN + 1 {
                    return Err(malformed());
                }
                let player = PlayerId::from_bytes(&args[..PLAYER_ID_LEN]).ok_or_else(malformed)?;
                let direction =
                    Direction::from_byte(args[PLAYER_ID_LEN]).ok_or_else(malformed)?;
                Request::SetDirection { player, direction }
            }
            Command::EngineInfo => Request::EngineInfo,
            Command::CurrentState => Request::CurrentState(optional_player()?),
            Command::UpdatedState => Request::UpdatedState(player()?),
            Command::CurrentBlocks => Request::CurrentBlocks(optional_player()?),
            Command::UpdatedBlocks => Request::UpdatedBlocks(player()?),
        })
    }
}

async fn execute(world: &World, request: Request) -> Result<Vec<u8>, DispatchError> {
    match request {
        Request::Register { name } => match world.register(&name).await {
            Ok(id) => Ok(id.to_bytes().to_vec()),
            Err(e) => {
                info!("Registration of '{}' refused: {}", name, e);
                Ok(Vec::new())
            }
        },
        Request::SetDirection { player, direction } => {
            Ok(vec![world.set_direction(player, direction).await.to_byte()])
        }
        Request::EngineInfo => {
            let mut out = Vec::new();
            encode_json_blob(&mut out, &world.engine_info().await)?;
            Ok(out)
        }
        Request::CurrentState(player) => world.current_state(player).await,
        Request::UpdatedState(player) => world.updated_state(player).await,
        Request::CurrentBlocks(player) => world.current_blocks(player).await,
        Request::UpdatedBlocks(player) => world.updated_blocks(player).await,
    }
}

/// Answers one raw request. Failures become an empty reply, except a
/// malformed direction change which is acknowledged as such.
pub async fn respond(world: &World, raw: &[u8]) -> Vec<u8> {
    let result = match Request::parse(raw) {
        Ok(request) => execute(world, request).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(reply) => reply,
        Err(DispatchError::Malformed { command, len })
            if command == Command::SetDirection.to_byte() =>
        {
            warn!("Malformed direction change ({} argument bytes)", len);
            vec![DirectionAck::Malformed.to_byte()]
        }
        Err(e) => {
            warn!("Request failed: {}", e);
            Vec::new()
        }
    }
}

/// Reads a whole request up to EOF.
pub async fn read_request<S>(stream: &mut S, timeout: Duration) -> Result<Vec<u8>, DispatchError>
where
    S: AsyncRead + Unpin,
{
    let mut request = Vec::new();
    let limit = (MAX_REQUEST_LEN + 1) as u64;
    tokio::time::timeout(timeout, (&mut *stream).take(limit).read_to_end(&mut request))
        .await
        .map_err(|_| DispatchError::Timeout(timeout))??;
    if request.len() > MAX_REQUEST_LEN {
        return Err(DispatchError::TooLarge(MAX_REQUEST_LEN));
    }
    Ok(request)
}

/// Serves a single request on `stream` and closes it.
pub async fn handle_connection<S>(
    world: &World,
    mut stream: S,
    timeout: Duration,
) -> Result<(), DispatchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = read_request(&mut stream, timeout).await?;
    let reply = respond(world, &request).await;
    if !reply.is_empty() {
        stream.write_all(&reply).await?;
    }
    stream.shutdown().await?;
    Ok(())
}
