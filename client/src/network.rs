use crate::error::ClientError;
use log::debug;
use shared::codec::{decode_blocks_message, decode_json_blob, decode_state_message};
use shared::{BlocksMessage, Command, Direction, DirectionAck, EngineInfo, PlayerId, StateMessage};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Client for the one-request-per-connection protocol.
///
/// Once [`SnekClient::register`] succeeds every state request is made on
/// behalf of that player; before that, full-state requests are made as a
/// spectator.
#[derive(Debug, Clone)]
pub struct SnekClient {
    addr: String,
    player: Option<PlayerId>,
    timeout: Duration,
}

impl SnekClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            player: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Acts as an already registered player.
    pub fn set_player(&mut self, player: Option<PlayerId>) {
        self.player = player;
    }

    /// Sends one command and reads the reply until the server closes.
    pub async fn send_command(&self, command: Command, args: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut request = Vec::with_capacity(1 + args.len());
        request.push(command.to_byte());
        request.extend_from_slice(args);

        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(&request).await?;
            stream.shutdown().await?;
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await?;
            Ok::<_, std::io::Error>(reply)
        };
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        debug!("{:?}: {} byte reply", command, reply.len());
        Ok(reply)
    }

    fn require_player(&self) -> Result<PlayerId, ClientError> {
        self.player.ok_or(ClientError::NotRegistered)
    }

    fn player_args(&self) -> Vec<u8> {
        self.player.map(|p| p.to_bytes().to_vec()).unwrap_or_default()
    }

    pub async fn register(&mut self, name: &str) -> Result<PlayerId, ClientError> {
        let reply = self.send_command(Command::Register, name.as_bytes()).await?;
        let player = match PlayerId::from_bytes(&reply) {
            Some(player) => player,
            None if reply.is_empty() => return Err(ClientError::RegistrationRefused),
            None => return Err(ClientError::UnexpectedReply(reply.len())),
        };
        self.player = Some(player);
        Ok(player)
    }

    pub async fn set_direction(&self, direction: Direction) -> Result<(), ClientError> {
        let mut args = self.require_player()?.to_bytes().to_vec();
        args.push(direction.to_byte());
        let reply = self.send_command(Command::SetDirection, &args).await?;
        match reply.as_slice() {
            [byte] => match DirectionAck::from_byte(*byte) {
                Some(DirectionAck::Accepted) => Ok(()),
                Some(ack) => Err(ClientError::DirectionRejected(ack)),
                None => Err(ClientError::UnexpectedReply(1)),
            },
            [] => Err(ClientError::EmptyReply),
            _ => Err(ClientError::UnexpectedReply(reply.len())),
        }
    }

    pub async fn engine_info(&self) -> Result<EngineInfo, ClientError> {
        let reply = self.send_command(Command::EngineInfo, &[]).await?;
        Ok(decode_json_blob(&mut reply.as_slice())?)
    }

    async fn state(&self, command: Command, args: &[u8]) -> Result<Vec<u8>, ClientError> {
        let reply = self.send_command(command, args).await?;
        if reply.is_empty() {
            return Err(ClientError::EmptyReply);
        }
        Ok(reply)
    }

    /// Full state; as a spectator when not registered.
    pub async fn current_state(&self) -> Result<StateMessage, ClientError> {
        let reply = self.state(Command::CurrentState, &self.player_args()).await?;
        Ok(decode_state_message(&reply)?)
    }

    /// Everything that changed since this player's last state read.
    pub async fn updated_state(&self) -> Result<StateMessage, ClientError> {
        let args = self.require_player()?.to_bytes();
        let reply = self.state(Command::UpdatedState, &args).await?;
        Ok(decode_state_message(&reply)?)
    }

    pub async fn current_blocks(&self) -> Result<BlocksMessage, ClientError> {
        let reply = self.state(Command::CurrentBlocks, &self.player_args()).await?;
        Ok(decode_blocks_message(&reply)?)
    }

    pub async fn updated_blocks(&self) -> Result<BlocksMessage, ClientError> {
        let args = self.require_player()?.to_bytes();
        let reply = self.state(Command::UpdatedBlocks, &args).await?;
        Ok(decode_blocks_message(&reply)?)
    }
}
