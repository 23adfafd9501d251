use shared::{CodecError, DirectionAck};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// The server answered a registration with nothing: full, out of
    /// space, or the random id collided.
    #[error("registration refused")]
    RegistrationRefused,
    #[error("not registered")]
    NotRegistered,
    #[error("direction change not accepted: {0:?}")]
    DirectionRejected(DirectionAck),
    /// Empty reply to a state request; the player is unknown to the server.
    #[error("server sent an empty reply")]
    EmptyReply,
    #[error("unexpected reply of {0} bytes")]
    UnexpectedReply(usize),
}
