//! Types shared by the snek server and its clients: the grid entity model,
//! the binary wire codec and the request protocol constants.

pub mod codec;
pub mod entity;
pub mod error;
pub mod protocol;

pub use codec::{BlocksMessage, EntityRecord, StateMessage};
pub use entity::{Block, BlockDelta, Direction, Entity, EntityKind, Metadata, Shape, SnakeState};
pub use error::{CodecError, CodecResult};
pub use protocol::{Command, DirectionAck, EngineInfo, GridMode, PlayerId};
