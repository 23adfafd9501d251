//! Request framing shared by server and client.
//!
//! A request is one command byte followed by its arguments; the client
//! half-closes after writing and the server answers once, then closes.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 12345;

/// Size of a player identifier on the wire.
pub const PLAYER_ID_LEN: usize = 8;

/// Requests longer than this are rejected unread.
pub const MAX_REQUEST_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Register,
    SetDirection,
    EngineInfo,
    CurrentState,
    UpdatedState,
    /// Alive flag plus every live block.
    CurrentBlocks,
    /// Alive flag plus accumulated block changes.
    UpdatedBlocks,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Command::Register),
            0x01 => Some(Command::SetDirection),
            0x02 => Some(Command::EngineInfo),
            0x03 => Some(Command::CurrentState),
            0x04 => Some(Command::UpdatedState),
            0xfe => Some(Command::CurrentBlocks),
            0xff => Some(Command::UpdatedBlocks),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Command::Register => 0x00,
            Command::SetDirection => 0x01,
            Command::EngineInfo => 0x02,
            Command::CurrentState => 0x03,
            Command::UpdatedState => 0x04,
            Command::CurrentBlocks => 0xfe,
            Command::UpdatedBlocks => 0xff,
        }
    }
}

/// Random identifier handed out on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// Parses exactly [`PLAYER_ID_LEN`] big-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; PLAYER_ID_LEN] = bytes.try_into().ok()?;
        Some(PlayerId(u64::from_be_bytes(bytes)))
    }

    pub fn to_bytes(self) -> [u8; PLAYER_ID_LEN] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Single-byte reply to a direction change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionAck {
    Accepted,
    /// Immediate reversal, or the snake is already gone.
    Rejected,
    UnknownPlayer,
    Malformed,
}

impl DirectionAck {
    pub fn to_byte(self) -> u8 {
        match self {
            DirectionAck::Accepted => 0x00,
            DirectionAck::Rejected => 0x01,
            DirectionAck::UnknownPlayer => 0x02,
            DirectionAck::Malformed => 0x03,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(DirectionAck::Accepted),
            0x01 => Some(DirectionAck::Rejected),
            0x02 => Some(DirectionAck::UnknownPlayer),
            0x03 => Some(DirectionAck::Malformed),
            _ => None,
        }
    }
}

/// Whether snakes leaving the grid die or re-enter on the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridMode {
    Bounded,
    Wrapping,
}

impl GridMode {
    pub fn code(self) -> u8 {
        match self {
            GridMode::Bounded => 0,
            GridMode::Wrapping => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(GridMode::Bounded),
            1 => Some(GridMode::Wrapping),
            _ => None,
        }
    }
}

impl std::str::FromStr for GridMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bounded" | "0" => Ok(GridMode::Bounded),
            "wrapping" | "pacman" | "1" => Ok(GridMode::Wrapping),
            other => Err(format!("unknown grid mode '{}'", other)),
        }
    }
}

/// Reply to the engine info command, sent as a length-prefixed JSON blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// [`GridMode::code`].
    pub mode: u8,
    pub width: u16,
    pub height: u16,
}

impl EngineInfo {
    pub fn grid_mode(&self) -> Option<GridMode> {
        GridMode::from_code(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json_blob, encode_json_blob};

    #[test]
    fn test_command_bytes() {
        for byte in [0x00, 0x01, 0x02, 0x03, 0x04, 0xfe, 0xff] {
            let command = Command::from_byte(byte).unwrap();
            assert_eq!(command.to_byte(), byte);
        }
        assert_eq!(Command::from_byte(0x05), None);
        assert_eq!(Command::from_byte(0x80), None);
    }

    #[test]
    fn test_player_id_bytes() {
        let id = PlayerId(0x0102_0304_0506_0708);
        assert_eq!(id.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(PlayerId::from_bytes(&id.to_bytes()), Some(id));
        assert_eq!(PlayerId::from_bytes(&[1, 2, 3]), None);
        assert_eq!(PlayerId::from_bytes(&[0; 9]), None);
    }

    #[test]
    fn test_ack_bytes() {
        for byte in 0x00..=0x03 {
            assert_eq!(DirectionAck::from_byte(byte).unwrap().to_byte(), byte);
        }
        assert_eq!(DirectionAck::from_byte(0x04), None);
    }

    #[test]
    fn test_grid_mode_parsing() {
        assert_eq!("bounded".parse::<GridMode>(), Ok(GridMode::Bounded));
        assert_eq!("Wrapping".parse::<GridMode>(), Ok(GridMode::Wrapping));
        assert!("torus".parse::<GridMode>().is_err());
    }

    #[test]
    fn test_engine_info_json() {
        let info = EngineInfo {
            mode: GridMode::Wrapping.code(),
            width: 20,
            height: 10,
        };
        let mut out = Vec::new();
        encode_json_blob(&mut out, &info).unwrap();
        let json = std::str::from_utf8(&out[2..]).unwrap();
        assert_eq!(json, r#"{"mode":1,"width":20,"height":10}"#);

        let decoded: EngineInfo = decode_json_blob(&mut out.as_slice()).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.grid_mode(), Some(GridMode::Wrapping));
    }
}
