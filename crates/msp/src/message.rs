use bytes::Bytes;

use crate::MspCommand;

/// The third byte of an MSP v2 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<`, sent to the flight controller
    Request,
    /// `>`, sent by the flight controller
    Response,
    /// `!`, the flight controller did not accept the request
    Error,
}

impl Direction {
    pub fn marker(self) -> u8 {
        match self {
            Direction::Request => b'<',
            Direction::Response => b'>',
            Direction::Error => b'!',
        }
    }

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'<' => Some(Direction::Request),
            b'>' => Some(Direction::Response),
            b'!' => Some(Direction::Error),
            _ => None,
        }
    }
}

/// A decoded MSP frame.
///
/// Frames whose CRC does not match are still delivered with `valid` unset;
/// callers must check [`MspMessage::is_ok`] before trusting the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspMessage {
    pub direction: Direction,
    pub command: u16,
    pub len: u16,
    pub valid: bool,
    pub payload: Vec<u8>,
}

impl MspMessage {
    /// A CRC-valid reply (not an error frame).
    pub fn is_ok(&self) -> bool {
        self.valid && self.direction == Direction::Response
    }

    pub fn command(&self) -> Option<MspCommand> {
        MspCommand::from_id(self.command)
    }
}

/// An outgoing MSP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspRequest {
    pub command: u16,
    pub payload: Bytes,
}

impl MspRequest {
    /// A request with no payload, i.e. a query.
    pub fn query(command: MspCommand) -> Self {
        MspRequest {
            command: command.id(),
            payload: Bytes::new(),
        }
    }

    pub fn with_payload(command: MspCommand, payload: impl Into<Bytes>) -> Self {
        MspRequest {
            command: command.id(),
            payload: payload.into(),
        }
    }

    pub fn command(&self) -> Option<MspCommand> {
        MspCommand::from_id(self.command)
    }
}
