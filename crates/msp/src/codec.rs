use std::{fmt, io};

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::*;

use crc::Digest;

use crate::{crc8, Direction, MspMessage, MspRequest};

/// Largest payload the decoder will accept. The length field allows 64 KiB,
/// but nothing the tracker asks for comes close, so a larger length means we
/// locked onto noise.
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// `$`, `X`, direction, flags, command (2), length (2)
const HEADER_LEN: usize = 8;

/// Decoder progress through an MSP v2 frame. Every state after `Flags` has
/// consumed at least one byte that contributes to the running CRC.
#[derive(Debug)]
enum State {
    Idle,
    MarkerX,
    Direction,
    Flags {
        direction: Direction,
    },
    CmdLo {
        direction: Direction,
    },
    CmdHi {
        direction: Direction,
        lo: u8,
    },
    LenLo {
        direction: Direction,
        command: u16,
    },
    LenHi {
        direction: Direction,
        command: u16,
        lo: u8,
    },
    Data {
        direction: Direction,
        command: u16,
        len: u16,
        payload: Vec<u8>,
    },
    Checksum {
        direction: Direction,
        command: u16,
        len: u16,
        payload: Vec<u8>,
    },
}

/// Encodes [`MspRequest`]s and decodes [`MspMessage`]s in the MSP v2 framing
/// `$ X <dir> <flags> <cmd:u16le> <len:u16le> <payload> <crc8>`.
pub struct MspCodec {
    state: State,
    crc: Digest<'static, u8>,
}

impl fmt::Debug for MspCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MspCodec")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl MspCodec {
    pub fn new() -> Self {
        MspCodec {
            state: State::Idle,
            crc: crc8::digest(),
        }
    }

    /// Feeds one byte. Returns a message when the byte completes a frame,
    /// whether or not its CRC matched.
    pub fn push_byte(&mut self, byte: u8) -> Option<MspMessage> {
        let state = std::mem::replace(&mut self.state, State::Idle);

        let (next, message) = match state {
            State::Idle => match byte {
                b'$' => (State::MarkerX, None),
                _ => (State::Idle, None),
            },
            State::MarkerX => match byte {
                b'X' => (State::Direction, None),
                // a repeated start marker begins a new frame
                b'$' => (State::MarkerX, None),
                _ => (State::Idle, None),
            },
            State::Direction => match Direction::from_marker(byte) {
                Some(direction) => (State::Flags { direction }, None),
                None if byte == b'$' => (State::MarkerX, None),
                None => (State::Idle, None),
            },
            State::Flags { direction } => {
                self.crc = crc8::digest();
                self.crc.update(&[byte]);
                (State::CmdLo { direction }, None)
            }
            State::CmdLo { direction } => {
                self.crc.update(&[byte]);
                (State::CmdHi { direction, lo: byte }, None)
            }
            State::CmdHi { direction, lo } => {
                self.crc.update(&[byte]);
                let command = u16::from_le_bytes([lo, byte]);
                (State::LenLo { direction, command }, None)
            }
            State::LenLo { direction, command } => {
                self.crc.update(&[byte]);
                (
                    State::LenHi {
                        direction,
                        command,
                        lo: byte,
                    },
                    None,
                )
            }
            State::LenHi {
                direction,
                command,
                lo,
            } => {
                self.crc.update(&[byte]);
                let len = u16::from_le_bytes([lo, byte]);

                if usize::from(len) > MAX_PAYLOAD_LEN {
                    warn!(
                        "msp frame for command {} declares {} byte payload, discarding",
                        command, len
                    );
                    (State::Idle, None)
                } else if len == 0 {
                    (
                        State::Checksum {
                            direction,
                            command,
                            len,
                            payload: Vec::new(),
                        },
                        None,
                    )
                } else {
                    (
                        State::Data {
                            direction,
                            command,
                            len,
                            payload: Vec::with_capacity(usize::from(len)),
                        },
                        None,
                    )
                }
            }
            State::Data {
                direction,
                command,
                len,
                mut payload,
            } => {
                self.crc.update(&[byte]);
                payload.push(byte);

                if payload.len() == usize::from(len) {
                    (
                        State::Checksum {
                            direction,
                            command,
                            len,
                            payload,
                        },
                        None,
                    )
                } else {
                    (
                        State::Data {
                            direction,
                            command,
                            len,
                            payload,
                        },
                        None,
                    )
                }
            }
            State::Checksum {
                direction,
                command,
                len,
                payload,
            } => {
                let expected = std::mem::replace(&mut self.crc, crc8::digest()).finalize();
                let valid = byte == expected;
                if !valid {
                    debug!(
                        "crc mismatch on msp command {} (got {:#04x}, expected {:#04x})",
                        command, byte, expected
                    );
                }

                let message = MspMessage {
                    direction,
                    command,
                    len,
                    valid,
                    payload,
                };

                (State::Idle, Some(message))
            }
        };

        self.state = next;
        message
    }
}

impl Default for MspCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one complete frame to `dst`.
pub fn encode_frame(
    direction: Direction,
    command: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> io::Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("msp payload too large ({} bytes)", payload.len()),
        )
    })?;

    dst.reserve(HEADER_LEN + payload.len() + 1);
    dst.put_u8(b'$');
    dst.put_u8(b'X');
    dst.put_u8(direction.marker());

    let start = dst.len();
    dst.put_u8(0); // flags
    dst.put_u16_le(command);
    dst.put_u16_le(len);
    dst.put_slice(payload);

    let crc = crc8::checksum(&dst[start..]);
    dst.put_u8(crc);

    Ok(())
}

impl Encoder<MspRequest> for MspCodec {
    type Error = io::Error;

    fn encode(&mut self, item: MspRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        trace!("encoding msp request {} ({} bytes)", item.command, item.payload.len());
        encode_frame(Direction::Request, item.command, &item.payload, dst)
    }
}

impl Decoder for MspCodec {
    type Item = MspMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            if let Some(message) = self.push_byte(src.get_u8()) {
                return Ok(Some(message));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MspCommand;
    use futures::{SinkExt, StreamExt};
    use proptest::prelude::*;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::Framed;

    fn frame(direction: Direction, command: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(direction, command, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn decode_all(codec: &mut MspCodec, bytes: &[u8]) -> Vec<MspMessage> {
        bytes.iter().filter_map(|&b| codec.push_byte(b)).collect()
    }

    #[test]
    fn encodes_variant_query() {
        let mut buf = BytesMut::new();
        MspCodec::new()
            .encode(MspRequest::query(MspCommand::FcVariant), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], b"$X<\x00\x02\x00\x00\x00\x8a");
    }

    #[test]
    fn zero_length_frame() {
        let mut codec = MspCodec::new();
        let messages = decode_all(&mut codec, &frame(Direction::Response, 209, &[]));

        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_ok());
        assert_eq!(messages[0].len, 0);
        assert!(messages[0].payload.is_empty());
    }

    #[test]
    fn error_frames_are_not_ok() {
        let mut codec = MspCodec::new();
        let messages = decode_all(&mut codec, &frame(Direction::Error, 0x2010, &[]));

        assert_eq!(messages.len(), 1);
        assert!(messages[0].valid);
        assert_eq!(messages[0].direction, Direction::Error);
        assert!(!messages[0].is_ok());
    }

    #[test]
    fn skips_leading_garbage() {
        let mut codec = MspCodec::new();
        let mut bytes = b"\x00\xff$M<X$X?junk".to_vec();
        bytes.extend(frame(Direction::Response, 2, b"INAV"));

        let messages = decode_all(&mut codec, &bytes);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, b"INAV");
    }

    #[test]
    fn recovers_from_spurious_start_marker() {
        let mut codec = MspCodec::new();

        let mut bytes = frame(Direction::Response, 3, &[6, 6, 6]);
        bytes.push(b'$');
        bytes.extend(frame(Direction::Response, 10, b"X"));

        let messages = decode_all(&mut codec, &bytes);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].command, 10);
        assert_eq!(messages[1].payload, b"X");
        assert!(messages[1].is_ok());
    }

    #[test]
    fn oversized_length_is_discarded() {
        let mut codec = MspCodec::new();

        // header claiming a 0xffff byte payload
        let mut bytes = b"$X>\x00\x6a\x00\xff\xff".to_vec();
        bytes.extend(frame(Direction::Response, 121, &[1, 0, 0, 0, 0, 0, 0]));

        let messages = decode_all(&mut codec, &bytes);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].command, 121);
    }

    #[test]
    fn payload_too_large_to_encode() {
        let mut buf = BytesMut::new();
        let err = encode_frame(Direction::Request, 1, &vec![0; 70_000], &mut buf).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn request_and_reply_over_a_stream() {
        let (ours, mut theirs) = tokio::io::duplex(256);
        let mut framed = Framed::new(ours, MspCodec::new());

        framed
            .send(MspRequest::query(MspCommand::FcVariant))
            .await
            .unwrap();

        let mut fc = Framed::new(&mut theirs, MspCodec::new());
        let request = fc.next().await.unwrap().unwrap();
        assert_eq!(request.direction, Direction::Request);
        assert_eq!(request.command(), Some(MspCommand::FcVariant));
        drop(fc);

        theirs
            .write_all(&frame(Direction::Response, 2, b"INAV"))
            .await
            .unwrap();

        let reply = framed.next().await.unwrap().unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.payload, b"INAV");
    }

    proptest! {
        #[test]
        fn round_trip(command in any::<u16>(), payload in prop::collection::vec(any::<u8>(), 0..300)) {
            let mut codec = MspCodec::new();
            let mut buf = BytesMut::new();
            codec
                .encode(MspRequest { command, payload: payload.clone().into() }, &mut buf)
                .unwrap();

            let message = codec.decode(&mut buf).unwrap().expect("a complete frame");

            prop_assert!(message.valid);
            prop_assert_eq!(message.direction, Direction::Request);
            prop_assert_eq!(message.command, command);
            prop_assert_eq!(usize::from(message.len), payload.len());
            prop_assert_eq!(message.payload, payload);
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn corrupted_payload_is_flagged(
            command in any::<u16>(),
            payload in prop::collection::vec(any::<u8>(), 1..300),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut bytes = frame(Direction::Response, command, &payload);
            let position = HEADER_LEN + index.index(payload.len());
            bytes[position] ^= flip;

            let mut codec = MspCodec::new();
            let messages = decode_all(&mut codec, &bytes);

            prop_assert_eq!(messages.len(), 1);
            prop_assert!(!messages[0].valid);
            prop_assert_eq!(messages[0].command, command);
            prop_assert_eq!(usize::from(messages[0].len), payload.len());
        }
    }
}
