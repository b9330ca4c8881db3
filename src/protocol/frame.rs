//! Wire codec for API frames.
//!
//! The on-wire format is:
//!
//! ```text
//! ┌──────────┬───────────────┬──────────┬─────────────┬──────────┐
//! │  0x7E    │  length (BE)  │   type   │   payload   │  cksum   │
//! │  1 byte  │   2 bytes     │  1 byte  │             │  1 byte  │
//! └──────────┴───────────────┴──────────┴─────────────┴──────────┘
//! ```
//!
//! The length counts the type byte plus the payload; the checksum covers
//! the same region. In escaped mode every byte after the start delimiter
//! whose value is in the escape set is replaced by `0x7D, byte ^ 0x20`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::checksum::Checksum;
use crate::protocol::packet::XBeeApiFrame;

/// Start-of-frame delimiter.
pub const START_DELIMITER: u8 = 0x7E;
/// Escape marker byte.
pub const ESCAPE_BYTE: u8 = 0x7D;
/// XON flow-control byte, escaped on the wire.
pub const XON: u8 = 0x11;
/// XOFF flow-control byte, escaped on the wire.
pub const XOFF: u8 = 0x13;
/// XOR applied to an escaped byte.
const ESCAPE_XOR: u8 = 0x20;

/// Maximum length of the type byte plus payload; the length field is 16
/// bits wide.
pub const MAX_FRAME_SIZE: usize = 0xFFFF;

const fn needs_escape(byte: u8) -> bool {
    matches!(byte, START_DELIMITER | ESCAPE_BYTE | XON | XOFF)
}

/// Encodes a frame for the wire.
#[must_use]
pub fn encode(frame: &XBeeApiFrame, escaped: bool) -> Bytes {
    encode_body(&frame.body(), escaped)
}

/// Encodes a checksum-covered body (type byte + payload) for the wire.
///
/// # Panics
///
/// Panics if the body exceeds [`MAX_FRAME_SIZE`].
#[must_use]
pub fn encode_body(body: &[u8], escaped: bool) -> Bytes {
    assert!(
        body.len() <= MAX_FRAME_SIZE,
        "frame body exceeds the 16-bit length field"
    );
    let mut cksum = Checksum::new();
    cksum.add_all(body);

    let mut buf = BytesMut::with_capacity(body.len() + 5);
    buf.put_u8(START_DELIMITER);
    let put = |buf: &mut BytesMut, byte: u8| {
        if escaped && needs_escape(byte) {
            buf.put_u8(ESCAPE_BYTE);
            buf.put_u8(byte ^ ESCAPE_XOR);
        } else {
            buf.put_u8(byte);
        }
    };
    // The length field counts the unescaped body bytes.
    let len = (body.len() as u16).to_be_bytes();
    put(&mut buf, len[0]);
    put(&mut buf, len[1]);
    for &b in body {
        put(&mut buf, b);
    }
    put(&mut buf, cksum.generate());
    buf.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    WaitDelim,
    LenHi,
    LenLo,
    Body,
    Cksum,
}

/// Resumable frame decoder.
///
/// Bytes are pushed in with [`FrameDecoder::feed`] and complete frames are
/// pulled out with [`FrameDecoder::decode`]. A decode error drops only the
/// frame in flight; the decoder re-synchronizes and keeps consuming.
#[derive(Debug)]
pub struct FrameDecoder {
    escaped: bool,
    input: BytesMut,
    state: DecodeState,
    escape_next: bool,
    length: usize,
    body: BytesMut,
    cksum: Checksum,
}

impl FrameDecoder {
    /// Creates a decoder for the given escape mode.
    #[must_use]
    pub fn new(escaped: bool) -> Self {
        Self {
            escaped,
            input: BytesMut::new(),
            state: DecodeState::WaitDelim,
            escape_next: false,
            length: 0,
            body: BytesMut::new(),
            cksum: Checksum::new(),
        }
    }

    /// Switches the escape mode. Takes effect on the next byte consumed.
    pub fn set_escaped(&mut self, escaped: bool) {
        self.escaped = escaped;
    }

    /// Appends received bytes to the decode buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
    }

    /// Number of bytes waiting in the decode buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.input.len()
    }

    /// Drops all buffered input and any frame in flight.
    pub fn clear(&mut self) {
        self.input.clear();
        self.restart();
    }

    fn restart(&mut self) {
        self.state = DecodeState::WaitDelim;
        self.escape_next = false;
        self.length = 0;
        self.body.clear();
        self.cksum.reset();
    }

    /// Begins a new frame at a delimiter that arrived mid-frame.
    fn resync(&mut self) {
        tracing::trace!("re-synchronizing on start delimiter");
        self.restart();
        self.state = DecodeState::LenHi;
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(frame))` for a complete frame, `Ok(None)` when more
    /// bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] when the frame in flight is dropped
    /// (checksum mismatch, zero length, bad escape, or a truncated known
    /// type). The decoder stays usable; call again to keep consuming.
    pub fn decode(&mut self) -> Result<Option<XBeeApiFrame>, FrameError> {
        while self.input.has_remaining() {
            let raw = self.input.get_u8();

            // Escape handling applies to every byte after the delimiter.
            let byte = if self.escaped && self.state != DecodeState::WaitDelim {
                if self.escape_next {
                    self.escape_next = false;
                    if raw == START_DELIMITER {
                        // A delimiter can never be escaped; restart there.
                        self.resync();
                        return Err(FrameError::BadEscape);
                    }
                    raw ^ ESCAPE_XOR
                } else if raw == ESCAPE_BYTE {
                    self.escape_next = true;
                    continue;
                } else if raw == START_DELIMITER {
                    // Raw delimiter mid-frame: the frame in flight is dead.
                    self.resync();
                    continue;
                } else {
                    raw
                }
            } else {
                raw
            };

            match self.state {
                DecodeState::WaitDelim => {
                    if byte == START_DELIMITER {
                        self.state = DecodeState::LenHi;
                    }
                }
                DecodeState::LenHi => {
                    self.length = usize::from(byte) << 8;
                    self.state = DecodeState::LenLo;
                }
                DecodeState::LenLo => {
                    self.length |= usize::from(byte);
                    if self.length == 0 {
                        self.restart();
                        return Err(FrameError::BadLength(0));
                    }
                    self.body.reserve(self.length);
                    self.state = DecodeState::Body;
                }
                DecodeState::Body => {
                    self.body.put_u8(byte);
                    self.cksum.add(byte);
                    if self.body.len() == self.length {
                        self.state = DecodeState::Cksum;
                    }
                }
                DecodeState::Cksum => {
                    self.cksum.add(byte);
                    let valid = self.cksum.validate();
                    let body = self.body.split().freeze();
                    let expected = {
                        let mut c = Checksum::new();
                        c.add_all(&body);
                        c.generate()
                    };
                    self.restart();
                    if !valid {
                        return Err(FrameError::BadChecksum {
                            expected,
                            found: byte,
                        });
                    }
                    return XBeeApiFrame::decode(&body).map(Some);
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{ATCommandFrame, NO_FRAME_ID};

    fn at_ni_request() -> XBeeApiFrame {
        XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: 0x01,
            command: *b"NI",
            parameter: None,
        })
    }

    #[test]
    fn test_encode_at_ni_plain() {
        let wire = encode(&at_ni_request(), false);
        assert_eq!(wire.as_ref(), &[0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]);
    }

    #[test]
    fn test_encode_at_ni_escaped_no_escapes_needed() {
        let wire = encode(&at_ni_request(), true);
        assert_eq!(wire.as_ref(), &[0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]);
    }

    #[test]
    fn test_encode_escapable_payload() {
        let frame = XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: 0x01,
            command: *b"NI",
            parameter: Some(Bytes::from_static(&[0x11])),
        });
        let plain = encode(&frame, false);
        assert_eq!(
            plain.as_ref(),
            &[0x7E, 0x00, 0x05, 0x08, 0x01, 0x4E, 0x49, 0x11, 0x4E]
        );
        let escaped = encode(&frame, true);
        assert_eq!(
            escaped.as_ref(),
            &[0x7E, 0x00, 0x05, 0x08, 0x01, 0x4E, 0x49, 0x7D, 0x31, 0x4E]
        );
    }

    #[test]
    fn test_escaped_checksum_byte() {
        // Body sums to 0xEE, so the checksum byte is XON and must be
        // escaped on the wire.
        let frame = XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: 0x01,
            command: *b"AP",
            parameter: Some(Bytes::from_static(&[0x54])),
        });
        let escaped = encode(&frame, true);
        assert_eq!(&escaped[escaped.len() - 2..], &[0x7D, 0x31]);

        let mut decoder = FrameDecoder::new(true);
        decoder.feed(&escaped);
        assert_eq!(decoder.decode().unwrap(), Some(frame));
    }

    #[test]
    fn test_decode_roundtrip_both_modes() {
        let frames = [
            at_ni_request(),
            XBeeApiFrame::ATCommand(ATCommandFrame {
                frame_id: 0x7D,
                command: *b"D0",
                parameter: Some(Bytes::from_static(&[0x7E, 0x7D, 0x11, 0x13, 0x42])),
            }),
        ];
        for escaped in [false, true] {
            // Plain mode cannot carry a raw delimiter inside the body.
            for frame in frames.iter().filter(|f| {
                escaped || !f.body().contains(&START_DELIMITER)
            }) {
                let mut decoder = FrameDecoder::new(escaped);
                decoder.feed(&encode(frame, escaped));
                assert_eq!(decoder.decode().unwrap().as_ref(), Some(frame));
                assert_eq!(decoder.decode().unwrap(), None);
            }
        }
    }

    #[test]
    fn test_decode_bad_checksum_then_recovers() {
        let mut decoder = FrameDecoder::new(false);
        decoder.feed(&[0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x60]);
        assert_eq!(
            decoder.decode(),
            Err(FrameError::BadChecksum {
                expected: 0x5F,
                found: 0x60,
            })
        );
        // The decoder is back in delimiter hunt; a good frame decodes.
        decoder.feed(&encode(&at_ni_request(), false));
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
    }

    #[test]
    fn test_decode_zero_length() {
        let mut decoder = FrameDecoder::new(false);
        decoder.feed(&[0x7E, 0x00, 0x00, 0xFF]);
        assert_eq!(decoder.decode(), Err(FrameError::BadLength(0)));
    }

    #[test]
    fn test_decode_skips_leading_noise() {
        let mut decoder = FrameDecoder::new(false);
        let mut stream = vec![0x00, 0x42, 0x13, 0x37];
        stream.extend_from_slice(&encode(&at_ni_request(), false));
        decoder.feed(&stream);
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
    }

    #[test]
    fn test_escaped_mode_resync_on_raw_delimiter() {
        // A frame dies mid-body; the next delimiter starts a new frame.
        let mut decoder = FrameDecoder::new(true);
        let mut stream = vec![0x7E, 0x00, 0x08, 0x08, 0x01];
        stream.extend_from_slice(&encode(&at_ni_request(), true));
        decoder.feed(&stream);
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
    }

    #[test]
    fn test_escape_of_delimiter_is_rejected() {
        let mut decoder = FrameDecoder::new(true);
        decoder.feed(&[0x7E, 0x00, 0x7D, 0x7E]);
        assert_eq!(decoder.decode(), Err(FrameError::BadEscape));
        // Framing restarted at the trailing delimiter.
        decoder.feed(&encode(&at_ni_request(), true)[1..]);
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
    }

    #[test]
    fn test_decode_incremental_feed() {
        let wire = encode(&at_ni_request(), false);
        let mut decoder = FrameDecoder::new(false);
        for chunk in wire.chunks(3) {
            decoder.feed(chunk);
        }
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
    }

    #[test]
    fn test_decode_multiple_frames_one_feed() {
        let mut decoder = FrameDecoder::new(false);
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(&at_ni_request(), false));
        stream.extend_from_slice(&encode(&at_ni_request(), false));
        decoder.feed(&stream);
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
        assert_eq!(decoder.decode().unwrap(), Some(at_ni_request()));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_unknown_frame_type_decodes_opaque() {
        let mut decoder = FrameDecoder::new(false);
        decoder.feed(&encode_body(&[0x3E, 0xAA], false));
        let frame = decoder.decode().unwrap().unwrap();
        assert!(matches!(frame, XBeeApiFrame::Opaque { frame_type: 0x3E, .. }));
    }

    #[test]
    fn test_escaped_length_field() {
        // A 17-byte body forces the length low byte to XON.
        let mut payload = vec![0u8; 13];
        payload[0] = 0x05;
        let frame = XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: NO_FRAME_ID,
            command: *b"NI",
            parameter: Some(Bytes::from(payload)),
        });
        assert_eq!(frame.body().len(), 0x11);
        let wire = encode(&frame, true);
        assert_eq!(&wire[1..4], &[0x00, 0x7D, 0x31]);

        let mut decoder = FrameDecoder::new(true);
        decoder.feed(&wire);
        assert_eq!(decoder.decode().unwrap(), Some(frame));
    }
}
