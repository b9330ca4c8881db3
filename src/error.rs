//! Error types for the xbee library.

use thiserror::Error;

use crate::protocol::packet::TransmitStatus;
use crate::types::atcommand::ATCommandStatus;
use crate::types::device::OperatingMode;

/// The main error type for XBee operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A command was issued while the device is not in an API mode.
    #[error("invalid operating mode: {0}")]
    InvalidOperatingMode(OperatingMode),

    /// The transport is not open.
    #[error("connection interface not open")]
    InterfaceNotOpen,

    /// No matching response arrived within the receive timeout.
    #[error("timed out after {timeout_ms}ms waiting for a response")]
    Timeout { timeout_ms: u64 },

    /// An AT command response carried a non-OK status.
    #[error("AT command failed: {0}")]
    ATCommand(ATCommandStatus),

    /// A response arrived but did not carry the payload the operation needs.
    #[error("operation not supported: {0}")]
    OperationNotSupported(String),

    /// A transmit status frame reported a non-success delivery.
    #[error("transmit failed: {status:?}")]
    Transmit { status: Option<TransmitStatus> },

    /// An argument precondition failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// All 255 frame IDs are held by live waiters.
    #[error("no free frame IDs")]
    FrameIdExhausted,

    /// The reader observed EOF or a fatal I/O error; pending waiters fail
    /// with this.
    #[error("transport closed")]
    TransportClosed,
}

/// Codec-level errors. These never cross the public API from the reader
/// path; the offending frame is logged and dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The trailing checksum byte did not validate.
    #[error("bad checksum: expected {expected:#04x}, found {found:#04x}")]
    BadChecksum { expected: u8, found: u8 },

    /// The declared length is not usable (zero, or past the maximum).
    #[error("bad frame length: {0}")]
    BadLength(usize),

    /// An escape byte was not followed by an escapable value.
    #[error("bad escape sequence")]
    BadEscape,

    /// A known frame type had fewer payload bytes than its fixed prefix.
    #[error("truncated {frame}: need {needed} bytes, got {got}")]
    Truncated {
        frame: &'static str,
        needed: usize,
        got: usize,
    },
}

/// Result type alias for XBee operations.
pub type Result<T> = std::result::Result<T, Error>;
