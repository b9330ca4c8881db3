//! API frame types and their payload layouts.
//!
//! Every known frame type decodes to a variant of [`XBeeApiFrame`]; frame
//! types outside the registry decode to [`XBeeApiFrame::Opaque`] so an
//! unrecognized frame never aborts the stream.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::types::address::{XBee16BitAddress, XBee64BitAddress};
use crate::types::atcommand::ATCommandStatus;

/// Frame ID value meaning "no response expected".
pub const NO_FRAME_ID: u8 = 0x00;

/// Registry of known API frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// 802.15.4 transmit request, 64-bit addressing.
    Tx64 = 0x00,
    /// 802.15.4 transmit request, 16-bit addressing.
    Tx16 = 0x01,
    /// Local AT command request.
    ATCommand = 0x08,
    /// ZigBee/DigiMesh transmit request.
    TransmitRequest = 0x10,
    /// Remote AT command request.
    RemoteATCommandRequest = 0x17,
    /// 802.15.4 IO sample, 64-bit source address.
    Rx64IO = 0x82,
    /// 802.15.4 IO sample, 16-bit source address.
    Rx16IO = 0x83,
    /// Local AT command response.
    ATCommandResponse = 0x88,
    /// 802.15.4 transmit status.
    TxStatus = 0x89,
    /// Unsolicited modem status.
    ModemStatus = 0x8A,
    /// ZigBee/DigiMesh transmit status.
    TransmitStatus = 0x8B,
    /// ZigBee/DigiMesh IO sample indicator.
    IODataSampleRxIndicator = 0x92,
    /// Remote AT command response.
    RemoteATCommandResponse = 0x97,
}

impl FrameType {
    /// Maps a frame-type byte to a registry entry.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Tx64),
            0x01 => Some(Self::Tx16),
            0x08 => Some(Self::ATCommand),
            0x10 => Some(Self::TransmitRequest),
            0x17 => Some(Self::RemoteATCommandRequest),
            0x82 => Some(Self::Rx64IO),
            0x83 => Some(Self::Rx16IO),
            0x88 => Some(Self::ATCommandResponse),
            0x89 => Some(Self::TxStatus),
            0x8A => Some(Self::ModemStatus),
            0x8B => Some(Self::TransmitStatus),
            0x92 => Some(Self::IODataSampleRxIndicator),
            0x97 => Some(Self::RemoteATCommandResponse),

            _ => None,
        }
    }

    /// True exactly for request frames that elicit a status or response
    /// and therefore must carry a non-zero frame ID.
    #[must_use]
    pub const fn needs_frame_id(&self) -> bool {
        matches!(
            self,
            Self::Tx64
                | Self::Tx16
                | Self::ATCommand
                | Self::TransmitRequest
                | Self::RemoteATCommandRequest
        )
    }
}

/// Delivery status carried by transmit-status frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStatus {
    /// Delivered.
    Success,
    /// No MAC acknowledgement.
    NoAck,
    /// Clear channel assessment failed.
    CcaFailure,
    /// Packet was purged.
    Purged,
    /// Destination address is invalid.
    InvalidDestination,
    /// No network acknowledgement.
    NetworkAckFailure,
    /// Module is not joined to a network.
    NotJoined,
    /// Destination is the local module.
    SelfAddressed,
    /// Address lookup failed.
    AddressNotFound,
    /// Route discovery failed.
    RouteNotFound,
    /// Payload exceeds the maximum RF payload.
    PayloadTooLarge,
    /// Status byte outside the documented set.
    Unknown(u8),
}

impl TransmitStatus {
    /// Maps a raw delivery-status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0x01 => Self::NoAck,
            0x02 => Self::CcaFailure,
            0x03 => Self::Purged,
            0x15 => Self::InvalidDestination,
            0x21 => Self::NetworkAckFailure,
            0x22 => Self::NotJoined,
            0x23 => Self::SelfAddressed,
            0x24 => Self::AddressNotFound,
            0x25 => Self::RouteNotFound,
            0x74 => Self::PayloadTooLarge,
            other => Self::Unknown(other),
        }
    }

    /// The raw status byte.
    #[must_use]
    pub const fn byte(&self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::NoAck => 0x01,
            Self::CcaFailure => 0x02,
            Self::Purged => 0x03,
            Self::InvalidDestination => 0x15,
            Self::NetworkAckFailure => 0x21,
            Self::NotJoined => 0x22,
            Self::SelfAddressed => 0x23,
            Self::AddressNotFound => 0x24,
            Self::RouteNotFound => 0x25,
            Self::PayloadTooLarge => 0x74,
            Self::Unknown(b) => *b,
        }
    }
}

/// Unsolicited modem status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemStatus {
    /// Module was reset by hardware.
    HardwareReset,
    /// Module was reset by the watchdog timer.
    WatchdogTimerReset,
    /// Joined a network.
    JoinedNetwork,
    /// Disassociated from the network.
    Disassociated,
    /// Coordinator realignment received.
    CoordinatorRealignment,
    /// Coordinator started.
    CoordinatorStarted,
    /// Status byte outside the documented set.
    Unknown(u8),
}

impl ModemStatus {
    /// Maps a raw modem-status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::HardwareReset,
            0x01 => Self::WatchdogTimerReset,
            0x02 => Self::JoinedNetwork,
            0x03 => Self::Disassociated,
            0x05 => Self::CoordinatorRealignment,
            0x06 => Self::CoordinatorStarted,
            other => Self::Unknown(other),
        }
    }

    /// The raw status byte.
    #[must_use]
    pub const fn byte(&self) -> u8 {
        match self {
            Self::HardwareReset => 0x00,
            Self::WatchdogTimerReset => 0x01,
            Self::JoinedNetwork => 0x02,
            Self::Disassociated => 0x03,
            Self::CoordinatorRealignment => 0x05,
            Self::CoordinatorStarted => 0x06,
            Self::Unknown(b) => *b,
        }
    }

    /// True for the two statuses announcing a completed module reset.
    #[must_use]
    pub const fn is_reset(&self) -> bool {
        matches!(self, Self::HardwareReset | Self::WatchdogTimerReset)
    }
}

/// Local AT command request (0x08).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ATCommandFrame {
    /// Correlation ID; 0 means no response expected.
    pub frame_id: u8,
    /// Two-letter mnemonic.
    pub command: [u8; 2],
    /// Parameter to write, absent for reads/executes.
    pub parameter: Option<Bytes>,
}

/// Local AT command response (0x88).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ATCommandResponseFrame {
    /// Correlation ID echoed from the request.
    pub frame_id: u8,
    /// Two-letter mnemonic echoed from the request.
    pub command: [u8; 2],
    /// Command status.
    pub status: ATCommandStatus,
    /// Returned value, absent for writes/executes.
    pub value: Option<Bytes>,
}

/// Remote AT command request (0x17).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteATCommandFrame {
    /// Correlation ID.
    pub frame_id: u8,
    /// 64-bit destination.
    pub dest64: XBee64BitAddress,
    /// 16-bit destination, usually unknown.
    pub dest16: XBee16BitAddress,
    /// Transmit options (0x02 applies changes immediately).
    pub options: u8,
    /// Two-letter mnemonic.
    pub command: [u8; 2],
    /// Parameter to write, absent for reads/executes.
    pub parameter: Option<Bytes>,
}

/// Remote AT command response (0x97).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteATCommandResponseFrame {
    /// Correlation ID echoed from the request.
    pub frame_id: u8,
    /// 64-bit address of the responder.
    pub addr64: XBee64BitAddress,
    /// 16-bit address of the responder.
    pub addr16: XBee16BitAddress,
    /// Two-letter mnemonic echoed from the request.
    pub command: [u8; 2],
    /// Command status.
    pub status: ATCommandStatus,
    /// Returned value, absent for writes/executes.
    pub value: Option<Bytes>,
}

/// ZigBee/DigiMesh transmit request (0x10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequestFrame {
    /// Correlation ID.
    pub frame_id: u8,
    /// 64-bit destination.
    pub dest64: XBee64BitAddress,
    /// 16-bit destination, unknown to force discovery.
    pub dest16: XBee16BitAddress,
    /// Maximum hop count, 0 for the network default.
    pub broadcast_radius: u8,
    /// Transmit options.
    pub options: u8,
    /// RF payload.
    pub payload: Bytes,
}

/// 802.15.4 transmit request with 64-bit addressing (0x00).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx64Frame {
    /// Correlation ID.
    pub frame_id: u8,
    /// 64-bit destination.
    pub dest64: XBee64BitAddress,
    /// Transmit options.
    pub options: u8,
    /// RF payload.
    pub payload: Bytes,
}

/// 802.15.4 transmit request with 16-bit addressing (0x01).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx16Frame {
    /// Correlation ID.
    pub frame_id: u8,
    /// 16-bit destination.
    pub dest16: XBee16BitAddress,
    /// Transmit options.
    pub options: u8,
    /// RF payload.
    pub payload: Bytes,
}

/// ZigBee/DigiMesh transmit status (0x8B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitStatusFrame {
    /// Correlation ID echoed from the request.
    pub frame_id: u8,
    /// 16-bit address the packet was delivered to.
    pub dest16: XBee16BitAddress,
    /// Number of application retries.
    pub retry_count: u8,
    /// Delivery result.
    pub delivery_status: TransmitStatus,
    /// Route discovery result.
    pub discovery_status: u8,
}

/// 802.15.4 transmit status (0x89).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatusFrame {
    /// Correlation ID echoed from the request.
    pub frame_id: u8,
    /// Delivery result.
    pub status: TransmitStatus,
}

/// Unsolicited modem status (0x8A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemStatusFrame {
    /// Reported status.
    pub status: ModemStatus,
}

/// ZigBee/DigiMesh IO sample indicator (0x92).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IODataSampleRxFrame {
    /// 64-bit source address.
    pub addr64: XBee64BitAddress,
    /// 16-bit source address.
    pub addr16: XBee16BitAddress,
    /// Receive options.
    pub receive_options: u8,
    /// Raw sample payload, decoded by `IOSample::decode`.
    pub data: Bytes,
}

/// 802.15.4 IO sample with 64-bit source address (0x82).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rx64IOFrame {
    /// 64-bit source address.
    pub addr64: XBee64BitAddress,
    /// Received signal strength, in -dBm.
    pub rssi: u8,
    /// Receive options.
    pub options: u8,
    /// Raw sample payload, decoded by `IOSample::decode_raw_802`.
    pub data: Bytes,
}

/// 802.15.4 IO sample with 16-bit source address (0x83).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rx16IOFrame {
    /// 16-bit source address.
    pub addr16: XBee16BitAddress,
    /// Received signal strength, in -dBm.
    pub rssi: u8,
    /// Receive options.
    pub options: u8,
    /// Raw sample payload, decoded by `IOSample::decode_raw_802`.
    pub data: Bytes,
}

/// A decoded API frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XBeeApiFrame {
    /// Local AT command request.
    ATCommand(ATCommandFrame),
    /// Local AT command response.
    ATCommandResponse(ATCommandResponseFrame),
    /// Remote AT command request.
    RemoteATCommand(RemoteATCommandFrame),
    /// Remote AT command response.
    RemoteATCommandResponse(RemoteATCommandResponseFrame),
    /// ZigBee/DigiMesh transmit request.
    TransmitRequest(TransmitRequestFrame),
    /// 802.15.4 transmit request, 64-bit addressing.
    Tx64(Tx64Frame),
    /// 802.15.4 transmit request, 16-bit addressing.
    Tx16(Tx16Frame),
    /// ZigBee/DigiMesh transmit status.
    TransmitStatus(TransmitStatusFrame),
    /// 802.15.4 transmit status.
    TxStatus(TxStatusFrame),
    /// Unsolicited modem status.
    ModemStatus(ModemStatusFrame),
    /// ZigBee/DigiMesh IO sample.
    IODataSampleRx(IODataSampleRxFrame),
    /// 802.15.4 IO sample, 64-bit source.
    Rx64IO(Rx64IOFrame),
    /// 802.15.4 IO sample, 16-bit source.
    Rx16IO(Rx16IOFrame),
    /// Frame type outside the registry; payload kept verbatim.
    Opaque {
        /// Raw frame-type byte.
        frame_type: u8,
        /// Everything after the type byte.
        payload: Bytes,
    },
}

impl XBeeApiFrame {
    /// The frame-type byte.
    #[must_use]
    pub fn frame_type_byte(&self) -> u8 {
        match self {
            Self::ATCommand(_) => FrameType::ATCommand as u8,
            Self::ATCommandResponse(_) => FrameType::ATCommandResponse as u8,
            Self::RemoteATCommand(_) => FrameType::RemoteATCommandRequest as u8,
            Self::RemoteATCommandResponse(_) => FrameType::RemoteATCommandResponse as u8,
            Self::TransmitRequest(_) => FrameType::TransmitRequest as u8,
            Self::Tx64(_) => FrameType::Tx64 as u8,
            Self::Tx16(_) => FrameType::Tx16 as u8,
            Self::TransmitStatus(_) => FrameType::TransmitStatus as u8,
            Self::TxStatus(_) => FrameType::TxStatus as u8,
            Self::ModemStatus(_) => FrameType::ModemStatus as u8,
            Self::IODataSampleRx(_) => FrameType::IODataSampleRxIndicator as u8,
            Self::Rx64IO(_) => FrameType::Rx64IO as u8,
            Self::Rx16IO(_) => FrameType::Rx16IO as u8,
            Self::Opaque { frame_type, .. } => *frame_type,
        }
    }

    /// The registry entry, when the type is known.
    #[must_use]
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type_byte())
    }

    /// True when this frame must carry a non-zero frame ID before sending.
    #[must_use]
    pub fn needs_frame_id(&self) -> bool {
        self.frame_type().is_some_and(|t| t.needs_frame_id())
    }

    /// The frame ID, for variants that carry one.
    #[must_use]
    pub fn frame_id(&self) -> Option<u8> {
        match self {
            Self::ATCommand(f) => Some(f.frame_id),
            Self::ATCommandResponse(f) => Some(f.frame_id),
            Self::RemoteATCommand(f) => Some(f.frame_id),
            Self::RemoteATCommandResponse(f) => Some(f.frame_id),
            Self::TransmitRequest(f) => Some(f.frame_id),
            Self::Tx64(f) => Some(f.frame_id),
            Self::Tx16(f) => Some(f.frame_id),
            Self::TransmitStatus(f) => Some(f.frame_id),
            Self::TxStatus(f) => Some(f.frame_id),
            Self::ModemStatus(_)
            | Self::IODataSampleRx(_)
            | Self::Rx64IO(_)
            | Self::Rx16IO(_)
            | Self::Opaque { .. } => None,
        }
    }

    /// Sets the frame ID on variants that carry one; a no-op elsewhere.
    pub fn set_frame_id(&mut self, id: u8) {
        match self {
            Self::ATCommand(f) => f.frame_id = id,
            Self::ATCommandResponse(f) => f.frame_id = id,
            Self::RemoteATCommand(f) => f.frame_id = id,
            Self::RemoteATCommandResponse(f) => f.frame_id = id,
            Self::TransmitRequest(f) => f.frame_id = id,
            Self::Tx64(f) => f.frame_id = id,
            Self::Tx16(f) => f.frame_id = id,
            Self::TransmitStatus(f) => f.frame_id = id,
            Self::TxStatus(f) => f.frame_id = id,
            Self::ModemStatus(_)
            | Self::IODataSampleRx(_)
            | Self::Rx64IO(_)
            | Self::Rx16IO(_)
            | Self::Opaque { .. } => {}
        }
    }

    /// Serializes the checksum-covered region: the frame-type byte followed
    /// by the frame-specific fields.
    #[must_use]
    pub fn body(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.frame_type_byte());
        match self {
            Self::ATCommand(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.command);
                if let Some(p) = &f.parameter {
                    buf.put_slice(p);
                }
            }
            Self::ATCommandResponse(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.command);
                buf.put_u8(f.status as u8);
                if let Some(v) = &f.value {
                    buf.put_slice(v);
                }
            }
            Self::RemoteATCommand(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.dest64.bytes());
                buf.put_slice(&f.dest16.bytes());
                buf.put_u8(f.options);
                buf.put_slice(&f.command);
                if let Some(p) = &f.parameter {
                    buf.put_slice(p);
                }
            }
            Self::RemoteATCommandResponse(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.addr64.bytes());
                buf.put_slice(&f.addr16.bytes());
                buf.put_slice(&f.command);
                buf.put_u8(f.status as u8);
                if let Some(v) = &f.value {
                    buf.put_slice(v);
                }
            }
            Self::TransmitRequest(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.dest64.bytes());
                buf.put_slice(&f.dest16.bytes());
                buf.put_u8(f.broadcast_radius);
                buf.put_u8(f.options);
                buf.put_slice(&f.payload);
            }
            Self::Tx64(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.dest64.bytes());
                buf.put_u8(f.options);
                buf.put_slice(&f.payload);
            }
            Self::Tx16(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.dest16.bytes());
                buf.put_u8(f.options);
                buf.put_slice(&f.payload);
            }
            Self::TransmitStatus(f) => {
                buf.put_u8(f.frame_id);
                buf.put_slice(&f.dest16.bytes());
                buf.put_u8(f.retry_count);
                buf.put_u8(f.delivery_status.byte());
                buf.put_u8(f.discovery_status);
            }
            Self::TxStatus(f) => {
                buf.put_u8(f.frame_id);
                buf.put_u8(f.status.byte());
            }
            Self::ModemStatus(f) => {
                buf.put_u8(f.status.byte());
            }
            Self::IODataSampleRx(f) => {
                buf.put_slice(&f.addr64.bytes());
                buf.put_slice(&f.addr16.bytes());
                buf.put_u8(f.receive_options);
                buf.put_slice(&f.data);
            }
            Self::Rx64IO(f) => {
                buf.put_slice(&f.addr64.bytes());
                buf.put_u8(f.rssi);
                buf.put_u8(f.options);
                buf.put_slice(&f.data);
            }
            Self::Rx16IO(f) => {
                buf.put_slice(&f.addr16.bytes());
                buf.put_u8(f.rssi);
                buf.put_u8(f.options);
                buf.put_slice(&f.data);
            }
            Self::Opaque { payload, .. } => {
                buf.put_slice(payload);
            }
        }
        buf.freeze()
    }

    /// Parses a checksum-validated body (frame-type byte first) into a
    /// typed frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] when a known frame type is shorter
    /// than its fixed prefix. Unknown types never fail; they come back as
    /// [`XBeeApiFrame::Opaque`].
    pub fn decode(body: &[u8]) -> Result<Self, FrameError> {
        let (type_byte, rest) = body
            .split_first()
            .ok_or(FrameError::BadLength(0))?;

        let Some(frame_type) = FrameType::from_byte(*type_byte) else {
            return Ok(Self::Opaque {
                frame_type: *type_byte,
                payload: Bytes::copy_from_slice(rest),
            });
        };

        let need = |needed: usize, name: &'static str| -> Result<(), FrameError> {
            if rest.len() < needed {
                Err(FrameError::Truncated {
                    frame: name,
                    needed,
                    got: rest.len(),
                })
            } else {
                Ok(())
            }
        };
        let tail = |from: usize| -> Option<Bytes> {
            if rest.len() > from {
                Some(Bytes::copy_from_slice(&rest[from..]))
            } else {
                None
            }
        };

        let frame = match frame_type {
            FrameType::ATCommand => {
                need(3, "AT command")?;
                Self::ATCommand(ATCommandFrame {
                    frame_id: rest[0],
                    command: [rest[1], rest[2]],
                    parameter: tail(3),
                })
            }
            FrameType::ATCommandResponse => {
                need(4, "AT command response")?;
                Self::ATCommandResponse(ATCommandResponseFrame {
                    frame_id: rest[0],
                    command: [rest[1], rest[2]],
                    status: ATCommandStatus::from_byte(rest[3]),
                    value: tail(4),
                })
            }
            FrameType::RemoteATCommandRequest => {
                need(14, "remote AT command")?;
                Self::RemoteATCommand(RemoteATCommandFrame {
                    frame_id: rest[0],
                    dest64: XBee64BitAddress::new(rest[1..9].try_into().unwrap()),
                    dest16: XBee16BitAddress::new(rest[9], rest[10]),
                    options: rest[11],
                    command: [rest[12], rest[13]],
                    parameter: tail(14),
                })
            }
            FrameType::RemoteATCommandResponse => {
                need(14, "remote AT command response")?;
                Self::RemoteATCommandResponse(RemoteATCommandResponseFrame {
                    frame_id: rest[0],
                    addr64: XBee64BitAddress::new(rest[1..9].try_into().unwrap()),
                    addr16: XBee16BitAddress::new(rest[9], rest[10]),
                    command: [rest[11], rest[12]],
                    status: ATCommandStatus::from_byte(rest[13]),
                    value: tail(14),
                })
            }
            FrameType::TransmitRequest => {
                need(13, "transmit request")?;
                Self::TransmitRequest(TransmitRequestFrame {
                    frame_id: rest[0],
                    dest64: XBee64BitAddress::new(rest[1..9].try_into().unwrap()),
                    dest16: XBee16BitAddress::new(rest[9], rest[10]),
                    broadcast_radius: rest[11],
                    options: rest[12],
                    payload: tail(13).unwrap_or_default(),
                })
            }
            FrameType::Tx64 => {
                need(10, "TX 64")?;
                Self::Tx64(Tx64Frame {
                    frame_id: rest[0],
                    dest64: XBee64BitAddress::new(rest[1..9].try_into().unwrap()),
                    options: rest[9],
                    payload: tail(10).unwrap_or_default(),
                })
            }
            FrameType::Tx16 => {
                need(4, "TX 16")?;
                Self::Tx16(Tx16Frame {
                    frame_id: rest[0],
                    dest16: XBee16BitAddress::new(rest[1], rest[2]),
                    options: rest[3],
                    payload: tail(4).unwrap_or_default(),
                })
            }
            FrameType::TransmitStatus => {
                need(6, "transmit status")?;
                Self::TransmitStatus(TransmitStatusFrame {
                    frame_id: rest[0],
                    dest16: XBee16BitAddress::new(rest[1], rest[2]),
                    retry_count: rest[3],
                    delivery_status: TransmitStatus::from_byte(rest[4]),
                    discovery_status: rest[5],
                })
            }
            FrameType::TxStatus => {
                need(2, "TX status")?;
                Self::TxStatus(TxStatusFrame {
                    frame_id: rest[0],
                    status: TransmitStatus::from_byte(rest[1]),
                })
            }
            FrameType::ModemStatus => {
                need(1, "modem status")?;
                Self::ModemStatus(ModemStatusFrame {
                    status: ModemStatus::from_byte(rest[0]),
                })
            }
            FrameType::IODataSampleRxIndicator => {
                need(11, "IO data sample indicator")?;
                Self::IODataSampleRx(IODataSampleRxFrame {
                    addr64: XBee64BitAddress::new(rest[0..8].try_into().unwrap()),
                    addr16: XBee16BitAddress::new(rest[8], rest[9]),
                    receive_options: rest[10],
                    data: tail(11).unwrap_or_default(),
                })
            }
            FrameType::Rx64IO => {
                need(10, "RX IO 64")?;
                Self::Rx64IO(Rx64IOFrame {
                    addr64: XBee64BitAddress::new(rest[0..8].try_into().unwrap()),
                    rssi: rest[8],
                    options: rest[9],
                    data: tail(10).unwrap_or_default(),
                })
            }
            FrameType::Rx16IO => {
                need(4, "RX IO 16")?;
                Self::Rx16IO(Rx16IOFrame {
                    addr16: XBee16BitAddress::new(rest[0], rest[1]),
                    rssi: rest[2],
                    options: rest[3],
                    data: tail(4).unwrap_or_default(),
                })
            }
        };
        Ok(frame)
    }
}

impl fmt::Display for XBeeApiFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_type() {
            Some(t) => write!(f, "{t:?} frame"),
            None => write!(f, "unknown frame {:#04x}", self.frame_type_byte()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_frame_id() {
        assert!(FrameType::ATCommand.needs_frame_id());
        assert!(FrameType::RemoteATCommandRequest.needs_frame_id());
        assert!(FrameType::TransmitRequest.needs_frame_id());
        assert!(FrameType::Tx64.needs_frame_id());
        assert!(!FrameType::ATCommandResponse.needs_frame_id());
        assert!(!FrameType::ModemStatus.needs_frame_id());
        assert!(!FrameType::IODataSampleRxIndicator.needs_frame_id());
    }

    #[test]
    fn test_at_command_body() {
        let frame = XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: 0x01,
            command: *b"NI",
            parameter: None,
        });
        assert_eq!(frame.body().as_ref(), &[0x08, 0x01, 0x4E, 0x49]);
    }

    #[test]
    fn test_at_response_roundtrip() {
        let frame = XBeeApiFrame::ATCommandResponse(ATCommandResponseFrame {
            frame_id: 0x01,
            command: *b"NI",
            status: ATCommandStatus::Ok,
            value: Some(Bytes::from_static(b"MY_NODE")),
        });
        let body = frame.body();
        assert_eq!(XBeeApiFrame::decode(&body).unwrap(), frame);
    }

    #[test]
    fn test_remote_at_roundtrip() {
        let frame = XBeeApiFrame::RemoteATCommand(RemoteATCommandFrame {
            frame_id: 0x52,
            dest64: XBee64BitAddress::from_hex("0013A20040AABBCC").unwrap(),
            dest16: XBee16BitAddress::UNKNOWN,
            options: 0x02,
            command: *b"D3",
            parameter: Some(Bytes::from_static(&[0x05])),
        });
        let body = frame.body();
        assert_eq!(body[0], 0x17);
        assert_eq!(XBeeApiFrame::decode(&body).unwrap(), frame);
    }

    #[test]
    fn test_empty_value_decodes_to_none() {
        let body = [0x88, 0x01, 0x49, 0x53, 0x00];
        let XBeeApiFrame::ATCommandResponse(resp) = XBeeApiFrame::decode(&body).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(resp.value, None);
        assert_eq!(resp.status, ATCommandStatus::Ok);
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let body = [0x3E, 0xAA, 0xBB];
        let frame = XBeeApiFrame::decode(&body).unwrap();
        assert_eq!(
            frame,
            XBeeApiFrame::Opaque {
                frame_type: 0x3E,
                payload: Bytes::from_static(&[0xAA, 0xBB]),
            }
        );
        // and re-encodes to the same body
        assert_eq!(frame.body().as_ref(), &body);
    }

    #[test]
    fn test_truncated_known_frame() {
        let body = [0x88, 0x01, 0x4E];
        assert!(matches!(
            XBeeApiFrame::decode(&body),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn test_set_frame_id() {
        let mut frame = XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: NO_FRAME_ID,
            command: *b"AP",
            parameter: None,
        });
        assert!(frame.needs_frame_id());
        frame.set_frame_id(0x2A);
        assert_eq!(frame.frame_id(), Some(0x2A));
    }

    #[test]
    fn test_tx_status_roundtrip() {
        let frame = XBeeApiFrame::TransmitStatus(TransmitStatusFrame {
            frame_id: 3,
            dest16: XBee16BitAddress::new(0x12, 0x34),
            retry_count: 1,
            delivery_status: TransmitStatus::RouteNotFound,
            discovery_status: 0x02,
        });
        let body = frame.body();
        assert_eq!(XBeeApiFrame::decode(&body).unwrap(), frame);
    }

    #[test]
    fn test_modem_status_reset_predicate() {
        assert!(ModemStatus::HardwareReset.is_reset());
        assert!(ModemStatus::WatchdogTimerReset.is_reset());
        assert!(!ModemStatus::JoinedNetwork.is_reset());
        assert!(!ModemStatus::Unknown(0x42).is_reset());
    }
}
