//! Low-level protocol: checksum, wire codec and typed frames.

pub mod checksum;
pub mod frame;
pub mod packet;

pub use checksum::Checksum;
pub use frame::{encode as encode_frame, FrameDecoder, MAX_FRAME_SIZE, START_DELIMITER};
pub use packet::{FrameType, ModemStatus, TransmitStatus, XBeeApiFrame, NO_FRAME_ID};
