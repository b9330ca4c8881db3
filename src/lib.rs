//! # xbee
//!
//! An async Rust driver for XBee radio modules speaking the binary API
//! frame protocol over a serial link.
//!
//! ## Features
//!
//! - Async/await API built on Tokio
//! - Escape-aware frame codec with checksum verification and resync
//! - Request/response correlation over a shared full-duplex channel
//! - Synchronous command surface: AT parameters, IO lines, PWM, reset
//! - Remote devices addressed over the air through a local module
//!
//! ## Quick start
//!
//! ```no_run
//! use xbee::{IOLine, IOMode, XBeeDevice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xbee::Error> {
//!     let mut device = XBeeDevice::serial("/dev/ttyUSB0");
//!     device.open().await?;
//!
//!     println!("node: {:?}", device.node_id());
//!     println!("address: {:?}", device.addr64());
//!
//!     device
//!         .set_io_configuration(IOLine::Dio4Ad4, IOMode::DigitalOutHigh)
//!         .await?;
//!     let level = device.get_dio_value(IOLine::Dio3Ad3).await?;
//!     println!("DIO3 is {level:?}");
//!
//!     device.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - checksum, wire codec and typed API frames
//! - [`types`] - addresses, AT commands, IO lines, device identity
//! - [`transport`] - the byte-channel abstraction and its serial
//!   implementation
//! - [`listener`] - fan-out of decoded frames to subscribers
//! - [`commands`] - the send engine correlating requests with responses
//! - [`device`] / [`remote`] - the local and remote device facades

pub mod commands;
pub mod device;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod remote;
pub mod transport;
pub mod types;

mod reader;
#[cfg(test)]
mod testutil;

// Re-exports for convenience
pub use commands::ResponseListener;
pub use device::{XBeeConfig, XBeeDevice};
pub use error::{Error, FrameError, Result};
pub use listener::{FrameSubscription, RawSubscription};
pub use protocol::{FrameType, ModemStatus, TransmitStatus, XBeeApiFrame};
pub use remote::RemoteXBeeDevice;
pub use transport::serial::{list_ports, SerialConfig};
pub use transport::{SerialTransport, Transport};
pub use types::{
    ATCommand, ATCommandResponse, ATCommandStatus, DeviceIdentity, HardwareVersion, IOLine,
    IOMode, IOSample, IOValue, OperatingMode, XBee16BitAddress, XBee64BitAddress, XBeeProtocol,
};
