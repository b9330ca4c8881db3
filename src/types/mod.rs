//! Data structures shared across the library.

pub mod address;
pub mod atcommand;
pub mod device;
pub mod io;

pub use address::{XBee16BitAddress, XBee64BitAddress};
pub use atcommand::{ATCommand, ATCommandResponse, ATCommandStatus};
pub use device::{
    DeviceIdentity, HardwareFamily, HardwareVersion, OperatingMode, XBeeProtocol,
};
pub use io::{IOLine, IOMode, IOSample, IOValue};
