//! Transport layer: the byte channel a device is attached through.
//!
//! The library only assumes a full-duplex byte stream with explicit
//! open/close. Framing is entirely the codec's job; a transport moves
//! bytes.

pub mod serial;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;

/// The inbound half of a transport, consumed by the background reader.
pub type TransportReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the connection.
    fn open(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Closes the connection.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true while the connection is open.
    fn is_open(&self) -> bool;

    /// Writes raw bytes to the outbound half.
    fn write(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Takes the inbound half for the background reader.
    ///
    /// Returns `None` when the transport is closed or the reader was
    /// already taken for this open.
    fn take_reader(&mut self) -> Option<TransportReader>;
}

pub use serial::SerialTransport;
