//! Serial port transport.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportReader};

/// Default baud rate when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial line parameters.
///
/// The default is 9600-8-N-1 with no flow control, which is what a
/// factory-fresh module speaks.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Parity checking.
    pub parity: Parity,
    /// Flow control.
    pub flow_control: FlowControl,
}

impl SerialConfig {
    /// Creates a configuration for the given port with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the data bits.
    #[must_use]
    pub const fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = bits;
        self
    }

    /// Sets the stop bits.
    #[must_use]
    pub const fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Sets the parity.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the flow control.
    #[must_use]
    pub const fn flow_control(mut self, flow: FlowControl) -> Self {
        self.flow_control = flow;
        self
    }
}

/// Serial transport for a locally attached module.
///
/// The stream is split on open; the write half stays here and the read
/// half is handed to the background reader via [`Transport::take_reader`].
pub struct SerialTransport {
    config: SerialConfig,
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<ReadHalf<SerialStream>>,
}

impl SerialTransport {
    /// Creates a serial transport with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
        }
    }

    /// Creates a serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// The configured serial parameters.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }

            tracing::info!("opening serial port {}", self.config.port);
            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .data_bits(self.config.data_bits)
                .stop_bits(self.config.stop_bits)
                .parity(self.config.parity)
                .flow_control(self.config.flow_control)
                .open_native_async()
                .map_err(Error::Serial)?;

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(writer);
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.writer.is_some() || self.reader.is_some() {
                tracing::info!("closing serial port {}", self.config.port);
                self.writer = None;
                self.reader = None;
            }
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn write(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::InterfaceNotOpen)?;
            tracing::trace!("writing {} bytes", data.len());
            writer.write_all(&data).await.map_err(Error::Io)?;
            writer.flush().await.map_err(Error::Io)?;
            Ok(())
        })
    }

    fn take_reader(&mut self) -> Option<TransportReader> {
        self.reader
            .take()
            .map(|r| Box::new(r) as TransportReader)
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
