//! AT command and response types.

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};

/// An AT command: a two-letter mnemonic with an optional parameter.
///
/// Without a parameter the command reads (or executes) the addressed
/// module setting; with a parameter it writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ATCommand {
    command: [u8; 2],
    parameter: Option<Bytes>,
}

impl ATCommand {
    /// Creates a parameterless AT command (a read or an execute).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the mnemonic is not exactly
    /// two ASCII bytes.
    pub fn new(command: &str) -> Result<Self> {
        Self::with_parameter_opt(command, None)
    }

    /// Creates an AT command carrying a parameter value (a write).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the mnemonic is not exactly
    /// two ASCII bytes.
    pub fn with_parameter(command: &str, parameter: impl Into<Bytes>) -> Result<Self> {
        Self::with_parameter_opt(command, Some(parameter.into()))
    }

    fn with_parameter_opt(command: &str, parameter: Option<Bytes>) -> Result<Self> {
        let bytes = command.as_bytes();
        if bytes.len() != 2 || !command.is_ascii() {
            return Err(Error::InvalidArgument(format!(
                "AT command must be exactly 2 ASCII characters, got {command:?}"
            )));
        }
        Ok(Self {
            command: [bytes[0], bytes[1]],
            parameter,
        })
    }

    /// Returns the two mnemonic bytes.
    #[must_use]
    pub const fn command(&self) -> [u8; 2] {
        self.command
    }

    /// Returns the mnemonic as a string slice.
    #[must_use]
    pub fn name(&self) -> &str {
        // The constructor only accepts ASCII.
        std::str::from_utf8(&self.command).unwrap_or("??")
    }

    /// Returns the parameter value, if any.
    #[must_use]
    pub fn parameter(&self) -> Option<&Bytes> {
        self.parameter.as_ref()
    }
}

impl fmt::Display for ATCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameter {
            Some(p) => write!(f, "{} {}", self.name(), hex::encode_upper(p)),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// Status byte of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ATCommandStatus {
    /// Command executed.
    Ok = 0x00,
    /// Generic failure.
    Error = 0x01,
    /// The mnemonic is not a valid command.
    InvalidCommand = 0x02,
    /// The parameter value was rejected.
    InvalidParameter = 0x03,
    /// Remote command could not be delivered.
    TxFailure = 0x04,
    /// Status byte outside the documented set.
    Unknown = 0xFF,
}

impl ATCommandStatus {
    /// Maps a raw status byte, collapsing undocumented values to
    /// [`ATCommandStatus::Unknown`].
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::Error,
            0x02 => Self::InvalidCommand,
            0x03 => Self::InvalidParameter,
            0x04 => Self::TxFailure,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ATCommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Error => "error",
            Self::InvalidCommand => "invalid command",
            Self::InvalidParameter => "invalid parameter",
            Self::TxFailure => "transmission failure",
            Self::Unknown => "unknown status",
        };
        f.write_str(s)
    }
}

/// The decoded response to an [`ATCommand`].
#[derive(Debug, Clone)]
pub struct ATCommandResponse {
    /// The command this responds to.
    pub command: ATCommand,
    /// Response status.
    pub status: ATCommandStatus,
    /// Returned value, absent for writes and executes.
    pub value: Option<Bytes>,
}

impl ATCommandResponse {
    /// Fails unless the status is [`ATCommandStatus::Ok`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ATCommand`] carrying the non-OK status.
    pub fn check_status(&self) -> Result<()> {
        match self.status {
            ATCommandStatus::Ok => Ok(()),
            status => Err(Error::ATCommand(status)),
        }
    }
}
