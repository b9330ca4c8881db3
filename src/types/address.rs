//! XBee addressing types.
//!
//! Modules carry two addresses: a 16-bit network address assigned when the
//! module joins, and a fixed 64-bit IEEE address split across the `SH` and
//! `SL` parameters.

use std::fmt;

use crate::error::{Error, Result};

/// 16-bit network address of an XBee module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XBee16BitAddress([u8; 2]);

impl XBee16BitAddress {
    /// Coordinator address.
    pub const COORDINATOR: Self = Self([0x00, 0x00]);
    /// Broadcast address.
    pub const BROADCAST: Self = Self([0xFF, 0xFF]);
    /// Sentinel for an unknown 16-bit address.
    pub const UNKNOWN: Self = Self([0xFF, 0xFE]);

    /// Creates an address from its two big-endian bytes.
    #[must_use]
    pub const fn new(hsb: u8, lsb: u8) -> Self {
        Self([hsb, lsb])
    }

    /// Creates an address from a 2-byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the slice is not 2 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 2] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("16-bit address must be 2 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Returns the address bytes, big-endian.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 2] {
        self.0
    }

    /// Returns the address as a `u16`.
    #[must_use]
    pub const fn value(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Returns true unless this is the unknown sentinel.
    #[must_use]
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for XBee16BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// 64-bit IEEE address of an XBee module.
///
/// Obtained by concatenating the module's `SH` (high 4 bytes) and `SL`
/// (low 4 bytes) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XBee64BitAddress([u8; 8]);

impl XBee64BitAddress {
    /// ZigBee coordinator address.
    pub const COORDINATOR: Self = Self([0x00; 8]);
    /// Broadcast address.
    pub const BROADCAST: Self = Self([0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF]);
    /// Sentinel for an unknown 64-bit address.
    pub const UNKNOWN: Self = Self([0xFF; 8]);

    /// Creates an address from its eight big-endian bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Creates an address from an 8-byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the slice is not 8 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("64-bit address must be 8 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Parses an address from a hex string of up to 16 digits, left-padding
    /// with zeros. This is the form produced by joining `SH` and `SL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on non-hex input or more than 16
    /// digits.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 16 {
            return Err(Error::InvalidArgument(format!(
                "64-bit address must be 1 to 16 hex digits, got {}",
                s.len()
            )));
        }
        let padded = format!("{s:0>16}");
        let mut arr = [0u8; 8];
        hex::decode_to_slice(&padded, &mut arr)
            .map_err(|e| Error::InvalidArgument(format!("invalid hex address: {e}")))?;
        Ok(Self(arr))
    }

    /// Builds the address from the `SH` and `SL` parameter values, padding
    /// `SL` to 8 hex digits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either half exceeds 4 bytes.
    pub fn from_sh_sl(sh: &[u8], sl: &[u8]) -> Result<Self> {
        if sh.len() > 4 || sl.len() > 4 {
            return Err(Error::InvalidArgument(
                "SH and SL must each be at most 4 bytes".into(),
            ));
        }
        let high = hex::encode_upper(sh);
        let low = format!("{:0>8}", hex::encode_upper(sl));
        Self::from_hex(&format!("{high}{low}"))
    }

    /// Returns the address bytes, big-endian.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 8] {
        self.0
    }

    /// Returns true unless this is the unknown sentinel.
    #[must_use]
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for XBee64BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
