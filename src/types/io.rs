//! IO line definitions and sample decoding.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// A GPIO/analog line on an XBee module.
///
/// Each line carries its configuration AT mnemonic; the PWM-capable lines
/// additionally carry the duty-cycle mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IOLine {
    /// DIO0 / AD0, configured with `D0`.
    Dio0Ad0,
    /// DIO1 / AD1, configured with `D1`.
    Dio1Ad1,
    /// DIO2 / AD2, configured with `D2`.
    Dio2Ad2,
    /// DIO3 / AD3, configured with `D3`.
    Dio3Ad3,
    /// DIO4 / AD4, configured with `D4`.
    Dio4Ad4,
    /// DIO5 / AD5, configured with `D5`.
    Dio5Ad5,
    /// DIO6, configured with `D6`.
    Dio6,
    /// DIO7, configured with `D7`.
    Dio7,
    /// DIO8, configured with `D8`.
    Dio8,
    /// DIO9, configured with `D9`.
    Dio9,
    /// DIO10 / PWM0, configured with `P0`.
    Dio10Pwm0,
    /// DIO11 / PWM1, configured with `P1`.
    Dio11Pwm1,
    /// DIO12, configured with `P2`.
    Dio12,
    /// DIO13, configured with `P3`.
    Dio13,
    /// DIO14, configured with `P4`.
    Dio14,
}

impl IOLine {
    /// Every line, in digital-index order.
    pub const ALL: [Self; 15] = [
        Self::Dio0Ad0,
        Self::Dio1Ad1,
        Self::Dio2Ad2,
        Self::Dio3Ad3,
        Self::Dio4Ad4,
        Self::Dio5Ad5,
        Self::Dio6,
        Self::Dio7,
        Self::Dio8,
        Self::Dio9,
        Self::Dio10Pwm0,
        Self::Dio11Pwm1,
        Self::Dio12,
        Self::Dio13,
        Self::Dio14,
    ];

    /// Digital channel index of the line (bit position in sample masks).
    #[must_use]
    pub const fn index(&self) -> u8 {
        match self {
            Self::Dio0Ad0 => 0,
            Self::Dio1Ad1 => 1,
            Self::Dio2Ad2 => 2,
            Self::Dio3Ad3 => 3,
            Self::Dio4Ad4 => 4,
            Self::Dio5Ad5 => 5,
            Self::Dio6 => 6,
            Self::Dio7 => 7,
            Self::Dio8 => 8,
            Self::Dio9 => 9,
            Self::Dio10Pwm0 => 10,
            Self::Dio11Pwm1 => 11,
            Self::Dio12 => 12,
            Self::Dio13 => 13,
            Self::Dio14 => 14,
        }
    }

    /// Maps a digital channel index back to its line.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// The configuration AT mnemonic for this line.
    #[must_use]
    pub const fn configuration_command(&self) -> &'static str {
        match self {
            Self::Dio0Ad0 => "D0",
            Self::Dio1Ad1 => "D1",
            Self::Dio2Ad2 => "D2",
            Self::Dio3Ad3 => "D3",
            Self::Dio4Ad4 => "D4",
            Self::Dio5Ad5 => "D5",
            Self::Dio6 => "D6",
            Self::Dio7 => "D7",
            Self::Dio8 => "D8",
            Self::Dio9 => "D9",
            Self::Dio10Pwm0 => "P0",
            Self::Dio11Pwm1 => "P1",
            Self::Dio12 => "P2",
            Self::Dio13 => "P3",
            Self::Dio14 => "P4",
        }
    }

    /// The duty-cycle AT mnemonic, for the PWM-capable lines.
    #[must_use]
    pub const fn pwm_command(&self) -> Option<&'static str> {
        match self {
            Self::Dio10Pwm0 => Some("M0"),
            Self::Dio11Pwm1 => Some("M1"),
            _ => None,
        }
    }

    /// Returns true for lines with a PWM output.
    #[must_use]
    pub const fn has_pwm_capability(&self) -> bool {
        self.pwm_command().is_some()
    }

    /// ADC channel index, for the analog-capable lines.
    #[must_use]
    pub const fn analog_index(&self) -> Option<u8> {
        match self {
            Self::Dio0Ad0 => Some(0),
            Self::Dio1Ad1 => Some(1),
            Self::Dio2Ad2 => Some(2),
            Self::Dio3Ad3 => Some(3),
            Self::Dio4Ad4 => Some(4),
            Self::Dio5Ad5 => Some(5),
            _ => None,
        }
    }

    /// Returns true for lines with an ADC behind them.
    #[must_use]
    pub const fn has_adc_capability(&self) -> bool {
        self.analog_index().is_some()
    }
}

impl fmt::Display for IOLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DIO{}", self.index())
    }
}

/// Configuration mode of an IO line.
///
/// The mode byte `0x02` means ADC on analog-capable lines and PWM on the
/// PWM lines, so decoding needs the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOMode {
    /// Line disabled.
    Disabled,
    /// Line runs its alternate hardware function.
    SpecialFunctionality,
    /// PWM output (PWM-capable lines only).
    Pwm,
    /// Analog input (analog-capable lines only).
    Adc,
    /// Digital input.
    DigitalIn,
    /// Digital output, driven low.
    DigitalOutLow,
    /// Digital output, driven high.
    DigitalOutHigh,
}

impl IOMode {
    /// The mode byte written to the configuration command.
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::SpecialFunctionality => 1,
            Self::Pwm | Self::Adc => 2,
            Self::DigitalIn => 3,
            Self::DigitalOutLow => 4,
            Self::DigitalOutHigh => 5,
        }
    }

    /// Decodes a mode byte in the context of a line.
    #[must_use]
    pub fn from_id(id: u8, line: IOLine) -> Option<Self> {
        match id {
            0 => Some(Self::Disabled),
            1 => Some(Self::SpecialFunctionality),
            2 if line.has_pwm_capability() => Some(Self::Pwm),
            2 if line.has_adc_capability() => Some(Self::Adc),
            3 => Some(Self::DigitalIn),
            4 => Some(Self::DigitalOutLow),
            5 => Some(Self::DigitalOutHigh),
            _ => None,
        }
    }
}

/// Digital level of an IO line.
///
/// The identifiers coincide with the output modes, which is why writing a
/// line reuses its configuration mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOValue {
    /// Logic low.
    Low,
    /// Logic high.
    High,
}

impl IOValue {
    /// The value byte written to the configuration command.
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::Low => 4,
            Self::High => 5,
        }
    }
}

/// A decoded IO sample: which channels were sampled and their values.
#[derive(Debug, Clone, Default)]
pub struct IOSample {
    digital_mask: u16,
    analog_mask: u16,
    digital_values: HashMap<IOLine, IOValue>,
    analog_values: HashMap<IOLine, u16>,
}

impl IOSample {
    /// Decodes the sample format used by ZigBee/DigiMesh modules:
    /// sample count, 16-bit digital mask, 8-bit analog mask, then the
    /// digital levels (if any) and one 10-bit reading per analog channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the payload is shorter than
    /// its masks declare.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 4 {
            return Err(Error::InvalidArgument(format!(
                "IO sample payload too short: {} bytes",
                payload.len()
            )));
        }
        let digital_mask = u16::from_be_bytes([payload[1], payload[2]]);
        let analog_mask = u16::from(payload[3]);
        let mut offset = 4;

        let mut sample = Self {
            digital_mask,
            analog_mask,
            ..Default::default()
        };
        if digital_mask != 0 {
            let levels = Self::take_u16(payload, &mut offset)?;
            sample.fill_digital(digital_mask, levels);
        }
        for adc in 0..8 {
            if analog_mask & (1 << adc) == 0 {
                continue;
            }
            let reading = Self::take_u16(payload, &mut offset)?;
            if let Some(line) = IOLine::from_index(adc) {
                sample.analog_values.insert(line, reading & 0x03FF);
            }
        }
        Ok(sample)
    }

    /// Decodes the 802.15.4 sample format carried by `RX_IO_16`/`RX_IO_64`
    /// frames: sample count, then a 16-bit channel indicator whose low nine
    /// bits are DIO0..8 and bits 9..14 are ADC0..5.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the payload is shorter than
    /// its indicator declares.
    pub fn decode_raw_802(payload: &[u8]) -> Result<Self> {
        if payload.len() < 3 {
            return Err(Error::InvalidArgument(format!(
                "802.15.4 IO sample payload too short: {} bytes",
                payload.len()
            )));
        }
        let indicator = u16::from_be_bytes([payload[1], payload[2]]);
        let digital_mask = indicator & 0x01FF;
        let analog_mask = (indicator >> 9) & 0x3F;
        let mut offset = 3;

        let mut sample = Self {
            digital_mask,
            analog_mask,
            ..Default::default()
        };
        if digital_mask != 0 {
            let levels = Self::take_u16(payload, &mut offset)?;
            sample.fill_digital(digital_mask, levels);
        }
        for adc in 0..6 {
            if analog_mask & (1 << adc) == 0 {
                continue;
            }
            let reading = Self::take_u16(payload, &mut offset)?;
            if let Some(line) = IOLine::from_index(adc) {
                sample.analog_values.insert(line, reading & 0x03FF);
            }
        }
        Ok(sample)
    }

    fn take_u16(payload: &[u8], offset: &mut usize) -> Result<u16> {
        let Some(bytes) = payload.get(*offset..*offset + 2) else {
            return Err(Error::InvalidArgument(
                "IO sample payload shorter than its masks declare".into(),
            ));
        };
        *offset += 2;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn fill_digital(&mut self, mask: u16, levels: u16) {
        for bit in 0..16 {
            if mask & (1 << bit) == 0 {
                continue;
            }
            if let Some(line) = IOLine::from_index(bit) {
                let value = if levels & (1 << bit) != 0 {
                    IOValue::High
                } else {
                    IOValue::Low
                };
                self.digital_values.insert(line, value);
            }
        }
    }

    /// The 16-bit digital channel mask.
    #[must_use]
    pub const fn digital_mask(&self) -> u16 {
        self.digital_mask
    }

    /// The analog channel mask.
    #[must_use]
    pub const fn analog_mask(&self) -> u16 {
        self.analog_mask
    }

    /// Returns true when the sample carries any digital level.
    #[must_use]
    pub fn has_digital_values(&self) -> bool {
        !self.digital_values.is_empty()
    }

    /// Returns true when the sample carries any analog reading.
    #[must_use]
    pub fn has_analog_values(&self) -> bool {
        !self.analog_values.is_empty()
    }

    /// Digital level of the given line, if sampled.
    #[must_use]
    pub fn digital_value(&self, line: IOLine) -> Option<IOValue> {
        self.digital_values.get(&line).copied()
    }

    /// 10-bit reading of the given line, if sampled.
    #[must_use]
    pub fn analog_value(&self, line: IOLine) -> Option<u16> {
        self.analog_values.get(&line).copied()
    }
}
