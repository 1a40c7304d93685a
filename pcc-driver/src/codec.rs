//! Conversion between output voltages and DAC codes.
//!
//! The DACs take a 16-bit code. The output stage scales the DAC range up to the
//! full-scale voltage of the board, so the conversion is a straight proportion.

/// Largest code accepted by the DACs.
pub const MAX_CODE: u16 = u16::MAX;

/// Full-scale output voltage of the board.
pub const MAX_VOLTAGE: f32 = 30.0;

/// Convert a voltage to a DAC code.
///
/// The voltage is clamped to `0.0..=max_voltage` before conversion, so the result
/// saturates at `0` and `max_code` rather than wrapping. `NaN` converts to `0`.
pub fn encode(voltage: f32, max_voltage: f32, max_code: u16) -> u16 {
    if voltage.is_nan() || voltage <= 0.0 || max_voltage <= 0.0 {
        return 0;
    }
    if voltage >= max_voltage {
        return max_code;
    }
    let scaled = voltage / max_voltage * f32::from(max_code);
    // Round half up; `scaled` is non-negative and below `max_code`.
    (scaled + 0.5) as u16
}

/// Convert a DAC code back to a voltage.
///
/// Only used for diagnostics, so it is not an exact inverse of [`encode`].
pub fn decode(code: u16, max_voltage: f32, max_code: u16) -> f32 {
    if max_code == 0 {
        return 0.0;
    }
    f32::from(code.min(max_code)) / f32::from(max_code) * max_voltage
}

/// Full-scale voltage and code pair used for conversions.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageScale {
    /// Voltage produced by `max_code`.
    pub max_voltage: f32,
    /// Largest DAC code.
    pub max_code: u16,
}

impl Default for VoltageScale {
    fn default() -> Self {
        Self {
            max_voltage: MAX_VOLTAGE,
            max_code: MAX_CODE,
        }
    }
}

impl VoltageScale {
    /// Convert a voltage to a code on this scale.
    pub fn to_code(&self, voltage: f32) -> u16 {
        encode(voltage, self.max_voltage, self.max_code)
    }

    /// Convert a code to a voltage on this scale.
    pub fn to_voltage(&self, code: u16) -> f32 {
        decode(code, self.max_voltage, self.max_code)
    }
}
