use crate::bus::Stage;

/// Wrapper for problems when configuring channels, talking to the DACs, or
/// handling packets from the host.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A channel index outside of the channel array was given.
    ///
    /// The enclosed value is the offending (zero-based) index.
    ChannelOutOfRange(usize),
    /// A chip index with no chip-select line was given.
    ChipOutOfRange(usize),
    /// A ramp was configured with zero steps.
    ZeroStepCount,
    /// The fan-out table does not match the number of chip selects or channels.
    FanOutMismatch,
    /// The bus peripheral did not raise the expected flag within the poll limit.
    ///
    /// The peripheral has been reset and every chip select deasserted by the time
    /// this error is returned.
    BusTimeout {
        /// Chip that was selected when the wait gave up.
        chip: usize,
        /// Flag being waited for.
        stage: Stage,
    },
    /// Driving a chip-select line failed.
    ChipSelect {
        /// Chip whose select line could not be driven.
        chip: usize,
    },
    /// The declared packet length, or the bytes received, exceed the frame buffer.
    ///
    /// The partial frame has been discarded.
    FrameOverflow,
    /// The declared packet length is shorter than the two-byte header.
    FrameLengthInvalid(u8),
    /// A fragment arrived while a completed frame was still waiting to be consumed.
    ///
    /// The fragment's bytes were dropped.
    FramePending,
    /// The first byte of a packet was not the start marker.
    BadStartMarker(u8),
    /// The length byte of a packet does not match the number of bytes.
    LengthMismatch {
        /// Length declared in the packet header.
        declared: u8,
        /// Number of bytes actually present.
        actual: usize,
    },
    /// The command code is not recognised.
    UnknownCommand(u8),
    /// The payload length or contents are not valid for the command.
    InvalidPayload(u8),
    /// Update rate outside of `1..=200_000` Hz.
    UpdateRateOutOfRange(u32),
    /// Output buffer is too small for the encoded data.
    BufferTooSmall,
    /// A read-back report is missing its markers or has an odd payload length.
    MalformedReport,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ChannelOutOfRange(index) => write!(f, "channel index {index} out of range"),
            Error::ChipOutOfRange(chip) => write!(f, "chip index {chip} out of range"),
            Error::ZeroStepCount => f.write_str("ramp step count must be at least 1"),
            Error::FanOutMismatch => {
                f.write_str("fan-out table does not match the chip or channel count")
            }
            Error::BusTimeout { chip, stage } => {
                write!(f, "bus timed out waiting for {stage} on chip {chip}")
            }
            Error::ChipSelect { chip } => write!(f, "could not drive chip select for chip {chip}"),
            Error::FrameOverflow => f.write_str("packet longer than the frame buffer"),
            Error::FrameLengthInvalid(len) => write!(f, "invalid packet length {len}"),
            Error::FramePending => f.write_str("previous packet not yet consumed"),
            Error::BadStartMarker(byte) => write!(f, "bad start marker {byte:#04X}"),
            Error::LengthMismatch { declared, actual } => {
                write!(f, "packet declares {declared} bytes but has {actual}")
            }
            Error::UnknownCommand(code) => write!(f, "unknown command {code:#04X}"),
            Error::InvalidPayload(code) => write!(f, "invalid payload for command {code:#04X}"),
            Error::UpdateRateOutOfRange(hz) => write!(f, "update rate {hz} Hz out of range"),
            Error::BufferTooSmall => f.write_str("output buffer too small"),
            Error::MalformedReport => f.write_str("malformed read-back report"),
        }
    }
}

impl core::error::Error for Error {}
