//! Host commands and their packet encoding.
//!
//! Every packet starts with [`START_MARKER`] and its total length, followed by
//! the command code and payload. Multi-byte fields are big-endian, and the last
//! byte is a pad.
//!
//! | Command                | Code   | Length | Payload                                   |
//! |------------------------|--------|--------|-------------------------------------------|
//! | [`Command::ConfigureChannel`] | `0x01` | 12 | channel (from 1), hold, start, end, steps |
//! | [`Command::Start`]     | `0x02` | 4      |                                           |
//! | [`Command::Stop`]      | `0x06` | 4      |                                           |
//! | [`Command::Stop`]      | `0x08` | 4      | (older hosts)                             |
//! | [`Command::SetUpdateRate`] | `0x08` | 7  | rate in Hz, 24 bits                       |

use crate::channel::Ramp;
use crate::frame::Packet;
use crate::Error;

/// First byte of every packet.
pub const START_MARKER: u8 = 0xAA;
/// Trailing byte of every packet.
pub const PAD: u8 = 0x00;

/// Configure one channel's ramp.
pub const CONFIGURE_CHANNEL: u8 = 0x01;
/// Start ramping.
pub const START: u8 = 0x02;
/// Stop ramping.
pub const STOP: u8 = 0x06;
/// Stop ramping, as sent by older hosts. Shares its code with [`SET_UPDATE_RATE`]
/// and is told apart by the packet length.
pub const LEGACY_STOP: u8 = 0x08;
/// Set the tick rate.
pub const SET_UPDATE_RATE: u8 = 0x08;

/// Length of a configure packet.
pub const CONFIGURE_LEN: usize = 12;
/// Length of a start or stop packet.
pub const CONTROL_LEN: usize = 4;
/// Length of an update rate packet.
pub const RATE_LEN: usize = 7;

/// Fastest supported tick rate.
pub const MAX_UPDATE_RATE_HZ: u32 = 200_000;
/// Tick rate used until the host sets one.
pub const DEFAULT_UPDATE_RATE_HZ: u32 = 1_000;

/// A decoded host command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set up a ramp on one channel.
    ConfigureChannel {
        /// Channel index, counted from 0. Sent counted from 1.
        channel: usize,
        /// Ramp parameters.
        ramp: Ramp,
    },
    /// Start advancing every channel once per tick.
    Start,
    /// Stop advancing channels. Outputs keep their current codes.
    Stop,
    /// Change the tick rate, in Hz.
    SetUpdateRate(u32),
}

/// Check that `hz` is a supported tick rate.
///
/// # Errors
///
/// [`Error::UpdateRateOutOfRange`] unless `hz` is in `1..=200_000`.
pub fn check_update_rate(hz: u32) -> Result<u32, Error> {
    if (1..=MAX_UPDATE_RATE_HZ).contains(&hz) {
        Ok(hz)
    } else {
        Err(Error::UpdateRateOutOfRange(hz))
    }
}

impl Command {
    /// Parse a complete packet.
    ///
    /// The pad byte is not checked. A zero step count is accepted here and
    /// rejected when the command is applied.
    ///
    /// # Errors
    ///
    /// - [`Error::BadStartMarker`] if the first byte isn't [`START_MARKER`].
    /// - [`Error::LengthMismatch`] if the length byte disagrees with the slice,
    ///   or the packet is shorter than a header and command code.
    /// - [`Error::UnknownCommand`] for an unrecognised command code.
    /// - [`Error::InvalidPayload`] if the length is wrong for the command or
    ///   the channel is 0.
    /// - [`Error::UpdateRateOutOfRange`] for a rate of 0 or above the maximum.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let [marker, declared, code, payload @ ..] = bytes else {
            return Err(Error::LengthMismatch {
                declared: bytes.get(1).copied().unwrap_or(0),
                actual: bytes.len(),
            });
        };
        if *marker != START_MARKER {
            return Err(Error::BadStartMarker(*marker));
        }
        if usize::from(*declared) != bytes.len() {
            return Err(Error::LengthMismatch {
                declared: *declared,
                actual: bytes.len(),
            });
        }

        match (*code, payload) {
            (
                CONFIGURE_CHANNEL,
                &[channel, hold, start_hi, start_lo, end_hi, end_lo, steps_hi, steps_lo, _],
            ) => {
                let channel = usize::from(channel)
                    .checked_sub(1)
                    .ok_or(Error::InvalidPayload(CONFIGURE_CHANNEL))?;
                Ok(Command::ConfigureChannel {
                    channel,
                    ramp: Ramp {
                        start_code: u16::from_be_bytes([start_hi, start_lo]),
                        end_code: u16::from_be_bytes([end_hi, end_lo]),
                        step_count: u16::from_be_bytes([steps_hi, steps_lo]),
                        hold_at_end: hold != 0,
                    },
                })
            }
            (START, &[_]) => Ok(Command::Start),
            (STOP | LEGACY_STOP, &[_]) => Ok(Command::Stop),
            (SET_UPDATE_RATE, &[high, mid, low, _]) => {
                let hz = u32::from_be_bytes([0, high, mid, low]);
                check_update_rate(hz).map(Command::SetUpdateRate)
            }
            (CONFIGURE_CHANNEL | START | STOP | SET_UPDATE_RATE, _) => {
                Err(Error::InvalidPayload(*code))
            }
            (other, _) => Err(Error::UnknownCommand(other)),
        }
    }

    /// Encode into `out`, returning the number of bytes written.
    ///
    /// [`Command::Stop`] is encoded with the current [`STOP`] code.
    ///
    /// # Errors
    ///
    /// - [`Error::BufferTooSmall`] if `out` can't hold the packet.
    /// - [`Error::ChannelOutOfRange`] if the channel can't be sent in one byte.
    /// - [`Error::UpdateRateOutOfRange`] for an unsupported rate.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, Error> {
        let mut packet = [0u8; CONFIGURE_LEN];
        let len = match *self {
            Command::ConfigureChannel { channel, ramp } => {
                let wire_channel = channel
                    .checked_add(1)
                    .and_then(|wire| u8::try_from(wire).ok())
                    .ok_or(Error::ChannelOutOfRange(channel))?;
                let [start_hi, start_lo] = ramp.start_code.to_be_bytes();
                let [end_hi, end_lo] = ramp.end_code.to_be_bytes();
                let [steps_hi, steps_lo] = ramp.step_count.to_be_bytes();
                packet[2..11].copy_from_slice(&[
                    CONFIGURE_CHANNEL,
                    wire_channel,
                    u8::from(ramp.hold_at_end),
                    start_hi,
                    start_lo,
                    end_hi,
                    end_lo,
                    steps_hi,
                    steps_lo,
                ]);
                CONFIGURE_LEN
            }
            Command::Start => {
                packet[2] = START;
                CONTROL_LEN
            }
            Command::Stop => {
                packet[2] = STOP;
                CONTROL_LEN
            }
            Command::SetUpdateRate(hz) => {
                let [_, high, mid, low] = check_update_rate(hz)?.to_be_bytes();
                packet[2..6].copy_from_slice(&[SET_UPDATE_RATE, high, mid, low]);
                RATE_LEN
            }
        };
        packet[0] = START_MARKER;
        packet[1] = len as u8;
        packet[len - 1] = PAD;

        let out = out.get_mut(..len).ok_or(Error::BufferTooSmall)?;
        out.copy_from_slice(&packet[..len]);
        Ok(len)
    }

    /// Encode into a [`Packet`].
    ///
    /// # Errors
    ///
    /// As for [`Command::encode_into`], apart from the buffer size.
    pub fn encode(&self) -> Result<Packet, Error> {
        let mut buffer = [0u8; CONFIGURE_LEN];
        let len = self.encode_into(&mut buffer)?;
        Packet::from_slice(&buffer[..len])
    }
}
