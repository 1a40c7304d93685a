//! Ties the channel model, the DAC array and host commands together.

use core::time::Duration;

use embedded_hal::digital::OutputPin;

use crate::bus::SpiPeripheral;
use crate::command::{self, Command, DEFAULT_UPDATE_RATE_HZ};
use crate::fanout::DacArray;
use crate::frame::Packet;
use crate::report::{encode_readback_report, report_len};
use crate::{Channels, Error};

/// Ramp controller for `N` channels spread over `CHIPS` DACs.
///
/// The foreground loop passes each packet from the host to
/// [`Controller::handle`] and calls [`Controller::tick`] once every
/// [`Controller::tick_period`].
#[derive(Debug)]
pub struct Controller<SPI, CS, const N: usize, const CHIPS: usize> {
    channels: Channels<N>,
    dacs: DacArray<SPI, CS, CHIPS>,
    running: bool,
    update_rate_hz: u32,
}

impl<SPI, CS, const N: usize, const CHIPS: usize> Controller<SPI, CS, N, CHIPS>
where
    SPI: SpiPeripheral,
    CS: OutputPin,
{
    /// Length of the report produced by [`Controller::readback_report`].
    pub const REPORT_LEN: usize = report_len(N);

    /// Create a stopped controller with every channel idle at code 0.
    ///
    /// # Errors
    ///
    /// [`Error::FanOutMismatch`] if the array doesn't have `N` channels.
    pub fn new(dacs: DacArray<SPI, CS, CHIPS>) -> Result<Self, Error> {
        if dacs.fanout().channel_count() != N {
            return Err(Error::FanOutMismatch);
        }
        Ok(Self {
            channels: Channels::new(),
            dacs,
            running: false,
            update_rate_hz: DEFAULT_UPDATE_RATE_HZ,
        })
    }

    /// Decode a packet from the host and apply it.
    ///
    /// # Errors
    ///
    /// Any decode error from [`Command::decode`], or any error from
    /// [`Controller::apply`]. Nothing is changed on error.
    pub fn handle(&mut self, packet: &Packet) -> Result<Command, Error> {
        let command = Command::decode(packet.as_bytes()).inspect_err(|e| {
            warn!("rejected packet: {}", e);
        })?;
        self.apply(command)?;
        Ok(command)
    }

    /// Apply a command.
    ///
    /// A configured channel starts from its start code on the next tick. Stop
    /// leaves every output at its current code.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`], [`Error::ZeroStepCount`] or
    /// [`Error::UpdateRateOutOfRange`].
    pub fn apply(&mut self, command: Command) -> Result<(), Error> {
        match command {
            Command::ConfigureChannel { channel, ramp } => self.channels.configure(channel, ramp)?,
            Command::Start => {
                info!("ramping started");
                self.running = true;
            }
            Command::Stop => {
                info!("ramping stopped");
                self.running = false;
            }
            Command::SetUpdateRate(hz) => {
                self.update_rate_hz = command::check_update_rate(hz)?;
                debug!("update rate {} Hz", hz);
            }
        }
        Ok(())
    }

    /// Advance every channel one step and write all codes, if running.
    ///
    /// # Errors
    ///
    /// Any bus error. Channels have already advanced when a write fails.
    pub fn tick(&mut self) -> Result<(), Error> {
        if !self.running {
            return Ok(());
        }
        self.channels.advance_all();
        self.dacs.write_all(&self.channels)
    }

    /// Write every channel's current code without advancing.
    ///
    /// # Errors
    ///
    /// Any bus error.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.dacs.write_all(&self.channels)
    }

    /// Set one channel straight to `code` and write it.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`], or any bus error.
    pub fn set_code(&mut self, index: usize, code: u16) -> Result<(), Error> {
        self.dacs.write(&mut self.channels, index, code)
    }

    /// Read every channel back from the DACs.
    ///
    /// # Errors
    ///
    /// Any bus error.
    pub fn refresh_readback(&mut self) -> Result<(), Error> {
        self.dacs.read_all(&mut self.channels)
    }

    /// Encode the last read-back codes into `out`, returning the report length.
    ///
    /// # Errors
    ///
    /// [`Error::BufferTooSmall`] if `out` is shorter than
    /// [`Controller::REPORT_LEN`].
    pub fn readback_report(&self, out: &mut [u8]) -> Result<usize, Error> {
        encode_readback_report(
            self.channels.iter().map(|state| state.last_read_code()),
            out,
        )
    }

    /// Channel states.
    pub fn channels(&self) -> &Channels<N> {
        &self.channels
    }

    /// DAC array.
    pub fn dacs(&self) -> &DacArray<SPI, CS, CHIPS> {
        &self.dacs
    }

    /// Whether ticks advance the channels.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Requested tick rate in Hz.
    pub fn update_rate_hz(&self) -> u32 {
        self.update_rate_hz
    }

    /// Time between ticks at the requested rate.
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.update_rate_hz))
    }

    /// Give back the DAC array.
    pub fn release(self) -> DacArray<SPI, CS, CHIPS> {
        self.dacs
    }
}
