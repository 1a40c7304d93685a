//! Mapping from global channel index to chip and per-chip channel.
//!
//! The channel array is laid out chip-major: chip 0 owns indices
//! `0..channels_per_chip`, chip 1 the next block, and so on.

use embedded_hal::digital::OutputPin;

use crate::bus::{DacBus, SpiPeripheral};
use crate::{Channels, Error};

/// Location of one channel on the bus.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipAddress {
    /// Chip (and chip-select line) index.
    pub chip: usize,
    /// Channel within the chip, counted from 0.
    pub channel: usize,
    first_channel_code: u8,
}

impl ChipAddress {
    /// Channel address sent on the wire.
    pub fn channel_code(&self) -> u8 {
        // The table constructor guarantees this fits in a u8.
        self.first_channel_code.wrapping_add(self.channel as u8)
    }
}

/// Channel layout of the DAC array.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    chips: usize,
    channels_per_chip: usize,
    first_channel_code: u8,
}

impl FanOut {
    /// Three eight-channel DACs, with output channels addressed 8 to 15.
    pub const DEFAULT: Self = Self {
        chips: 3,
        channels_per_chip: 8,
        first_channel_code: 8,
    };

    /// Build a layout table.
    ///
    /// # Errors
    ///
    /// [`Error::FanOutMismatch`] if either count is zero or the channel codes
    /// would not fit in the 4-bit wire address.
    pub fn new(chips: usize, channels_per_chip: usize, first_channel_code: u8) -> Result<Self, Error> {
        let last_code = usize::from(first_channel_code) + channels_per_chip;
        if chips == 0 || channels_per_chip == 0 || last_code > 0x10 {
            return Err(Error::FanOutMismatch);
        }
        Ok(Self {
            chips,
            channels_per_chip,
            first_channel_code,
        })
    }

    /// Number of chips.
    pub fn chips(&self) -> usize {
        self.chips
    }

    /// Number of channels on each chip.
    pub fn channels_per_chip(&self) -> usize {
        self.channels_per_chip
    }

    /// Total number of channels.
    pub fn channel_count(&self) -> usize {
        self.chips * self.channels_per_chip
    }

    /// Chip and channel for a global channel index, or `None` if out of range.
    pub fn address(&self, index: usize) -> Option<ChipAddress> {
        (index < self.channel_count()).then(|| ChipAddress {
            chip: index / self.channels_per_chip,
            channel: index % self.channels_per_chip,
            first_channel_code: self.first_channel_code,
        })
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The DAC array: a bus driver plus the layout of channels across its chips.
#[derive(Debug)]
pub struct DacArray<SPI, CS, const CHIPS: usize> {
    bus: DacBus<SPI, CS, CHIPS>,
    fanout: FanOut,
}

impl<SPI, CS, const CHIPS: usize> DacArray<SPI, CS, CHIPS>
where
    SPI: SpiPeripheral,
    CS: OutputPin,
{
    /// Combine a bus driver with a layout table.
    ///
    /// # Errors
    ///
    /// [`Error::FanOutMismatch`] if the table's chip count isn't `CHIPS`.
    pub fn new(bus: DacBus<SPI, CS, CHIPS>, fanout: FanOut) -> Result<Self, Error> {
        if fanout.chips() != CHIPS {
            return Err(Error::FanOutMismatch);
        }
        Ok(Self { bus, fanout })
    }

    /// Layout table.
    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    /// Underlying bus driver.
    pub fn bus(&self) -> &DacBus<SPI, CS, CHIPS> {
        &self.bus
    }

    /// Give back the bus driver.
    pub fn release(self) -> DacBus<SPI, CS, CHIPS> {
        self.bus
    }

    fn locate(&self, index: usize) -> Result<ChipAddress, Error> {
        self.fanout
            .address(index)
            .ok_or(Error::ChannelOutOfRange(index))
    }

    /// Write the current code of every channel, chip by chip.
    ///
    /// Stops at the first bus error.
    ///
    /// # Errors
    ///
    /// [`Error::FanOutMismatch`] if `N` doesn't match the layout, or any bus error.
    pub fn write_all<const N: usize>(&mut self, channels: &Channels<N>) -> Result<(), Error> {
        self.check_len::<N>()?;
        for (index, state) in channels.iter().enumerate() {
            let address = self.locate(index)?;
            self.bus
                .write(address.chip, address.channel_code(), state.current_code())?;
        }
        Ok(())
    }

    /// Read back every channel into its `last_read_code`, chip by chip.
    ///
    /// Stops at the first bus error; channels already read keep their new value.
    ///
    /// # Errors
    ///
    /// [`Error::FanOutMismatch`] if `N` doesn't match the layout, or any bus error.
    pub fn read_all<const N: usize>(&mut self, channels: &mut Channels<N>) -> Result<(), Error> {
        self.check_len::<N>()?;
        for index in 0..N {
            let code = self.read(index)?;
            channels.record_read(index, code)?;
        }
        Ok(())
    }

    /// Set one channel to `code` and send it to its DAC.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] without touching the channels, or any bus
    /// error.
    pub fn write<const N: usize>(
        &mut self,
        channels: &mut Channels<N>,
        index: usize,
        code: u16,
    ) -> Result<(), Error> {
        let address = self.locate(index)?;
        channels.set_code(index, code)?;
        self.bus.write(address.chip, address.channel_code(), code)
    }

    /// Read the code of one channel from its DAC.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`], or any bus error.
    pub fn read(&mut self, index: usize) -> Result<u16, Error> {
        let address = self.locate(index)?;
        self.bus.read(address.chip, address.channel_code())
    }

    fn check_len<const N: usize>(&self) -> Result<(), Error> {
        if N == self.fanout.channel_count() {
            Ok(())
        } else {
            Err(Error::FanOutMismatch)
        }
    }
}
