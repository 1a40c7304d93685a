//! 24-bit DAC transactions over the shared SPI bus.
//!
//! Every DAC on the board sits on the same SPI bus and has its own chip-select
//! line. A transaction is always three bytes:
//!
//! | Byte | Write                 | Read                         |
//! |------|-----------------------|------------------------------|
//! | 0    | channel address       | `0x80` \| channel address    |
//! | 1    | code high byte        | don't care (code high byte)  |
//! | 2    | code low byte         | don't care (code low byte)   |
//!
//! The peripheral is driven through the register-level [`SpiPeripheral`] trait so
//! that each flag wait can be bounded. A wait that runs out of polls is a bus
//! fault: the peripheral is reset, every chip select released, and
//! [`Error::BusTimeout`] returned.

mod status;

pub use status::Status;

use embedded_hal::digital::OutputPin;

use crate::{BusConfig, ChipSelectPolarity, Error, WriteStrategy};

/// Read flag set in the address byte of a read transaction.
pub const READ_FLAG: u8 = 0x80;
/// Bits of the address byte that carry the channel address.
pub const ADDRESS_MASK: u8 = 0x0F;
/// Number of bytes in every DAC transaction.
pub const TRANSACTION_LEN: u16 = 3;

/// Register-level access to the SPI peripheral.
///
/// Implemented by the board support code for the real peripheral, and by
/// simulated buses in tests. The peripheral is expected to run as a full-duplex
/// master with 8-bit data frames.
pub trait SpiPeripheral {
    /// Enable the peripheral.
    fn enable(&mut self);
    /// Disable the peripheral, aborting any transfer in progress.
    fn disable(&mut self);
    /// Program the number of bytes in each transfer.
    fn set_transfer_size(&mut self, bytes: u16);
    /// Start a master transfer.
    fn start(&mut self);
    /// Read the status register.
    fn status(&mut self) -> Status;
    /// Write one byte to the transmit data register.
    fn write_byte(&mut self, byte: u8);
    /// Write the low 24 bits of `word`, most significant byte first.
    fn write_word(&mut self, word: u32);
    /// Read one byte from the receive data register.
    fn read_byte(&mut self) -> u8;
    /// Clear the given status flags.
    fn clear_flags(&mut self, flags: u32);
}

impl<T: SpiPeripheral + ?Sized> SpiPeripheral for &mut T {
    fn enable(&mut self) {
        T::enable(self)
    }

    fn disable(&mut self) {
        T::disable(self)
    }

    fn set_transfer_size(&mut self, bytes: u16) {
        T::set_transfer_size(self, bytes)
    }

    fn start(&mut self) {
        T::start(self)
    }

    fn status(&mut self) -> Status {
        T::status(self)
    }

    fn write_byte(&mut self, byte: u8) {
        T::write_byte(self, byte)
    }

    fn write_word(&mut self, word: u32) {
        T::write_word(self, word)
    }

    fn read_byte(&mut self) -> u8 {
        T::read_byte(self)
    }

    fn clear_flags(&mut self, flags: u32) {
        T::clear_flags(self, flags)
    }
}

/// Status flag a transaction waits on.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Space in the transmit FIFO (TXP).
    TxSpace,
    /// A received byte (RXP).
    RxData,
    /// End of transfer (EOT).
    EndOfTransfer,
}

impl Stage {
    fn is_ready(self, status: Status) -> bool {
        match self {
            Stage::TxSpace => status.tx_space_available(),
            Stage::RxData => status.rx_available(),
            Stage::EndOfTransfer => status.end_of_transfer(),
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Stage::TxSpace => "transmit space",
            Stage::RxData => "receive data",
            Stage::EndOfTransfer => "end of transfer",
        })
    }
}

/// Bytes of a write transaction.
pub fn write_frame(channel_code: u8, code: u16) -> [u8; 3] {
    let [high, low] = code.to_be_bytes();
    [channel_code & ADDRESS_MASK, high, low]
}

/// Bytes of a read transaction.
pub fn read_frame(channel_code: u8) -> [u8; 3] {
    [READ_FLAG | (channel_code & ADDRESS_MASK), 0x00, 0x00]
}

/// Pack three transaction bytes into the low 24 bits of a word.
pub fn pack_word(frame: [u8; 3]) -> u32 {
    let [address, high, low] = frame;
    u32::from_be_bytes([0, address, high, low])
}

/// Transaction driver for the DACs on one SPI bus.
///
/// `CHIPS` is the number of DACs, one chip-select line each. Only one line is
/// ever asserted, and it is released before any method returns, whether or not
/// the transaction succeeded.
#[derive(Debug)]
pub struct DacBus<SPI, CS, const CHIPS: usize> {
    spi: SPI,
    chip_selects: [CS; CHIPS],
    config: BusConfig,
}

impl<SPI, CS, const CHIPS: usize> DacBus<SPI, CS, CHIPS>
where
    SPI: SpiPeripheral,
    CS: OutputPin,
{
    /// Create the driver. Call [`DacBus::init_bus`] before the first transaction.
    pub fn new(spi: SPI, chip_selects: [CS; CHIPS], config: &BusConfig) -> Self {
        Self {
            spi,
            chip_selects,
            config: *config,
        }
    }

    /// One-time bus set-up: release every chip select, program 24-bit transfers,
    /// and enable the peripheral.
    ///
    /// # Errors
    ///
    /// [`Error::ChipSelect`] if a chip-select line could not be driven.
    pub fn init_bus(&mut self) -> Result<(), Error> {
        for chip in 0..CHIPS {
            self.drive_chip_select(chip, false)?;
        }
        self.spi.set_transfer_size(TRANSACTION_LEN);
        self.spi.enable();
        info!("DAC bus ready: {} chips", CHIPS);
        Ok(())
    }

    /// Write `code` to a channel of one chip.
    ///
    /// `channel_code` is the channel address on the wire; only the low 4 bits
    /// are sent.
    ///
    /// # Errors
    ///
    /// [`Error::ChipOutOfRange`], [`Error::ChipSelect`], or [`Error::BusTimeout`].
    pub fn write(&mut self, chip: usize, channel_code: u8, code: u16) -> Result<(), Error> {
        let frame = write_frame(channel_code, code);
        trace!("write chip {} frame {}", chip, frame);
        self.transaction(chip, |bus| {
            match bus.config.write_strategy() {
                WriteStrategy::Bytes => {
                    for byte in frame {
                        bus.wait_for(chip, Stage::TxSpace)?;
                        bus.spi.write_byte(byte);
                    }
                }
                WriteStrategy::Word => {
                    bus.wait_for(chip, Stage::TxSpace)?;
                    bus.spi.write_word(pack_word(frame));
                }
            }
            bus.wait_for(chip, Stage::EndOfTransfer)
        })
    }

    /// Read the code of a channel of one chip.
    ///
    /// # Errors
    ///
    /// [`Error::ChipOutOfRange`], [`Error::ChipSelect`], or [`Error::BusTimeout`].
    pub fn read(&mut self, chip: usize, channel_code: u8) -> Result<u16, Error> {
        let frame = read_frame(channel_code);
        let code = self.transaction(chip, |bus| {
            let mut received = [0u8; 3];
            for (slot, byte) in received.iter_mut().zip(frame) {
                bus.wait_for(chip, Stage::TxSpace)?;
                bus.spi.write_byte(byte);
                bus.wait_for(chip, Stage::RxData)?;
                *slot = bus.spi.read_byte();
            }
            bus.wait_for(chip, Stage::EndOfTransfer)?;
            let [_, high, low] = received;
            Ok(u16::from_be_bytes([high, low]))
        })?;
        trace!("read chip {} channel {} = {}", chip, channel_code, code);
        Ok(code)
    }

    /// Number of chips on the bus.
    pub const fn chip_count(&self) -> usize {
        CHIPS
    }

    /// Current settings.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Shared access to the peripheral.
    pub fn peripheral(&self) -> &SPI {
        &self.spi
    }

    /// Give back the peripheral and chip-select lines.
    pub fn release(self) -> (SPI, [CS; CHIPS]) {
        (self.spi, self.chip_selects)
    }

    /// Run one transaction body with `chip` selected.
    fn transaction<T>(
        &mut self,
        chip: usize,
        body: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if chip >= CHIPS {
            return Err(Error::ChipOutOfRange(chip));
        }
        if let Err(e) = self.drive_chip_select(chip, true) {
            // Don't leave a half-driven line behind.
            if self.drive_chip_select(chip, false).is_err() {
                error!("could not release chip select {}", chip);
            }
            self.spi.clear_flags(Status::TRANSFER_COMPLETE);
            return Err(e);
        }
        self.spi.start();
        let value = body(self)?;
        // The next transaction must not see this one's end-of-transfer flag,
        // even if the select line is stuck.
        let released = self.drive_chip_select(chip, false);
        self.spi.clear_flags(Status::TRANSFER_COMPLETE);
        released?;
        Ok(value)
    }

    /// Poll the status register until `stage` is ready or the poll limit is hit.
    fn wait_for(&mut self, chip: usize, stage: Stage) -> Result<(), Error> {
        for _ in 0..self.config.max_polls() {
            if stage.is_ready(self.spi.status()) {
                return Ok(());
            }
        }
        warn!("bus timeout waiting for {} on chip {}", stage, chip);
        self.recover();
        Err(Error::BusTimeout { chip, stage })
    }

    /// Put the bus back into a known state after a fault.
    fn recover(&mut self) {
        for chip in 0..CHIPS {
            if self.drive_chip_select(chip, false).is_err() {
                error!("could not release chip select {}", chip);
            }
        }
        self.spi.clear_flags(Status::TRANSFER_COMPLETE);
        self.spi.disable();
        self.spi.set_transfer_size(TRANSACTION_LEN);
        self.spi.enable();
    }

    fn drive_chip_select(&mut self, chip: usize, selected: bool) -> Result<(), Error> {
        let active_low = self.config.polarity() == ChipSelectPolarity::ActiveLow;
        let pin = self
            .chip_selects
            .get_mut(chip)
            .ok_or(Error::ChipOutOfRange(chip))?;
        let result = if selected == active_low {
            pin.set_low()
        } else {
            pin.set_high()
        };
        result.map_err(|_| Error::ChipSelect { chip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_put_address_first_and_code_big_endian() {
        assert_eq!(write_frame(9, 0xABCD), [0x09, 0xAB, 0xCD]);
        assert_eq!(write_frame(0xF8, 0x0102), [0x08, 0x01, 0x02]);
        assert_eq!(read_frame(15), [0x8F, 0x00, 0x00]);
        assert_eq!(read_frame(0x18), [0x88, 0x00, 0x00]);
    }

    #[test]
    fn packed_word_keeps_wire_order() {
        let frame = write_frame(12, 0x1234);
        let word = pack_word(frame);
        assert_eq!(word, 0x000C_1234);
        assert_eq!(word.to_be_bytes()[1..], frame);
    }
}
