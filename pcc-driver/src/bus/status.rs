//! Status register of the SPI peripheral.

use bit_field::BitField;

/// Snapshot of the SPI peripheral status register.
///
/// Only the flags used by the transaction driver are exposed. Bit positions
/// follow the status register of the bus peripheral on the board's controller.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Status(u32);

impl Status {
    /// RX packet available (RXP).
    pub const RXP: u32 = 1 << 0;
    /// TX packet space available (TXP).
    pub const TXP: u32 = 1 << 1;
    /// End of transfer (EOT).
    pub const EOT: u32 = 1 << 3;
    /// Transmission filled (TXTF).
    pub const TXTF: u32 = 1 << 4;
    /// Flags cleared at the end of every transaction.
    pub const TRANSFER_COMPLETE: u32 = Self::EOT | Self::TXTF;

    /// Wrap a raw register value.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw register value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// A byte can be read from the receive FIFO.
    pub fn rx_available(self) -> bool {
        self.0.get_bit(0)
    }

    /// A byte can be written to the transmit FIFO.
    pub fn tx_space_available(self) -> bool {
        self.0.get_bit(1)
    }

    /// The programmed number of bytes has been shifted out.
    pub fn end_of_transfer(self) -> bool {
        self.0.get_bit(3)
    }

    /// The programmed number of bytes has been written to the FIFO.
    pub fn tx_filled(self) -> bool {
        self.0.get_bit(4)
    }
}
