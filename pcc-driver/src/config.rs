//! Bus driver settings.

/// Default number of status polls before a wait is treated as a bus fault.
///
/// At the bus clock used by the board a 24-bit transfer completes in well under
/// a thousand polls, so this leaves a wide margin.
pub const DEFAULT_MAX_POLLS: u32 = 10_000;

/// Logic level that selects a chip.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelectPolarity {
    /// Chip is selected while its line is low (factory default for the DACs).
    #[default]
    ActiveLow,
    /// Chip is selected while its line is high.
    ActiveHigh,
}

/// How the three bytes of a write transaction are handed to the peripheral.
///
/// Both produce the same bytes on the wire: channel address, code high byte,
/// code low byte.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Three single-byte writes, each waiting for space in the transmit FIFO.
    #[default]
    Bytes,
    /// One packed 24-bit word written in a single data-register access.
    Word,
}

/// Settings for the [`DacBus`] transaction driver.
///
/// This struct offers a builder-like interface. Unchanged fields keep their
/// defaults.
///
/// ```
/// use pcc_driver::{BusConfig, WriteStrategy};
///
/// let mut config = BusConfig::new();
/// config.with_write_strategy(WriteStrategy::Word).with_max_polls(500);
/// assert_eq!(config.max_polls(), 500);
/// ```
///
/// [`DacBus`]: crate::DacBus
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    polarity: ChipSelectPolarity,
    write_strategy: WriteStrategy,
    max_polls: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            polarity: ChipSelectPolarity::default(),
            write_strategy: WriteStrategy::default(),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl BusConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the chip-select polarity.
    pub fn with_polarity(&mut self, polarity: ChipSelectPolarity) -> &mut Self {
        self.polarity = polarity;
        self
    }

    /// Change how write transactions are handed to the peripheral.
    pub fn with_write_strategy(&mut self, strategy: WriteStrategy) -> &mut Self {
        self.write_strategy = strategy;
        self
    }

    /// Change the number of polls allowed for each flag wait.
    ///
    /// A value of 0 is raised to 1 so that a ready flag is always checked once.
    pub fn with_max_polls(&mut self, polls: u32) -> &mut Self {
        self.max_polls = polls.max(1);
        self
    }

    /// Chip-select polarity.
    pub fn polarity(&self) -> ChipSelectPolarity {
        self.polarity
    }

    /// Write transaction strategy.
    pub fn write_strategy(&self) -> WriteStrategy {
        self.write_strategy
    }

    /// Number of polls allowed for each flag wait.
    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }
}
