//! Simulated SPI peripheral and chip-select pins.
//!
//! The peripheral behaves like a bank of DACs that store written codes and echo
//! them back on reads. Every finished transaction is logged with the chip that
//! was selected when it started.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use pcc_driver::bus::{READ_FLAG, SpiPeripheral};
use pcc_driver::{BusConfig, ChipSelectPolarity, DacArray, DacBus, FanOut, Status};

pub const CHIPS: usize = 3;
pub const CHANNELS: usize = 24;

/// One finished transaction as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub chip: usize,
    pub bytes: [u8; 3],
}

#[derive(Debug, Default)]
pub struct SimState {
    pub active_low: bool,
    pub pin_levels: Vec<bool>,
    pub failing_pin: Option<usize>,
    /// Pin that can be selected but refuses to be released.
    pub stuck_pin: Option<usize>,
    pub most_selected: usize,

    pub enabled: bool,
    pub transfer_size: u16,
    pub enable_count: usize,
    pub disable_count: usize,
    pub cleared_flags: u32,

    pub stall_tx: bool,
    pub stall_rx: bool,
    pub stall_eot: bool,

    current_chip: usize,
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    eot: bool,
    txtf: bool,

    pub registers: HashMap<(usize, u8), u16>,
    pub log: Vec<Transfer>,
}

impl SimState {
    /// Chips whose select line is at its active level.
    pub fn selected(&self) -> Vec<usize> {
        self.pin_levels
            .iter()
            .enumerate()
            .filter(|&(_, &high)| high != self.active_low)
            .map(|(chip, _)| chip)
            .collect()
    }

    /// True while an end-of-transfer flag is left set.
    pub fn end_of_transfer_pending(&self) -> bool {
        self.eot
    }

    fn finish_byte(&mut self, byte: u8) {
        self.tx.push(byte);
        let address = self.tx[0];
        let echo = if address & READ_FLAG != 0 {
            let code = self
                .registers
                .get(&(self.current_chip, address & 0x0F))
                .copied()
                .unwrap_or(0);
            match self.tx.len() {
                2 => code.to_be_bytes()[0],
                3 => code.to_be_bytes()[1],
                _ => 0,
            }
        } else {
            0
        };
        self.rx.push_back(echo);

        if self.tx.len() == usize::from(self.transfer_size) {
            let bytes = [self.tx[0], self.tx[1], self.tx[2]];
            if address & READ_FLAG == 0 {
                self.registers.insert(
                    (self.current_chip, address & 0x0F),
                    u16::from_be_bytes([bytes[1], bytes[2]]),
                );
            }
            self.log.push(Transfer {
                chip: self.current_chip,
                bytes,
            });
            self.txtf = true;
            self.eot = true;
        }
    }
}

pub type Shared = Rc<RefCell<SimState>>;

pub struct SimSpi(pub Shared);

impl SpiPeripheral for SimSpi {
    fn enable(&mut self) {
        let mut state = self.0.borrow_mut();
        state.enabled = true;
        state.enable_count += 1;
    }

    fn disable(&mut self) {
        let mut state = self.0.borrow_mut();
        state.enabled = false;
        state.disable_count += 1;
        state.tx.clear();
        state.rx.clear();
    }

    fn set_transfer_size(&mut self, bytes: u16) {
        self.0.borrow_mut().transfer_size = bytes;
    }

    fn start(&mut self) {
        let mut state = self.0.borrow_mut();
        assert!(state.enabled, "transfer started on a disabled peripheral");
        state.current_chip = state.selected().first().copied().unwrap_or(0);
        state.tx.clear();
        state.rx.clear();
        state.eot = false;
        state.txtf = false;
    }

    fn status(&mut self) -> Status {
        let state = self.0.borrow();
        let mut bits = 0;
        if state.enabled && state.tx.len() < usize::from(state.transfer_size) && !state.stall_tx {
            bits |= Status::TXP;
        }
        if !state.rx.is_empty() && !state.stall_rx {
            bits |= Status::RXP;
        }
        if state.eot && !state.stall_eot {
            bits |= Status::EOT;
        }
        if state.txtf {
            bits |= Status::TXTF;
        }
        Status::from_bits(bits)
    }

    fn write_byte(&mut self, byte: u8) {
        self.0.borrow_mut().finish_byte(byte);
    }

    fn write_word(&mut self, word: u32) {
        let mut state = self.0.borrow_mut();
        for byte in &word.to_be_bytes()[1..] {
            state.finish_byte(*byte);
        }
    }

    fn read_byte(&mut self) -> u8 {
        self.0
            .borrow_mut()
            .rx
            .pop_front()
            .expect("read with an empty receive FIFO")
    }

    fn clear_flags(&mut self, flags: u32) {
        let mut state = self.0.borrow_mut();
        state.cleared_flags |= flags;
        if flags & Status::EOT != 0 {
            state.eot = false;
        }
        if flags & Status::TXTF != 0 {
            state.txtf = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SimPin {
    state: Shared,
    index: usize,
}

impl SimPin {
    fn set(&mut self, high: bool) -> Result<(), PinFault> {
        let mut state = self.state.borrow_mut();
        if state.failing_pin == Some(self.index) {
            return Err(PinFault);
        }
        if state.stuck_pin == Some(self.index) && high == state.active_low {
            return Err(PinFault);
        }
        state.pin_levels[self.index] = high;
        let selected = state.selected().len();
        assert!(selected <= 1, "{selected} chip selects asserted at once");
        state.most_selected = state.most_selected.max(selected);
        Ok(())
    }
}

impl ErrorType for SimPin {
    type Error = PinFault;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}

/// Shared state for a three-chip board with every select line released.
pub fn sim_state(polarity: ChipSelectPolarity) -> Shared {
    let active_low = polarity == ChipSelectPolarity::ActiveLow;
    Rc::new(RefCell::new(SimState {
        active_low,
        pin_levels: vec![active_low; CHIPS],
        ..SimState::default()
    }))
}

pub fn sim_pins(state: &Shared) -> [SimPin; CHIPS] {
    std::array::from_fn(|index| SimPin {
        state: Rc::clone(state),
        index,
    })
}

/// An initialised bus on a fresh simulated board.
pub fn sim_bus(config: &BusConfig) -> (Shared, DacBus<SimSpi, SimPin, CHIPS>) {
    let state = sim_state(config.polarity());
    let mut bus = DacBus::new(SimSpi(Rc::clone(&state)), sim_pins(&state), config);
    bus.init_bus().expect("bus init");
    (state, bus)
}

pub fn sim_array(config: &BusConfig) -> (Shared, DacArray<SimSpi, SimPin, CHIPS>) {
    let (state, bus) = sim_bus(config);
    let array = DacArray::new(bus, FanOut::DEFAULT).expect("default fan-out");
    (state, array)
}
