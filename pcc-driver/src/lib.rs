#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod channel;
pub mod codec;
mod config;
pub mod command;
pub mod controller;
mod error;
pub mod fanout;
pub mod frame;
pub mod ingress;
pub mod report;

pub use bus::{DacBus, SpiPeripheral, Status};
pub use channel::{ChannelState, Channels, Direction, Ramp};
pub use codec::VoltageScale;
pub use command::Command;
pub use config::{BusConfig, ChipSelectPolarity, DEFAULT_MAX_POLLS, WriteStrategy};
pub use controller::Controller;
pub use error::Error;
pub use fanout::{ChipAddress, DacArray, FanOut};
pub use frame::{FrameStatus, InboundFrame, Packet};
pub use ingress::{Ingress, PacketQueue, PacketReceiver};
