use clap::{ArgAction, Parser, value_parser};
use pcc_driver::command::MAX_UPDATE_RATE_HZ;
use pcc_driver::fanout::FanOut;

use crate::util;

/// CLI for the DAC ramp controller
///
/// The controller drives 24 output channels, each ramping from a start voltage
/// to an end voltage over a number of steps. Ramps are configured per channel,
/// then all channels step together once per tick after `start`.
///
/// Voltages are given in volts between 0 and 30 and converted to 16-bit DAC
/// codes before sending. Channels are numbered from 1.
#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct Cli {
    /// Serial port of the controller, e.g. /dev/ttyACM0 or COM3
    #[arg(short, long, global = true)]
    pub(crate) port: Option<String>,
    /// Baud rate used to open the port
    ///
    /// The controller is a USB CDC device, so any value works.
    #[arg(short, long, default_value_t = 115_200, global = true)]
    pub(crate) baud: u32,
    /// Print diagnostic output (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Parser)]
pub(crate) enum Commands {
    /// List serial ports.
    Ports,
    /// Configure the ramp of one channel, or of every channel.
    Configure {
        /// Channel to configure, from 1 to 24.
        #[arg(
            short,
            long,
            value_parser = value_parser!(u8).range(1..=FanOut::DEFAULT.channel_count() as i64),
            required_unless_present = "all",
            conflicts_with = "all"
        )]
        channel: Option<u8>,
        /// Give every channel the same ramp.
        #[arg(long)]
        all: bool,
        /// Start voltage.
        #[arg(value_parser = util::volts)]
        start: f32,
        /// End voltage.
        #[arg(value_parser = util::volts)]
        end: f32,
        /// Number of steps from start to end.
        #[arg(value_parser = value_parser!(u16).range(1..))]
        steps: u16,
        /// Freeze the channel at the end voltage once the ramp is complete.
        #[arg(long)]
        hold: bool,
    },
    /// Start ramping.
    Start,
    /// Stop ramping. Outputs stay at their current voltages.
    Stop,
    /// Set the tick rate in Hz.
    Rate {
        #[arg(value_parser = value_parser!(u32).range(1..=i64::from(MAX_UPDATE_RATE_HZ)))]
        /// Ticks per second, 1 to 200000.
        hz: u32,
    },
    /// Print read-back reports as voltages.
    Monitor {
        /// Stop after this many reports.
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Send a stop command when done.
        #[arg(long)]
        stop: bool,
    },
}
