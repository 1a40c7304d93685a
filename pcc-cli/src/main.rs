use anyhow::{Context, Result};
use clap::Parser;
use pcc_driver::codec::VoltageScale;
use pcc_driver::{Command, FanOut, Ramp};
use tracing_subscriber::EnvFilter;

use cli::Commands;
use link::Link;

mod cli;
mod link;
mod monitor;
mod util;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let channels = FanOut::DEFAULT.channel_count();
    let connect = || {
        let path = cli
            .port
            .as_deref()
            .context("no serial port given, pass one with --port (see `pcc ports`)")?;
        Link::open(path, cli.baud)
    };

    match cli.command {
        Commands::Ports => link::list_ports()?,
        Commands::Configure {
            channel,
            all: _,
            start,
            end,
            steps,
            hold,
        } => {
            let scale = VoltageScale::default();
            let ramp = Ramp {
                start_code: scale.to_code(start),
                end_code: scale.to_code(end),
                step_count: steps,
                hold_at_end: hold,
            };
            let targets = match channel {
                Some(channel) => {
                    let index = usize::from(channel) - 1;
                    index..index + 1
                }
                None => 0..channels,
            };
            let mut link = connect()?;
            for channel in targets {
                link.send(&Command::ConfigureChannel { channel, ramp })?;
            }
        }
        Commands::Start => connect()?.send(&Command::Start)?,
        Commands::Stop => connect()?.send(&Command::Stop)?,
        Commands::Rate { hz } => connect()?.send(&Command::SetUpdateRate(hz))?,
        Commands::Monitor { count, stop } => {
            let mut link = connect()?;
            monitor::run(&mut link, channels, count)?;
            if stop {
                link.send(&Command::Stop)?;
            }
        }
    }
    Ok(())
}

/// Log to stderr. `RUST_LOG` overrides the level picked by `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
