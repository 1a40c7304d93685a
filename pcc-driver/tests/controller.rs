//! Host packets through to DAC writes.
mod common;

use std::time::Duration;

use common::{CHANNELS, CHIPS, SimPin, SimSpi, sim_array};
use pcc_driver::command::DEFAULT_UPDATE_RATE_HZ;
use pcc_driver::ingress::{self, PacketQueue};
use pcc_driver::report::decode_readback_report;
use pcc_driver::{BusConfig, Command, Controller, Error, Packet, Ramp};

type Board = Controller<SimSpi, SimPin, CHANNELS, CHIPS>;

fn board() -> (common::Shared, Board) {
    let (state, array) = sim_array(&BusConfig::new());
    (state, Controller::new(array).expect("24 channels"))
}

fn packet(bytes: &[u8]) -> Packet {
    Packet::from_slice(bytes).unwrap()
}

/// Configure channel 1 from 1000 to 2500 in 3 steps, start, and tick.
#[test]
fn configured_ramp_reaches_the_dac() -> Result<(), Error> {
    let (state, mut controller) = board();
    let configure = packet(&[0xAA, 12, 0x01, 1, 1, 0x03, 0xE8, 0x09, 0xC4, 0x00, 0x03, 0]);
    controller.handle(&configure)?;
    controller.handle(&packet(&[0xAA, 4, 0x02, 0]))?;
    assert!(controller.is_running());

    let mut written = Vec::new();
    for _ in 0..4 {
        controller.tick()?;
        written.push(state.borrow().registers[&(0, 8)]);
    }
    assert_eq!(written, [1500, 2000, 2500, 2500]);
    assert_eq!(state.borrow().log.len(), 4 * CHANNELS);
    Ok(())
}

/// Ticks do nothing while stopped, and stop keeps the outputs where they are.
#[test]
fn stop_freezes_outputs() -> Result<(), Error> {
    let (state, mut controller) = board();
    controller.tick()?;
    assert!(state.borrow().log.is_empty());

    controller.apply(Command::ConfigureChannel {
        channel: 23,
        ramp: Ramp {
            start_code: 100,
            end_code: 0,
            step_count: 4,
            hold_at_end: false,
        },
    })?;
    controller.apply(Command::Start)?;
    controller.tick()?;
    controller.handle(&packet(&[0xAA, 4, 0x08, 0]))?;
    controller.tick()?;

    assert!(!controller.is_running());
    assert_eq!(controller.channels().get(23).unwrap().current_code(), 75);
    assert_eq!(state.borrow().registers[&(2, 15)], 75);
    Ok(())
}

/// Rejected packets leave the controller as it was.
#[test]
fn bad_packets_change_nothing() {
    let (_, mut controller) = board();
    let before: Vec<_> = controller.channels().iter().copied().collect();

    // Channel 25 doesn't exist.
    let configure = packet(&[0xAA, 12, 0x01, 25, 1, 0, 0, 0, 10, 0, 1, 0]);
    assert_eq!(controller.handle(&configure), Err(Error::ChannelOutOfRange(24)));
    let zero_steps = packet(&[0xAA, 12, 0x01, 2, 1, 0, 0, 0, 10, 0, 0, 0]);
    assert_eq!(controller.handle(&zero_steps), Err(Error::ZeroStepCount));
    let too_fast = packet(&[0xAA, 7, 0x08, 0x0F, 0x42, 0x40, 0]);
    assert_eq!(
        controller.handle(&too_fast),
        Err(Error::UpdateRateOutOfRange(1_000_000))
    );
    assert_eq!(
        controller.handle(&packet(&[0x55, 4, 0x02, 0])),
        Err(Error::BadStartMarker(0x55))
    );

    let after: Vec<_> = controller.channels().iter().copied().collect();
    assert_eq!(before, after);
    assert!(!controller.is_running());
    assert_eq!(controller.update_rate_hz(), DEFAULT_UPDATE_RATE_HZ);
}

/// The update rate sets the tick period.
#[test]
fn update_rate_sets_tick_period() -> Result<(), Error> {
    let (_, mut controller) = board();
    assert_eq!(controller.tick_period(), Duration::from_millis(1));

    let command = controller.handle(&packet(&[0xAA, 7, 0x08, 0x00, 0x4E, 0x20, 0]))?;
    assert_eq!(command, Command::SetUpdateRate(20_000));
    assert_eq!(controller.tick_period(), Duration::from_micros(50));
    Ok(())
}

/// The read-back report carries what the DACs returned.
#[test]
fn readback_report_reflects_dac_contents() -> Result<(), Error> {
    let (state, mut controller) = board();
    controller.set_code(0, 0x0102)?;
    state.borrow_mut().registers.insert((2, 15), 0xABCD);
    controller.refresh_readback()?;

    let mut out = [0u8; Board::REPORT_LEN];
    let len = controller.readback_report(&mut out)?;
    assert_eq!(len, 50);
    assert_eq!(&out[..3], &[0xAA, 0x02, 0x01]);

    let codes: Vec<u16> = decode_readback_report(&out)?.collect();
    assert_eq!(codes.len(), CHANNELS);
    assert_eq!(codes[0], 0x0102);
    assert_eq!(codes[23], 0xABCD);
    assert!(codes[1..23].iter().all(|&code| code == 0));
    Ok(())
}

/// Packets split across transport fragments arrive through the ingress queue.
#[test]
fn fragments_through_ingress_drive_the_controller() -> Result<(), Error> {
    let (state, mut controller) = board();
    let mut queue = PacketQueue::new();
    let (mut ingress, mut packets) = ingress::split(&mut queue);

    let configure = Command::ConfigureChannel {
        channel: 8,
        ramp: Ramp {
            start_code: 0,
            end_code: 900,
            step_count: 3,
            hold_at_end: true,
        },
    }
    .encode()?;
    let (head, tail) = configure.as_bytes().split_at(5);
    ingress.on_fragment(head)?;
    assert!(packets.take().is_none());
    ingress.on_fragment(tail)?;
    while let Some(packet) = packets.take() {
        controller.handle(&packet)?;
    }

    ingress.on_fragment(Command::Start.encode()?.as_bytes())?;
    while let Some(packet) = packets.take() {
        controller.handle(&packet)?;
    }

    controller.tick()?;
    assert_eq!(state.borrow().registers[&(1, 8)], 300);
    Ok(())
}
