use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use pcc_driver::Command;
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use tracing::{debug, info, warn};

/// How long to wait for the controller to echo a command.
const ECHO_TIMEOUT: Duration = Duration::from_secs(2);

/// Print every serial port with what is known about it.
pub(crate) fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("could not list serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{}\tUSB {:04x}:{:04x} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}

/// Serial connection to the controller.
pub(crate) struct Link {
    port: Box<dyn SerialPort>,
}

impl Link {
    pub(crate) fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(ECHO_TIMEOUT)
            .open()
            .with_context(|| format!("could not open {path}"))?;
        port.clear(ClearBuffer::All)
            .context("could not clear the port buffers")?;
        info!(path, baud, "connected");
        Ok(Self { port })
    }

    /// Send a command and wait for the controller to echo it back.
    ///
    /// A missing or garbled echo is logged, not treated as an error, since the
    /// command may still have been applied.
    pub(crate) fn send(&mut self, command: &Command) -> Result<()> {
        let packet = command.encode()?;
        self.port
            .write_all(packet.as_bytes())
            .and_then(|()| self.port.flush())
            .with_context(|| format!("could not send {command:?}"))?;
        debug!(bytes = ?packet.as_bytes(), "sent {command:?}");

        let mut echo = vec![0u8; packet.len()];
        match self.port.read_exact(&mut echo) {
            Ok(()) if echo == packet.as_bytes() => debug!("controller confirmed"),
            Ok(()) => warn!(?echo, "unexpected reply from controller"),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!("no confirmation from controller")
            }
            Err(e) => return Err(e).context("could not read confirmation"),
        }
        Ok(())
    }

    /// Read whatever bytes are available, returning 0 if none arrive in time.
    pub(crate) fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e).context("could not read from controller"),
        }
    }
}
