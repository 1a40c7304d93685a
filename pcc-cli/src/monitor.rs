use anyhow::Result;
use pcc_driver::codec::VoltageScale;
use pcc_driver::report::{REPORT_END, REPORT_START, decode_readback_report, report_len};
use tracing::trace;

use crate::link::Link;

/// Finds read-back reports in the byte stream from the controller.
///
/// The stream may start part way through a report and may carry command echoes
/// between reports, so a report is recognised by its start and end markers sitting
/// exactly one report length apart.
#[derive(Debug)]
pub(crate) struct ReportScanner {
    channels: usize,
    buffer: Vec<u8>,
}

impl ReportScanner {
    pub(crate) fn new(channels: usize) -> Self {
        Self {
            channels,
            buffer: Vec::with_capacity(4 * report_len(channels)),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// The next complete report's codes, dropping everything before it.
    pub(crate) fn next_report(&mut self) -> Option<Vec<u16>> {
        let len = report_len(self.channels);
        let start = self
            .buffer
            .windows(len)
            .position(|window| window[0] == REPORT_START && window[len - 1] == REPORT_END)?;
        let codes = decode_readback_report(&self.buffer[start..start + len])
            .ok()?
            .collect();
        self.buffer.drain(..start + len);
        Some(codes)
    }

    /// Keep the buffer from growing without bound on a noisy line.
    fn trim(&mut self) {
        let keep = report_len(self.channels);
        if self.buffer.len() > 4 * keep {
            let excess = self.buffer.len() - keep;
            trace!(excess, "discarding unframed bytes");
            self.buffer.drain(..excess);
        }
    }
}

/// Print reports as they arrive, until `count` have been printed.
pub(crate) fn run(link: &mut Link, channels: usize, count: Option<usize>) -> Result<()> {
    let scale = VoltageScale::default();
    let mut scanner = ReportScanner::new(channels);
    let mut chunk = [0u8; 256];
    let mut printed = 0;
    while count.is_none_or(|count| printed < count) {
        let n = link.read_some(&mut chunk)?;
        scanner.push(&chunk[..n]);
        while let Some(codes) = scanner.next_report() {
            println!("{}", format_report(&scale, &codes));
            printed += 1;
            if count.is_some_and(|count| printed >= count) {
                return Ok(());
            }
        }
        scanner.trim();
    }
    Ok(())
}

fn format_report(scale: &VoltageScale, codes: &[u16]) -> String {
    codes
        .iter()
        .map(|&code| format!("{:6.3}", scale.to_voltage(code)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use pcc_driver::report::encode_readback_report;

    fn report(codes: &[u16]) -> Vec<u8> {
        let mut out = vec![0u8; report_len(codes.len())];
        encode_readback_report(codes.iter().copied(), &mut out).unwrap();
        out
    }

    #[test]
    fn finds_reports_split_across_reads() {
        let mut scanner = ReportScanner::new(3);
        let bytes = report(&[1, 2, 0xFFFF]);
        scanner.push(&bytes[..5]);
        assert_eq!(scanner.next_report(), None);
        scanner.push(&bytes[5..]);
        assert_eq!(scanner.next_report(), Some(vec![1, 2, 0xFFFF]));
        assert_eq!(scanner.next_report(), None);
    }

    #[test]
    fn skips_echoes_and_partial_reports() {
        let mut scanner = ReportScanner::new(2);
        let first = report(&[10, 20]);
        let second = report(&[30, 40]);
        scanner.push(&first[3..]);
        scanner.push(&[0xAA, 4, 0x02, 0]);
        scanner.push(&first);
        scanner.push(&second);
        assert_eq!(scanner.next_report(), Some(vec![10, 20]));
        assert_eq!(scanner.next_report(), Some(vec![30, 40]));
        assert_eq!(scanner.next_report(), None);
    }

    #[test]
    fn trim_bounds_the_buffer() {
        let mut scanner = ReportScanner::new(2);
        scanner.push(&[0x11; 100]);
        scanner.trim();
        assert_eq!(scanner.buffer.len(), report_len(2));
    }

    #[test]
    fn formats_full_scale() {
        let text = format_report(&VoltageScale::default(), &[0, u16::MAX]);
        assert_eq!(text, " 0.000 30.000");
    }
}
