//! Read-back telemetry sent to the host.
//!
//! A report is [`REPORT_START`], one little-endian `u16` per channel in index
//! order, then [`REPORT_END`]. With the default 24 channels that is 50 bytes.

use crate::Error;

/// First byte of a report.
pub const REPORT_START: u8 = 0xAA;
/// Last byte of a report.
pub const REPORT_END: u8 = 0x55;

/// Length of a report carrying `channels` codes.
pub const fn report_len(channels: usize) -> usize {
    2 + 2 * channels
}

/// Encode a report into `out`, returning the number of bytes written.
///
/// # Errors
///
/// [`Error::BufferTooSmall`] if `out` can't hold the report.
pub fn encode_readback_report<I>(codes: I, out: &mut [u8]) -> Result<usize, Error>
where
    I: IntoIterator<Item = u16>,
    I::IntoIter: ExactSizeIterator,
{
    let codes = codes.into_iter();
    let len = report_len(codes.len());
    let out = out.get_mut(..len).ok_or(Error::BufferTooSmall)?;

    out[0] = REPORT_START;
    for (slot, code) in out[1..len - 1].chunks_exact_mut(2).zip(codes) {
        slot.copy_from_slice(&code.to_le_bytes());
    }
    out[len - 1] = REPORT_END;
    Ok(len)
}

/// Check the framing of a report and return an iterator over its codes.
///
/// # Errors
///
/// [`Error::MalformedReport`] if a marker is missing or the payload has an odd
/// number of bytes.
pub fn decode_readback_report(bytes: &[u8]) -> Result<ReportCodes<'_>, Error> {
    match bytes {
        [REPORT_START, payload @ .., REPORT_END] if payload.len() % 2 == 0 => Ok(ReportCodes {
            chunks: payload.chunks_exact(2),
        }),
        _ => Err(Error::MalformedReport),
    }
}

/// Codes carried by a read-back report, in channel order.
#[derive(Debug, Clone)]
pub struct ReportCodes<'a> {
    chunks: core::slice::ChunksExact<'a, u8>,
}

impl Iterator for ReportCodes<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        self.chunks
            .next()
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for ReportCodes<'_> {}
