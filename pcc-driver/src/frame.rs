//! Reassembly of host packets from transport fragments.
//!
//! The transport delivers bytes in fragments of arbitrary size. Byte 1 of every
//! packet is its total length, header included, so once two bytes have arrived
//! the frame knows how many more to wait for.

use heapless::Vec;

use crate::Error;

/// Largest packet the frame buffer holds.
pub const FRAME_CAPACITY: usize = 64;
/// Position of the length byte in a packet.
pub const LENGTH_OFFSET: usize = 1;
/// Marker byte plus length byte.
pub const HEADER_LEN: usize = 2;

/// A complete packet, copied out of the frame buffer.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet(Vec<u8, FRAME_CAPACITY>);

impl Packet {
    /// Copy `bytes` into a packet.
    ///
    /// # Errors
    ///
    /// [`Error::FrameOverflow`] if `bytes` is longer than [`FRAME_CAPACITY`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Vec::from_slice(bytes)
            .map(Self)
            .map_err(|_| Error::FrameOverflow)
    }

    /// The packet bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the packet.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a packet with no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Result of feeding bytes to an [`InboundFrame`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// More bytes are needed.
    Accumulating,
    /// The frame holds a complete packet. Returned once per packet.
    Ready,
}

/// Fixed-capacity packet reassembly buffer.
///
/// Moves from empty, through accumulating, to ready. A ready frame refuses
/// further bytes until [`InboundFrame::reset`] is called. Anything malformed is
/// discarded and counted in [`InboundFrame::dropped`].
#[derive(Debug, Clone)]
pub struct InboundFrame {
    buffer: [u8; FRAME_CAPACITY],
    cursor: usize,
    declared: Option<usize>,
    ready: bool,
    dropped: u32,
}

impl Default for InboundFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundFrame {
    /// An empty frame.
    pub const fn new() -> Self {
        Self {
            buffer: [0; FRAME_CAPACITY],
            cursor: 0,
            declared: None,
            ready: false,
            dropped: 0,
        }
    }

    /// Feed one transport fragment.
    ///
    /// Returns [`FrameStatus::Ready`] from the call that delivers the final byte
    /// of a packet. A fragment must not run past the end of the packet it
    /// completes.
    ///
    /// # Errors
    ///
    /// - [`Error::FramePending`]: the frame was already ready. The fragment is
    ///   dropped and the frame is left as it was.
    /// - [`Error::FrameOverflow`]: the declared length exceeds
    ///   [`FRAME_CAPACITY`], or the fragment carries bytes past the declared
    ///   length. The frame is discarded.
    /// - [`Error::FrameLengthInvalid`]: the declared length is shorter than the
    ///   header. The frame is discarded.
    pub fn on_fragment(&mut self, bytes: &[u8]) -> Result<FrameStatus, Error> {
        if self.ready {
            self.dropped = self.dropped.wrapping_add(1);
            return Err(Error::FramePending);
        }
        let mut status = FrameStatus::Accumulating;
        for &byte in bytes {
            if self.ready {
                warn!("fragment of {} bytes runs past the end of a packet", bytes.len());
                self.discard();
                return Err(Error::FrameOverflow);
            }
            status = self.push(byte)?;
        }
        Ok(status)
    }

    /// Feed a single byte.
    ///
    /// # Errors
    ///
    /// As for [`InboundFrame::on_fragment`].
    pub fn push(&mut self, byte: u8) -> Result<FrameStatus, Error> {
        if self.ready {
            self.dropped = self.dropped.wrapping_add(1);
            return Err(Error::FramePending);
        }
        // The declared length is capped at the capacity, so a full buffer is
        // always ready before this point. Guard anyway.
        let Some(slot) = self.buffer.get_mut(self.cursor) else {
            self.discard();
            return Err(Error::FrameOverflow);
        };
        *slot = byte;
        self.cursor += 1;

        if self.cursor == LENGTH_OFFSET + 1 {
            let declared = usize::from(byte);
            if declared > FRAME_CAPACITY {
                warn!("declared packet length {} exceeds buffer", declared);
                self.discard();
                return Err(Error::FrameOverflow);
            }
            if declared < HEADER_LEN {
                warn!("declared packet length {} shorter than header", declared);
                self.discard();
                return Err(Error::FrameLengthInvalid(byte));
            }
            self.declared = Some(declared);
        }

        if self.declared == Some(self.cursor) {
            self.ready = true;
            trace!("packet ready, {} bytes", self.cursor);
            Ok(FrameStatus::Ready)
        } else {
            Ok(FrameStatus::Accumulating)
        }
    }

    /// The completed packet, if the frame is ready.
    pub fn packet(&self) -> Option<&[u8]> {
        self.ready.then(|| &self.buffer[..self.cursor])
    }

    /// True while a completed packet is waiting to be consumed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of bytes received for the current packet.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True if no bytes of a packet have been received.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Declared length of the current packet, once the length byte has arrived.
    pub fn declared_len(&self) -> Option<usize> {
        self.declared
    }

    /// Number of packets or fragments discarded so far.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Return to the empty state, ready for the next packet.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.declared = None;
        self.ready = false;
    }

    fn discard(&mut self) {
        self.dropped = self.dropped.wrapping_add(1);
        self.reset();
    }
}
