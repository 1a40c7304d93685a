//! Hand-off of completed packets from the transport to the foreground loop.
//!
//! The transport receive path (usually an interrupt) owns an [`Ingress`], the
//! foreground loop owns the matching [`PacketReceiver`]. They share a
//! single-slot lock-free queue, so the only synchronisation point is "a packet
//! is waiting".

use heapless::spsc::{Consumer, Producer, Queue};

use crate::Error;
use crate::frame::{FrameStatus, InboundFrame, Packet};

/// Backing storage size of the queue. A `heapless` queue of size `N` holds
/// `N - 1` items, so this is a single slot.
pub const QUEUE_SLOTS: usize = 2;

/// Storage shared by an [`Ingress`] and its [`PacketReceiver`].
pub type PacketQueue = Queue<Packet, QUEUE_SLOTS>;

/// Split a queue into its producer and consumer ends.
pub fn split(queue: &mut PacketQueue) -> (Ingress<'_>, PacketReceiver<'_>) {
    let (producer, consumer) = queue.split();
    (
        Ingress {
            frame: InboundFrame::new(),
            producer,
        },
        PacketReceiver { consumer },
    )
}

/// Producer end: reassembles fragments and queues each completed packet.
pub struct Ingress<'a> {
    frame: InboundFrame,
    producer: Producer<'a, Packet, QUEUE_SLOTS>,
}

impl Ingress<'_> {
    /// Feed one transport fragment, returning the number of packets queued.
    ///
    /// A completed packet is moved into the queue and the frame reset straight
    /// away, so a fragment may carry the end of one packet and the start of the
    /// next. If the queue slot is still occupied the completed packet stays in
    /// the frame and is queued by a later call once the slot is free.
    ///
    /// # Errors
    ///
    /// - [`Error::FramePending`]: a completed packet is still waiting for the
    ///   queue slot. The rest of the fragment is dropped.
    /// - Any framing error from [`InboundFrame::push`]. The partial packet and the
    ///   rest of the fragment are dropped.
    pub fn on_fragment(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let mut queued = usize::from(self.flush());
        for &byte in bytes {
            if self.frame.push(byte)? == FrameStatus::Ready && self.flush() {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// True while a completed packet is waiting for the queue slot.
    pub fn is_blocked(&self) -> bool {
        self.frame.is_ready()
    }

    /// Number of packets or fragments discarded so far.
    pub fn dropped(&self) -> u32 {
        self.frame.dropped()
    }

    /// Move a completed packet into the queue. Returns true if one was moved.
    fn flush(&mut self) -> bool {
        let Some(bytes) = self.frame.packet() else {
            return false;
        };
        if !self.producer.ready() {
            return false;
        }
        if let Ok(packet) = Packet::from_slice(bytes) {
            if self.producer.enqueue(packet).is_err() {
                error!("packet queue full after a ready check");
            }
        }
        self.frame.reset();
        true
    }
}

/// Consumer end: hands completed packets to the foreground loop.
pub struct PacketReceiver<'a> {
    consumer: Consumer<'a, Packet, QUEUE_SLOTS>,
}

impl PacketReceiver<'_> {
    /// Take the waiting packet, freeing the slot for the next one.
    pub fn take(&mut self) -> Option<Packet> {
        self.consumer.dequeue()
    }

    /// True if a packet is waiting.
    pub fn is_pending(&self) -> bool {
        self.consumer.ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: [u8; 4] = [0xAA, 4, 2, 0];
    const STOP: [u8; 4] = [0xAA, 4, 6, 0];

    #[test]
    fn fragments_become_one_packet() {
        let mut queue = PacketQueue::new();
        let (mut ingress, mut receiver) = split(&mut queue);

        assert_eq!(ingress.on_fragment(&[0xAA]), Ok(0));
        assert!(!receiver.is_pending());
        assert_eq!(ingress.on_fragment(&[4, 2]), Ok(0));
        assert_eq!(ingress.on_fragment(&[0]), Ok(1));

        assert!(receiver.is_pending());
        assert_eq!(receiver.take().unwrap().as_bytes(), &START);
        assert_eq!(receiver.take(), None);
    }

    #[test]
    fn coalesced_packets_wait_for_the_slot() {
        let mut queue = PacketQueue::new();
        let (mut ingress, mut receiver) = split(&mut queue);

        let mut both = [0u8; 8];
        both[..4].copy_from_slice(&START);
        both[4..].copy_from_slice(&STOP);
        assert_eq!(ingress.on_fragment(&both), Ok(1));
        assert!(ingress.is_blocked());

        // The slot is still full, so the next fragment is refused.
        assert_eq!(ingress.on_fragment(&START), Err(Error::FramePending));
        assert_eq!(ingress.dropped(), 1);

        assert_eq!(receiver.take().unwrap().as_bytes(), &START);
        assert_eq!(ingress.on_fragment(&[]), Ok(1));
        assert!(!ingress.is_blocked());
        assert_eq!(receiver.take().unwrap().as_bytes(), &STOP);
    }

    #[test]
    fn framing_errors_drop_the_rest_of_the_fragment() {
        let mut queue = PacketQueue::new();
        let (mut ingress, mut receiver) = split(&mut queue);

        assert_eq!(
            ingress.on_fragment(&[0xAA, 200, 0xAA, 4, 2, 0]),
            Err(Error::FrameOverflow)
        );
        assert_eq!(receiver.take(), None);
        assert_eq!(ingress.on_fragment(&STOP), Ok(1));
        assert_eq!(receiver.take().unwrap().as_bytes(), &STOP);
        assert_eq!(ingress.dropped(), 1);
    }
}
