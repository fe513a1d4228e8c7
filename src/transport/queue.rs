//! FIFO packet queues between the ESP core and the host.

use std::collections::VecDeque;

use super::packet::Packet;

/// A FIFO of owned packets.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            packets: VecDeque::new(),
        }
    }

    /// Append a packet.
    pub fn enqueue(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    /// Take the oldest packet.
    pub fn dequeue(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Look at the oldest packet.
    pub fn peek(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Remove and yield every queued packet, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        self.packets.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo() {
        let mut queue = PacketQueue::new();
        assert!(queue.dequeue().is_none());

        queue.enqueue(Packet::from_payload(b"one"));
        queue.enqueue(Packet::from_payload(b"two"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().map(Packet::payload), Some(&b"one"[..]));

        assert_eq!(queue.dequeue().unwrap().payload(), b"one");
        assert_eq!(queue.dequeue().unwrap().payload(), b"two");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_drain() {
        let mut queue = PacketQueue::new();
        for payload in [&b"a"[..], b"b", b"c"] {
            queue.enqueue(Packet::from_payload(payload));
        }
        let drained: Vec<Vec<u8>> = queue.drain().map(|p| p.to_vec()).collect();
        assert_eq!(drained, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert!(queue.is_empty());
    }
}
