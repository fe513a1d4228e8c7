//! Packet buffers and ESP trailer validation.
//!
//! A [`Packet`] owns a single allocation laid out as the cleartext ESP
//! header followed by the data area:
//!
//! ```text
//! +------------------------+-------------------------------------------+
//! | header (SPI, seq, IV)  | data: payload [len] | room for trailer    |
//! | 24 bytes               |                                           |
//! +------------------------+-------------------------------------------+
//! ```
//!
//! Packets move between owners (receive slot, queues, transmit) by value;
//! whoever holds one last drops it.

use std::collections::TryReserveError;

use crate::core::{
    PacketError, DEFAULT_PACKET_TRAILER, ESP_HEADER_SIZE, ESP_TRAILER_FIELDS,
    NEXT_HEADER_COMPRESSED, NEXT_HEADER_IPV4, NEXT_HEADER_IPV6, SEQUENCE_SIZE, SPI_SIZE,
};

/// ESP next-header values accepted on the datagram path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NextHeader {
    /// IPv4-in-IP.
    Ipv4 = NEXT_HEADER_IPV4,
    /// Compressed payload.
    Compressed = NEXT_HEADER_COMPRESSED,
    /// IPv6 encapsulation.
    Ipv6 = NEXT_HEADER_IPV6,
}

impl NextHeader {
    /// Parse a next-header byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            NEXT_HEADER_IPV4 => Some(Self::Ipv4),
            NEXT_HEADER_COMPRESSED => Some(Self::Compressed),
            NEXT_HEADER_IPV6 => Some(Self::Ipv6),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Next-header for an outgoing IP packet, from its version nibble.
    pub fn for_payload(payload: &[u8]) -> Self {
        match payload.first() {
            Some(byte) if byte & 0xf0 == 0x60 => Self::Ipv6,
            _ => Self::Ipv4,
        }
    }
}

/// An owned packet buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Header area followed by the data area.
    buf: Vec<u8>,
    /// Logical length of the data.
    len: usize,
}

impl Packet {
    /// Allocate a zeroed packet with `capacity` bytes of data area.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; ESP_HEADER_SIZE + capacity],
            len: 0,
        }
    }

    /// Allocate like [`with_capacity`](Packet::with_capacity), reporting
    /// allocation failure instead of aborting.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let total = ESP_HEADER_SIZE + capacity;
        let mut buf = Vec::new();
        buf.try_reserve_exact(total)?;
        buf.resize(total, 0);
        Ok(Self { buf, len: 0 })
    }

    /// Build an outgoing packet from an IP payload, with room for the ESP
    /// trailer.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut packet = Self::with_capacity(payload.len() + DEFAULT_PACKET_TRAILER);
        packet.data_mut()[..payload.len()].copy_from_slice(payload);
        packet.len = payload.len();
        packet
    }

    /// Logical data length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the logical data is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the logical data length, clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.capacity());
    }

    /// Size of the data area.
    pub fn capacity(&self) -> usize {
        self.buf.len() - ESP_HEADER_SIZE
    }

    /// The logical data.
    pub fn payload(&self) -> &[u8] {
        &self.buf[ESP_HEADER_SIZE..ESP_HEADER_SIZE + self.len]
    }

    /// The logical data, mutably.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[ESP_HEADER_SIZE..ESP_HEADER_SIZE + self.len]
    }

    /// The whole data area, regardless of `len`.
    pub fn data(&self) -> &[u8] {
        &self.buf[ESP_HEADER_SIZE..]
    }

    /// The whole data area, mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[ESP_HEADER_SIZE..]
    }

    /// Header and data area as one frame.
    pub fn frame(&self) -> &[u8] {
        &self.buf
    }

    /// Header and data area as one frame, mutably.
    pub fn frame_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Session identifier (SPI) from the header.
    pub fn spi(&self) -> u32 {
        u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
    }

    /// Sequence number from the header.
    pub fn sequence(&self) -> u32 {
        let s = SPI_SIZE;
        u32::from_be_bytes([self.buf[s], self.buf[s + 1], self.buf[s + 2], self.buf[s + 3]])
    }

    /// Write SPI and sequence into the header.
    pub fn set_header(&mut self, spi: u32, seq: u32) {
        self.buf[..SPI_SIZE].copy_from_slice(&spi.to_be_bytes());
        self.buf[SPI_SIZE..SPI_SIZE + SEQUENCE_SIZE].copy_from_slice(&seq.to_be_bytes());
    }

    /// Copy the logical data out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.payload().to_vec()
    }

    /// Validate and strip the decrypted ESP trailer.
    ///
    /// Checks the next-header byte, the pad-length byte, and that the
    /// padding reads `1, 2, ..., pad_len`. On success `len` is trimmed to
    /// the payload and the next-header is returned; on failure `len` is
    /// left alone.
    pub fn strip_trailer(&mut self) -> Result<NextHeader, PacketError> {
        let len = self.len;
        if len < ESP_TRAILER_FIELDS {
            return Err(PacketError::InvalidPadLength(0));
        }

        let data = self.payload();
        let next_header =
            NextHeader::from_byte(data[len - 1]).ok_or(PacketError::UnknownNextHeader(data[len - 1]))?;

        let pad_len = data[len - 2];
        if len <= ESP_TRAILER_FIELDS + pad_len as usize {
            return Err(PacketError::InvalidPadLength(pad_len));
        }

        let payload_len = len - ESP_TRAILER_FIELDS - pad_len as usize;
        let padding = &data[payload_len..payload_len + pad_len as usize];
        if padding.iter().zip(1..=pad_len).any(|(&byte, expected)| byte != expected) {
            return Err(PacketError::InvalidPadding);
        }

        self.len = payload_len;
        Ok(next_header)
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
