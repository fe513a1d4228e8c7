//! In-memory collaborators for exercising the transport without a network.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::core::{
    CompressionError, CryptoError, DatagramSocket, Decompress, PacketCodec, TransportAdapter,
    ESP_HEADER_SIZE, ESP_TAG_SIZE, ESP_TRAILER_FIELDS, IV_SIZE,
};
use crate::crypto::{padding_len, KeySession};

use super::link::EspLink;
use super::packet::{NextHeader, Packet};

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    send_script: VecDeque<io::Result<()>>,
}

/// A socket backed by shared queues; clones see the same traffic.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSocket {
    state: Rc<RefCell<MockState>>,
}

impl MockSocket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a datagram for the next receive.
    pub(crate) fn push_inbound(&self, datagram: Vec<u8>) {
        self.state.borrow_mut().inbound.push_back(datagram);
    }

    /// Datagrams still waiting to be received.
    pub(crate) fn inbound_len(&self) -> usize {
        self.state.borrow().inbound.len()
    }

    /// Everything sent so far.
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }

    /// Script the outcome of upcoming sends; unscripted sends succeed.
    pub(crate) fn script_send(&self, result: io::Result<()>) {
        self.state.borrow_mut().send_script.push_back(result);
    }
}

impl DatagramSocket for MockSocket {
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let datagram = self
            .state
            .borrow_mut()
            .inbound
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(len)
    }

    fn try_send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if let Some(result) = state.send_script.pop_front() {
            result?;
        }
        state.sent.push(buf.to_vec());
        Ok(buf.len())
    }
}

/// A codec that frames packets like ESP but leaves them in cleartext.
///
/// Replay tracking and session checks are real; the tag is all zeroes.
#[derive(Debug, Default)]
pub(crate) struct PlainCodec;

impl PacketCodec for PlainCodec {
    fn decode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<(), CryptoError> {
        let seq = packet.sequence();
        session.check_replay(seq)?;
        session.cipher()?;
        session.record_received(seq)
    }

    fn encode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<usize, CryptoError> {
        let payload = packet.to_vec();
        let frame = plain_datagram(
            session.spi(),
            0,
            &payload,
            &padding(padding_len(payload.len())),
            NextHeader::for_payload(&payload).as_byte(),
        );
        if frame.len() > packet.frame().len() {
            return Err(CryptoError::BufferTooSmall {
                needed: frame.len(),
                available: packet.frame().len(),
            });
        }
        session.cipher()?;
        let seq = session.next_sequence()?;
        packet.frame_mut()[..frame.len()].copy_from_slice(&frame);
        packet.set_header(session.spi(), seq);
        Ok(frame.len())
    }
}

/// Standard padding bytes `1..=n`.
pub(crate) fn padding(n: usize) -> Vec<u8> {
    (1..=n as u8).collect()
}

/// A cleartext datagram as [`PlainCodec`] expects it on the wire.
pub(crate) fn plain_datagram(
    spi: u32,
    seq: u32,
    payload: &[u8],
    pad: &[u8],
    next_header: u8,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(ESP_HEADER_SIZE + payload.len() + pad.len() + 2 + ESP_TAG_SIZE);
    out.extend_from_slice(&spi.to_be_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&[0u8; IV_SIZE]);
    out.extend_from_slice(payload);
    out.extend_from_slice(pad);
    out.push(pad.len() as u8);
    out.push(next_header);
    out.extend_from_slice(&[0u8; ESP_TAG_SIZE]);
    debug_assert!(out.len() >= ESP_HEADER_SIZE + ESP_TRAILER_FIELDS + ESP_TAG_SIZE);
    out
}

/// A keyed session usable with either codec.
pub(crate) fn keyed_session(spi: u32) -> KeySession {
    KeySession::new(spi, 0x02, 0x02, &[0x11; 16], &[0x22; 20]).unwrap()
}

/// An adapter that records calls and recognises one probe reply payload.
#[derive(Debug, Default)]
pub(crate) struct RecordingAdapter {
    pub(crate) probes: usize,
    pub(crate) closes: usize,
    pub(crate) probe_reply: Option<Vec<u8>>,
}

impl TransportAdapter<MockSocket> for RecordingAdapter {
    fn send_probes(&mut self, _link: &mut EspLink<MockSocket>) {
        self.probes += 1;
    }

    fn catch_probe(&mut self, _link: &EspLink<MockSocket>, packet: &Packet) -> bool {
        self.probe_reply.as_deref() == Some(packet.payload())
    }

    fn close(&mut self, link: &mut EspLink<MockSocket>) {
        self.closes += 1;
        link.close();
    }
}

/// Run-length decompressor: input is `(count, byte)` pairs.
#[derive(Debug, Default)]
pub(crate) struct RunLengthDecompressor;

impl Decompress for RunLengthDecompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressionError> {
        if input.len() % 2 != 0 {
            return Err(CompressionError::TrailingInput(1));
        }
        let mut written = 0;
        for pair in input.chunks_exact(2) {
            let (count, byte) = (pair[0] as usize, pair[1]);
            let end = written + count;
            if end > output.len() {
                return Err(CompressionError::DecompressionFailed(
                    "output buffer too small".into(),
                ));
            }
            output[written..end].fill(byte);
            written = end;
        }
        Ok(written)
    }
}
