//! Collaborator contracts consumed by the ESP core.
//!
//! The core parses untrusted datagrams and schedules liveness probes; the
//! pieces around it (cipher engine, probe/handshake layer, decompression,
//! the socket itself) plug in through these traits.

use std::io;

use super::error::{CompressionError, CryptoError};
use crate::crypto::KeySession;
use crate::transport::{EspLink, Packet};

/// A connected, non-blocking datagram socket.
///
/// Both methods must return immediately. An empty receive queue or a full
/// send buffer is reported as [`io::ErrorKind::WouldBlock`].
pub trait DatagramSocket {
    /// Receive one datagram into `buf`, returning its length.
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send `buf` as one datagram, returning the bytes written.
    fn try_send(&self, buf: &[u8]) -> io::Result<usize>;
}

/// Turns wire datagrams into plaintext and back.
///
/// A received [`Packet`] handed to [`decode`](PacketCodec::decode) holds the
/// cleartext header in its header area and `len()` bytes of ciphertext
/// followed by the integrity tag. On success the ciphertext has been
/// replaced in place by plaintext (payload, padding, pad-length, next
/// header), `len()` unchanged.
pub trait PacketCodec {
    /// Authenticate and decrypt `packet` with `session`.
    fn decode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<(), CryptoError>;

    /// Encrypt `packet` in place, returning the wire length of the frame.
    ///
    /// `Ok(0)` means the codec declined to produce a packet.
    fn encode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<usize, CryptoError>;

    /// Release the cipher state of `session`.
    fn teardown(&self, session: &mut KeySession) {
        session.teardown();
    }
}

/// Probe and socket operations of the protocol that owns this datagram path.
///
/// Every method defaults to "not supported": an adapter only overrides the
/// capabilities it has, and the choice is fixed when the transport is
/// composed.
pub trait TransportAdapter<S: DatagramSocket> {
    /// Open the socket if needed and send liveness probes.
    fn send_probes(&mut self, _link: &mut EspLink<S>) {}

    /// Check whether `packet` is a reply to one of our probes.
    fn catch_probe(&mut self, _link: &EspLink<S>, _packet: &Packet) -> bool {
        false
    }

    /// Close the datagram socket.
    fn close(&mut self, _link: &mut EspLink<S>) {}
}

/// An adapter with no probe, catch or close capability.
impl<S: DatagramSocket> TransportAdapter<S> for () {}

/// Decompression primitive for next-header `0x05` payloads.
pub trait Decompress {
    /// Decompress all of `input` into `output`, returning the bytes written.
    ///
    /// Input that is not fully consumed is an error.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockSocket;
    use crate::transport::{EspConfig, TransportState};

    #[test]
    fn test_unit_adapter_has_no_capabilities() {
        let mut link = EspLink::new(EspConfig::default());
        link.attach_socket(MockSocket::new());
        let packet = Packet::from_payload(&[0x45, 0x00]);

        let mut adapter = ();
        adapter.send_probes(&mut link);
        assert!(!adapter.catch_probe(&link, &packet));
        adapter.close(&mut link);

        assert!(link.is_open());
        assert_eq!(link.state(), TransportState::NoSecret);
    }
}
