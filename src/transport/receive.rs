//! Receive pass: drain the socket and turn datagrams into queued packets.

use std::io;
use std::time::Instant;

use tracing::{debug, error, info, trace};

use crate::core::{DatagramSocket, PacketError, TransportAdapter, ESP_HEADER_SIZE, ESP_TAG_SIZE};

use super::connection::EspTransport;
use super::packet::{NextHeader, Packet};
use super::state::{StateEvent, TransportState};

/// What became of an authenticated datagram.
enum Verdict {
    /// Deliver the buffer itself.
    Deliver,
    /// Deliver this freshly decompressed packet; the buffer stays ours.
    Decompressed(Packet),
    /// It was a probe reply; nothing to deliver.
    ProbeReply,
}

impl<A, S> EspTransport<A, S>
where
    A: TransportAdapter<S>,
    S: DatagramSocket,
{
    /// Read every datagram the socket has, returning whether any arrived.
    pub(super) fn receive_pass(&mut self, now: Instant) -> bool {
        let receive_mtu = self.link.config.receive_mtu();
        let capacity = receive_mtu + self.link.config.packet_trailer;
        let mut work_done = false;

        loop {
            let mut packet = match self.link.pending.take() {
                Some(packet) => packet,
                None => match Packet::try_with_capacity(capacity) {
                    Ok(packet) => packet,
                    Err(err) => {
                        error!("Failed to allocate ESP receive buffer: {}", err);
                        break;
                    }
                },
            };

            let received = match self.link.socket.as_ref() {
                Some(socket) => socket.try_recv(packet.frame_mut()),
                None => Err(io::Error::from(io::ErrorKind::NotConnected)),
            };
            let len = match received {
                Ok(len) if len > 0 => len,
                Ok(_) => {
                    self.link.pending = Some(packet);
                    break;
                }
                Err(err) => {
                    if err.kind() != io::ErrorKind::WouldBlock {
                        debug!("ESP receive failed: {}", err);
                    }
                    self.link.pending = Some(packet);
                    break;
                }
            };

            work_done = true;
            self.link.pending = self.process_datagram(packet, len, receive_mtu, now);
        }

        work_done
    }

    /// Handle one datagram of `len` wire bytes, returning the buffer if it
    /// was not handed to the incoming queue.
    fn process_datagram(
        &mut self,
        mut packet: Packet,
        len: usize,
        receive_mtu: usize,
        now: Instant,
    ) -> Option<Packet> {
        match self.decode_datagram(&mut packet, len, receive_mtu, now) {
            Ok(Verdict::Deliver) => {
                self.link.incoming.enqueue(packet);
                None
            }
            Ok(Verdict::Decompressed(decompressed)) => {
                self.link.incoming.enqueue(decompressed);
                Some(packet)
            }
            Ok(Verdict::ProbeReply) => Some(packet),
            Err(err) => {
                log_discard(&err);
                Some(packet)
            }
        }
    }

    fn decode_datagram(
        &mut self,
        packet: &mut Packet,
        len: usize,
        receive_mtu: usize,
        now: Instant,
    ) -> Result<Verdict, PacketError> {
        if len <= ESP_HEADER_SIZE + ESP_TAG_SIZE {
            return Err(PacketError::TooShort(len));
        }
        packet.set_len(len - ESP_HEADER_SIZE - ESP_TAG_SIZE);

        let spi = packet.spi();
        let slot = self
            .link
            .sessions
            .select_incoming(spi, packet.sequence())
            .ok_or(PacketError::UnknownSession(spi))?;

        self.codec
            .decode(self.link.sessions.incoming_mut(slot), packet)?;

        let next_header = packet.strip_trailer()?;
        self.link.timers.last_rx = now;

        if self.adapter.catch_probe(&self.link, packet) {
            if self.link.state == TransportState::Sleeping {
                info!("ESP session established with server");
            }
            self.link.apply(StateEvent::ProbeReply);
            return Ok(Verdict::ProbeReply);
        }

        if next_header == NextHeader::Compressed {
            let mut decompressed =
                Packet::try_with_capacity(receive_mtu + self.link.config.packet_trailer)
                    .map_err(|_| PacketError::AllocationFailed)?;
            let written = self
                .decompressor
                .decompress(packet.payload(), &mut decompressed.data_mut()[..receive_mtu])?;
            decompressed.set_len(written);
            trace!(
                "Received compressed ESP packet of {} bytes, uncompressed to {} bytes",
                packet.len(),
                written
            );
            return Ok(Verdict::Decompressed(decompressed));
        }

        trace!("Received ESP packet of {} bytes", packet.len());
        Ok(Verdict::Deliver)
    }
}

fn log_discard(err: &PacketError) {
    match err {
        PacketError::TooShort(_) => trace!("Discarding {}", err),
        _ if err.is_post_authentication() => error!("Discarding {}", err),
        _ => debug!("Discarding {}", err),
    }
}
