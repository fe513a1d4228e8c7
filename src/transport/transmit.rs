//! Transmit pass: encode and send the outgoing queue.

use std::io;
use std::time::Instant;

use tracing::{debug, error, trace};

use crate::core::{DatagramSocket, TransportAdapter};

use super::connection::EspTransport;

/// "No buffer space available" as reported by the send call.
#[cfg(unix)]
const ENOBUFS: i32 = libc::ENOBUFS;
#[cfg(windows)]
const ENOBUFS: i32 = windows_sys::Win32::Networking::WinSock::WSAENOBUFS;

/// Whether a send failed because the socket cannot take more right now.
pub(super) fn is_backpressure(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(any(unix, windows))]
    if err.raw_os_error() == Some(ENOBUFS) {
        return true;
    }
    false
}

impl<A, S> EspTransport<A, S>
where
    A: TransportAdapter<S>,
    S: DatagramSocket,
{
    /// Send queued packets until the queue is empty or the socket pushes
    /// back, returning whether anything was dequeued.
    ///
    /// Under backpressure the packet in hand is dropped, the write watch is
    /// set, and the rest of the queue waits for the next pass.
    pub(super) fn transmit_pass(&mut self, now: Instant) -> bool {
        let mut work_done = false;
        self.link.watches.write = false;

        while let Some(mut packet) = self.link.outgoing.dequeue() {
            let encoded = self
                .codec
                .encode(self.link.sessions.outgoing_mut(), &mut packet);
            let wire_len = match encoded {
                Ok(0) => {
                    debug!("ESP codec produced no packet");
                    work_done = true;
                    continue;
                }
                Ok(len) => len,
                Err(err) => {
                    debug!("Failed to encode ESP packet: {}", err);
                    work_done = true;
                    continue;
                }
            };

            match self.link.send_datagram(&packet.frame()[..wire_len]) {
                Ok(_) => {
                    self.link.timers.last_tx = now;
                    trace!("Sent ESP packet of {} bytes", wire_len);
                }
                Err(err) if is_backpressure(&err) => {
                    trace!("ESP socket full, dropping packet");
                    self.link.watches.write = true;
                    return work_done;
                }
                Err(err) => {
                    error!("Failed to send ESP packet: {}", err);
                }
            }
            work_done = true;
        }

        work_done
    }
}
