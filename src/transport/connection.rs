//! The ESP transport driver.
//!
//! [`EspTransport`] ties an [`EspLink`] to the collaborators that act on it:
//! the owning protocol's adapter, the packet codec, and the decompressor.
//! The host calls [`poll`](EspTransport::poll) whenever the socket is ready
//! or the timeout it was handed last time expires.

use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::core::{
    DatagramSocket, Decompress, EspError, EspResult, PacketCodec, TransportAdapter,
};
use crate::crypto::EspCodec;

use super::config::EspConfig;
use super::keepalive::{check_deadline_after, keepalive_action, KeepaliveAction};
use super::link::EspLink;
use super::packet::Packet;
use super::state::{StateEvent, TransportState};

/// Result of one [`poll`](EspTransport::poll) pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was received, sent or scheduled.
    Idle,
    /// Packets moved or probes went out.
    Progress,
    /// The peer was declared dead and the socket closed; the host must
    /// restart its main loop.
    Restart,
}

impl PollOutcome {
    /// Whether the pass did anything at all.
    pub fn did_work(self) -> bool {
        !matches!(self, PollOutcome::Idle)
    }

    fn from_work(work_done: bool) -> Self {
        if work_done {
            PollOutcome::Progress
        } else {
            PollOutcome::Idle
        }
    }
}

/// The ESP datagram transport.
pub struct EspTransport<A, S> {
    pub(super) link: EspLink<S>,
    pub(super) adapter: A,
    pub(super) codec: Box<dyn PacketCodec>,
    pub(super) decompressor: Box<dyn Decompress>,
}

impl<A, S> EspTransport<A, S>
where
    A: TransportAdapter<S>,
    S: DatagramSocket,
{
    /// Create a transport with the ESP codec and the default decompressor.
    pub fn new(config: EspConfig, adapter: A) -> Self {
        Self {
            link: EspLink::new(config),
            adapter,
            codec: Box::new(EspCodec::new()),
            decompressor: crate::extensions::default_decompressor(),
        }
    }

    /// Replace the packet codec.
    pub fn with_codec(mut self, codec: impl PacketCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replace the decompressor used for compressed payloads.
    pub fn with_decompressor(mut self, decompressor: impl Decompress + 'static) -> Self {
        self.decompressor = Box::new(decompressor);
        self
    }

    /// The link context.
    pub fn link(&self) -> &EspLink<S> {
        &self.link
    }

    /// The link context, mutably.
    pub fn link_mut(&mut self) -> &mut EspLink<S> {
        &mut self.link
    }

    /// The owning protocol's adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The owning protocol's adapter, mutably.
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.link.state
    }

    /// Queue an IP packet for transmission on the next pass.
    pub fn send(&mut self, payload: &[u8]) {
        self.link.outgoing.enqueue(Packet::from_payload(payload));
    }

    /// Take the oldest decoded packet.
    pub fn recv(&mut self) -> Option<Packet> {
        self.link.incoming.dequeue()
    }

    /// Start probing the peer.
    ///
    /// The DPD interval becomes the configured SSL fallback if set, else
    /// `probe_period`, which is also the interval between probe rounds.
    ///
    /// # Errors
    /// [`EspError::InvalidState`] if the transport is disabled or has no
    /// keys.
    pub fn setup(&mut self, probe_period: Duration) -> EspResult<()> {
        self.setup_at(Instant::now(), probe_period)
    }

    pub(super) fn setup_at(&mut self, now: Instant, probe_period: Duration) -> EspResult<()> {
        let state = self.link.state;
        if !state.is_active() {
            return Err(EspError::InvalidState(state));
        }

        self.link.timers.dpd = self.link.config.ssl_fallback.unwrap_or(probe_period);
        self.link.attempt_period = probe_period;

        self.link.sessions.current_incoming().trace_parameters("incoming");
        self.link.sessions.outgoing().trace_parameters("outgoing");

        debug!("Send ESP probes");
        self.send_probes(now);
        Ok(())
    }

    /// Close the datagram socket, keeping the keys.
    pub fn close(&mut self) {
        self.link.close();
    }

    /// Tear down every key session and close the socket.
    ///
    /// The transport ends up in [`TransportState::NoSecret`] unless it was
    /// disabled.
    pub fn shutdown(&mut self) {
        self.link.sessions.teardown_all(self.codec.as_ref());
        self.adapter.close(&mut self.link);
        self.link.pending = None;
        self.link.apply(StateEvent::Shutdown);
    }

    /// Run one pass: probe if due, drain the socket, run the keepalive
    /// scheduler, and flush the outgoing queue.
    ///
    /// `timeout` is only ever shortened, to the next instant this
    /// transport wants to be polled.
    pub fn poll(&mut self, timeout: &mut Duration) -> PollOutcome {
        self.poll_at(Instant::now(), timeout)
    }

    pub(super) fn poll_at(&mut self, now: Instant, timeout: &mut Duration) -> PollOutcome {
        if self.link.state == TransportState::Sleeping {
            let due = check_deadline_after(
                timeout,
                now,
                self.link.probe_started,
                self.link.attempt_period,
            );
            if due || self.link.need_reconnect {
                debug!("Send ESP probes");
                self.send_probes(now);
            }
        }

        if !self.link.is_open() {
            return PollOutcome::Idle;
        }

        let mut work_done = self.receive_pass(now);

        if self.link.state != TransportState::Connected {
            return PollOutcome::from_work(work_done);
        }

        match keepalive_action(&mut self.link.timers, timeout, now) {
            KeepaliveAction::Rekey => {
                error!("Rekey not implemented for ESP");
            }
            KeepaliveAction::DeadPeer => {
                error!("ESP detected dead peer");
                self.adapter.close(&mut self.link);
                self.send_probes(now);
                return PollOutcome::Restart;
            }
            KeepaliveAction::DeadPeerDetectionProbe => {
                debug!("Send ESP probes for DPD");
                self.send_probes(now);
                work_done = true;
            }
            KeepaliveAction::Keepalive => {
                error!("Keepalive not implemented for ESP");
            }
            KeepaliveAction::None => {}
        }

        work_done |= self.transmit_pass(now);
        PollOutcome::from_work(work_done)
    }

    fn send_probes(&mut self, now: Instant) {
        self.adapter.send_probes(&mut self.link);
        self.link.probe_started = now;
        self.link.need_reconnect = false;
    }
}

impl<A, S> std::fmt::Debug for EspTransport<A, S>
where
    A: std::fmt::Debug,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspTransport")
            .field("link", &self.link)
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}
