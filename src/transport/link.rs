//! The datagram link context: every piece of state the ESP core touches.
//!
//! One [`EspLink`] is owned by one transport and mutated only from the
//! thread driving it. Adapters get a reference to it when they are asked
//! to probe, catch a probe reply, or close the socket.

use std::io;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::{DatagramSocket, DEFAULT_ATTEMPT_PERIOD};
use crate::crypto::SessionStore;

use super::config::EspConfig;
use super::keepalive::KeepaliveTimers;
use super::packet::Packet;
use super::queue::PacketQueue;
use super::state::{StateEvent, TransportState, Watches};

/// Transport state, socket, timers, key sessions and queues.
#[derive(Debug)]
pub struct EspLink<S> {
    pub(super) state: TransportState,
    pub(super) socket: Option<S>,
    pub(super) watches: Watches,
    pub(super) sessions: SessionStore,
    pub(super) timers: KeepaliveTimers,
    /// Interval between probe rounds while sleeping.
    pub(super) attempt_period: Duration,
    /// When the last probe round started.
    pub(super) probe_started: Instant,
    /// Set by the host after roaming; forces a probe round.
    pub(super) need_reconnect: bool,
    pub(super) config: EspConfig,
    /// Reusable receive buffer.
    pub(super) pending: Option<Packet>,
    pub(super) incoming: PacketQueue,
    pub(super) outgoing: PacketQueue,
}

impl<S: DatagramSocket> EspLink<S> {
    /// Create a link with no keys and no socket.
    pub fn new(config: EspConfig) -> Self {
        let now = Instant::now();
        let mut timers = KeepaliveTimers::new(now);
        timers.keepalive = config.keepalive;
        timers.rekey = config.rekey;
        timers.rekey_method = config.rekey_method;

        Self {
            state: TransportState::NoSecret,
            socket: None,
            watches: Watches::default(),
            sessions: SessionStore::with_grace(config.old_session_grace),
            timers,
            attempt_period: DEFAULT_ATTEMPT_PERIOD,
            probe_started: now,
            need_reconnect: false,
            config,
            pending: None,
            incoming: PacketQueue::new(),
            outgoing: PacketQueue::new(),
        }
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Feed an event to the state machine, returning the new state.
    pub fn apply(&mut self, event: StateEvent) -> TransportState {
        self.state = self.state.on(event);
        self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &EspConfig {
        &self.config
    }

    /// The datagram socket, if open.
    pub fn socket(&self) -> Option<&S> {
        self.socket.as_ref()
    }

    /// Whether a datagram socket is open.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Install a freshly opened socket and watch it for reads and errors.
    ///
    /// Any previous socket is dropped.
    pub fn attach_socket(&mut self, socket: S) {
        self.socket = Some(socket);
        self.watches = Watches::idle();
    }

    /// Readiness the host should wait for.
    pub fn watches(&self) -> Watches {
        self.watches
    }

    /// Key sessions.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Key sessions, for the handshake layer to install new ones.
    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    /// Liveness timers.
    pub fn timers(&self) -> &KeepaliveTimers {
        &self.timers
    }

    /// Liveness timers, mutably.
    pub fn timers_mut(&mut self) -> &mut KeepaliveTimers {
        &mut self.timers
    }

    /// Interval between probe rounds while sleeping.
    pub fn attempt_period(&self) -> Duration {
        self.attempt_period
    }

    /// When the last probe round started.
    pub fn probe_started(&self) -> Instant {
        self.probe_started
    }

    /// Ask for a probe round on the next pass (e.g. after roaming).
    pub fn request_reconnect(&mut self) {
        self.need_reconnect = true;
    }

    /// Whether a probe round has been requested.
    pub fn needs_reconnect(&self) -> bool {
        self.need_reconnect
    }

    /// Whether a receive buffer is being kept for the next pass.
    pub fn has_pending_buffer(&self) -> bool {
        self.pending.is_some()
    }

    /// Decoded packets waiting for the host.
    pub fn incoming(&mut self) -> &mut PacketQueue {
        &mut self.incoming
    }

    /// Packets waiting to be encoded and sent.
    pub fn outgoing(&mut self) -> &mut PacketQueue {
        &mut self.outgoing
    }

    /// Close the datagram socket.
    ///
    /// Idempotent. Key sessions survive: after roaming the local address may
    /// have changed and a fresh socket is needed, but the keys are still
    /// good. Demotes an active link to [`TransportState::Sleeping`].
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("Closed ESP socket");
            self.watches.clear();
        }
        self.state = self.state.on(StateEvent::SocketClosed);
    }

    /// Send one datagram on the open socket.
    pub(super) fn send_datagram(&self, frame: &[u8]) -> io::Result<usize> {
        match self.socket.as_ref() {
            Some(socket) => socket.try_send(frame),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }
}
