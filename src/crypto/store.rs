//! Key-session store: two incoming generations and one outgoing session.
//!
//! The handshake layer installs sessions; the ESP core only selects among
//! them. During rotation the previous incoming session stays usable for a
//! bounded burst of in-flight packets.

use tracing::trace;

use crate::core::{PacketCodec, OLD_SESSION_SEQUENCE_GRACE};

use super::keys::KeySession;

/// Which incoming slot a packet was matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSlot {
    /// The current incoming session.
    Current,
    /// The immediately preceding incoming session.
    Previous,
}

/// Holds exactly three key sessions.
#[derive(Debug)]
pub struct SessionStore {
    incoming: [KeySession; 2],
    /// Index of the current incoming slot.
    current: usize,
    outgoing: KeySession,
    /// Old-session packets are accepted while
    /// `seq + current.sequence_counter() < replay_threshold`.
    replay_threshold: u64,
    /// Sequence grace granted to the old session on rotation.
    grace: u64,
}

impl SessionStore {
    /// Create a store with unkeyed slots.
    pub fn new() -> Self {
        Self::with_grace(OLD_SESSION_SEQUENCE_GRACE)
    }

    /// Create a store granting `grace` sequence numbers to the old incoming
    /// session after each rotation.
    pub fn with_grace(grace: u64) -> Self {
        Self {
            incoming: [KeySession::unkeyed(), KeySession::unkeyed()],
            current: 0,
            outgoing: KeySession::unkeyed(),
            replay_threshold: 0,
            grace,
        }
    }

    /// Index of the current incoming slot (0 or 1).
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The current incoming session.
    pub fn current_incoming(&self) -> &KeySession {
        &self.incoming[self.current]
    }

    /// The previous incoming session.
    pub fn previous_incoming(&self) -> &KeySession {
        &self.incoming[self.current ^ 1]
    }

    /// The incoming session in `slot`.
    pub fn incoming_mut(&mut self, slot: SessionSlot) -> &mut KeySession {
        match slot {
            SessionSlot::Current => &mut self.incoming[self.current],
            SessionSlot::Previous => &mut self.incoming[self.current ^ 1],
        }
    }

    /// The outgoing session.
    pub fn outgoing(&self) -> &KeySession {
        &self.outgoing
    }

    /// The outgoing session, mutably (the codec advances its sequence).
    pub fn outgoing_mut(&mut self) -> &mut KeySession {
        &mut self.outgoing
    }

    /// Sequence bound for the previous incoming session.
    pub fn replay_threshold(&self) -> u64 {
        self.replay_threshold
    }

    /// Override the sequence bound for the previous incoming session.
    pub fn set_replay_threshold(&mut self, threshold: u64) {
        self.replay_threshold = threshold;
    }

    /// Decide which incoming session a packet belongs to.
    ///
    /// The current session always wins. The previous session is only used
    /// while `seq + current.sequence_counter()` is below the replay
    /// threshold, so a burst of old-generation packets right after
    /// rotation still decodes.
    pub fn select_incoming(&self, spi: u32, seq: u32) -> Option<SessionSlot> {
        let current = self.current_incoming();
        if spi == current.spi() {
            return Some(SessionSlot::Current);
        }

        let previous = self.previous_incoming();
        if spi == previous.spi()
            && u64::from(seq).saturating_add(current.sequence_counter()) < self.replay_threshold
        {
            trace!(
                "Received ESP packet from old SPI 0x{:x}, seq {}",
                previous.spi(),
                seq
            );
            return Some(SessionSlot::Previous);
        }

        None
    }

    /// Install a new incoming session and make it current.
    ///
    /// The new session goes into the inactive slot (tearing down what was
    /// there), the replay threshold becomes the superseded session's
    /// sequence counter plus the grace, and the current index flips.
    pub fn install_incoming(&mut self, session: KeySession) {
        let next = self.current ^ 1;
        self.replay_threshold = self.incoming[self.current]
            .sequence_counter()
            .saturating_add(self.grace);
        let mut old = std::mem::replace(&mut self.incoming[next], session);
        old.teardown();
        self.current = next;
    }

    /// Replace the outgoing session.
    pub fn set_outgoing(&mut self, session: KeySession) {
        let mut old = std::mem::replace(&mut self.outgoing, session);
        old.teardown();
    }

    /// Tear down all three sessions through `codec`.
    pub fn teardown_all(&mut self, codec: &dyn PacketCodec) {
        for session in self.incoming.iter_mut() {
            codec.teardown(session);
        }
        codec.teardown(&mut self.outgoing);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
