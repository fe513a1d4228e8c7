//! Transport state machine and socket readiness watches.

/// Whether the datagram path is active, probing, or established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Datagram path administratively off.
    Disabled,
    /// No key material yet (or torn down).
    NoSecret,
    /// Keys present, socket idle or probing.
    Sleeping,
    /// A probe reply arrived; waiting for the owning protocol to confirm.
    Connecting,
    /// Data flows over the datagram path.
    Connected,
}

/// Inputs to the transport state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Handshake layer installed key sessions.
    KeysInstalled,
    /// A reply to one of our probes was received.
    ProbeReply,
    /// The owning protocol confirmed the datagram path.
    Established,
    /// The datagram socket was closed.
    SocketClosed,
    /// Key material was torn down.
    Shutdown,
    /// The datagram path was switched off.
    Disable,
}

impl TransportState {
    /// Apply an event.
    ///
    /// ```text
    /// any          --Disable-------> Disabled
    /// Disabled     --*-------------> Disabled
    /// any          --Shutdown------> NoSecret
    /// NoSecret     --KeysInstalled-> Sleeping
    /// Sleeping     --ProbeReply----> Connecting
    /// Connecting   --Established---> Connected
    /// Sleeping/Connecting/Connected --SocketClosed--> Sleeping
    /// ```
    /// Anything else leaves the state unchanged.
    pub fn on(self, event: StateEvent) -> Self {
        use StateEvent::*;
        use TransportState::*;

        match (self, event) {
            (_, Disable) => Disabled,
            (Disabled, _) => Disabled,
            (_, Shutdown) => NoSecret,
            (NoSecret, KeysInstalled) => Sleeping,
            (Sleeping, ProbeReply) => Connecting,
            (Connecting, Established) => Connected,
            (Sleeping | Connecting | Connected, SocketClosed) => Sleeping,
            (state, _) => state,
        }
    }

    /// Whether encode/decode and keepalive logic apply in this state.
    pub fn is_active(self) -> bool {
        !matches!(self, TransportState::Disabled | TransportState::NoSecret)
    }
}

/// Readiness the host reactor should wait for on the datagram socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watches {
    /// Wake when a datagram can be read.
    pub read: bool,
    /// Wake when the socket can accept a send.
    pub write: bool,
    /// Wake on socket errors.
    pub except: bool,
}

impl Watches {
    /// Watch for reads and errors, the steady state for an open socket.
    pub fn idle() -> Self {
        Self {
            read: true,
            write: false,
            except: true,
        }
    }

    /// Stop watching everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether anything is watched.
    pub fn any(&self) -> bool {
        self.read || self.write || self.except
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransportState; 5] = [
        TransportState::Disabled,
        TransportState::NoSecret,
        TransportState::Sleeping,
        TransportState::Connecting,
        TransportState::Connected,
    ];

    #[test]
    fn test_state_lifecycle() {
        let state = TransportState::NoSecret.on(StateEvent::KeysInstalled);
        assert_eq!(state, TransportState::Sleeping);
        let state = state.on(StateEvent::ProbeReply);
        assert_eq!(state, TransportState::Connecting);
        let state = state.on(StateEvent::Established);
        assert_eq!(state, TransportState::Connected);
        let state = state.on(StateEvent::SocketClosed);
        assert_eq!(state, TransportState::Sleeping);
        let state = state.on(StateEvent::Shutdown);
        assert_eq!(state, TransportState::NoSecret);
    }

    #[test]
    fn test_disabled_is_sticky() {
        for event in [
            StateEvent::KeysInstalled,
            StateEvent::ProbeReply,
            StateEvent::Established,
            StateEvent::SocketClosed,
            StateEvent::Shutdown,
        ] {
            assert_eq!(TransportState::Disabled.on(event), TransportState::Disabled);
        }
        for state in ALL {
            assert_eq!(state.on(StateEvent::Disable), TransportState::Disabled);
        }
    }

    #[test]
    fn test_socket_closed_keeps_inactive_states() {
        assert_eq!(
            TransportState::NoSecret.on(StateEvent::SocketClosed),
            TransportState::NoSecret
        );
        assert_eq!(
            TransportState::Connecting.on(StateEvent::SocketClosed),
            TransportState::Sleeping
        );
    }

    #[test]
    fn test_probe_reply_only_from_sleeping() {
        assert_eq!(
            TransportState::Connected.on(StateEvent::ProbeReply),
            TransportState::Connected
        );
        assert_eq!(
            TransportState::NoSecret.on(StateEvent::ProbeReply),
            TransportState::NoSecret
        );
    }

    #[test]
    fn test_is_active() {
        let active: Vec<bool> = ALL.iter().map(|s| s.is_active()).collect();
        assert_eq!(active, vec![false, false, true, true, true]);
    }

    #[test]
    fn test_watches() {
        let mut watches = Watches::idle();
        assert!(watches.read && watches.except && !watches.write);
        watches.clear();
        assert!(!watches.any());
    }
}
