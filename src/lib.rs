//! # esp-transport
//!
//! The data plane of an ESP-style (RFC 4303) encrypted datagram tunnel,
//! used as the fast path beside a reliable control channel.
//!
//! Once a handshake layer has installed key sessions, the transport:
//!
//! - **Receives**: drains the socket, picks the current or previous
//!   incoming session by SPI, authenticates and decrypts, validates the
//!   ESP trailer, catches probe replies and decompresses payloads
//! - **Transmits**: encodes queued IP packets and sends them, dropping
//!   under socket backpressure instead of blocking
//! - **Detects dead peers**: schedules DPD probes from the receive and
//!   transmit timestamps and reports a dead peer to the host
//! - **Manages lifecycle**: setup, close and shutdown over a small state
//!   machine
//!
//! Key exchange, probe framing and the control channel belong to the
//! owning protocol and plug in through [`TransportAdapter`].
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio UDP socket binding and [`EspTransport::wait`]
//! - `compression` (default): LZO1X decompression of next-header `0x05`
//!   payloads
//! - `zstd`: zstd decompressor for peers that agree on it
//!
//! ## Modules
//!
//! - [`core`]: Collaborator traits, constants and error types
//! - [`crypto`]: Key sessions, replay window and the CBC/HMAC codec
//! - [`transport`]: Receive/transmit pipeline, liveness and lifecycle
//! - [`extensions`]: Payload decompression
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use esp_transport::prelude::*;
//!
//! fn run(socket: std::net::UdpSocket, incoming: KeySession, outgoing: KeySession) -> EspResult<()> {
//!     let mut esp = EspTransport::new(EspConfig::default(), ());
//!     let link = esp.link_mut();
//!     link.sessions_mut().install_incoming(incoming);
//!     link.sessions_mut().set_outgoing(outgoing);
//!     link.apply(StateEvent::KeysInstalled);
//!     link.attach_socket(socket);
//!
//!     esp.setup(Duration::from_secs(30))?;
//!     loop {
//!         let mut timeout = Duration::from_secs(60);
//!         if esp.poll(&mut timeout) == PollOutcome::Restart {
//!             break;
//!         }
//!         while let Some(packet) = esp.recv() {
//!             let _ip = packet.payload();
//!         }
//!         std::thread::sleep(timeout.min(Duration::from_millis(10)));
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Key sessions and packet codec
pub mod crypto;

// Datagram pipeline
pub mod transport;

// Payload decompression
pub mod extensions;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::crypto::{EspCodec, KeySession, SessionSlot, SessionStore};

    pub use crate::transport::{
        EspConfig, EspLink, EspTransport, KeepaliveAction, NextHeader, Packet, PacketQueue,
        PollOutcome, StateEvent, TransportState, Watches,
    };
}

// Re-export commonly used items at crate root
pub use core::{
    DatagramSocket, Decompress, EspError, EspResult, PacketCodec, PacketError, TransportAdapter,
};
pub use crypto::{EspCodec, KeySession};
pub use transport::{EspConfig, EspTransport, Packet, PollOutcome, TransportState};
