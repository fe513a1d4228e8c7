//! ESP transport layer.
//!
//! This module drives the datagram path once keys are in place. It provides:
//!
//! - **Receive pipeline**: session selection, decode, trailer validation,
//!   probe catching and decompression
//! - **Transmit pipeline**: encode and send with backpressure handling
//! - **Liveness**: [`keepalive_action`] scheduling dead peer detection
//! - **Lifecycle**: [`TransportState`] transitions for setup, close and
//!   shutdown
//! - **Sockets**: [`DatagramSocket`](crate::core::DatagramSocket) bindings
//!   for std and tokio UDP sockets
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Owning protocol (probes, handshake)   │
//! ├─────────────────────────────────────────┤
//! │          ESP transport                  │  ← This module
//! │  receive, transmit, DPD, lifecycle      │
//! ├─────────────────────────────────────────┤
//! │   Packet codec (CBC + truncated HMAC)   │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod connection;
mod keepalive;
mod link;
mod packet;
mod queue;
mod receive;
mod socket;
mod state;
mod transmit;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{EspConfig, EspConfigBuilder, DEFAULT_MTU};
pub use connection::{EspTransport, PollOutcome};
pub use keepalive::{
    check_deadline, check_deadline_after, keepalive_action, KeepaliveAction, KeepaliveTimers,
    RekeyMethod,
};
pub use link::EspLink;
pub use packet::{NextHeader, Packet};
pub use queue::PacketQueue;
pub use socket::*;
pub use state::{StateEvent, TransportState, Watches};
