//! Configuration for the ESP datagram path.

use std::time::Duration;

use crate::core::{receive_mtu, DEFAULT_PACKET_TRAILER, OLD_SESSION_SEQUENCE_GRACE};

use super::keepalive::RekeyMethod;

/// Default negotiated tunnel MTU.
pub const DEFAULT_MTU: usize = 1400;

/// Datagram path configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EspConfig {
    /// Negotiated tunnel MTU.
    pub mtu: usize,
    /// Bytes reserved after every payload for padding, trailer and tag.
    pub packet_trailer: usize,
    /// Dead peer detection override; when set it replaces the probe period
    /// passed to `setup`.
    pub ssl_fallback: Option<Duration>,
    /// Keepalive interval (zero disables).
    pub keepalive: Duration,
    /// Rekey interval (zero disables).
    pub rekey: Duration,
    /// Rekey method.
    pub rekey_method: RekeyMethod,
    /// Sequence grace for the previous incoming session after rotation.
    pub old_session_grace: u64,
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            packet_trailer: DEFAULT_PACKET_TRAILER,
            ssl_fallback: None,
            keepalive: Duration::ZERO,
            rekey: Duration::ZERO,
            rekey_method: RekeyMethod::None,
            old_session_grace: OLD_SESSION_SEQUENCE_GRACE,
        }
    }
}

impl EspConfig {
    /// Start building a configuration.
    pub fn builder() -> EspConfigBuilder {
        EspConfigBuilder::new()
    }

    /// Receive buffer data size for the configured MTU (without trailer).
    pub fn receive_mtu(&self) -> usize {
        receive_mtu(self.mtu)
    }
}

/// Builder for [`EspConfig`].
#[derive(Debug, Clone, Default)]
pub struct EspConfigBuilder {
    config: EspConfig,
}

impl EspConfigBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self {
            config: EspConfig::default(),
        }
    }

    /// Set the negotiated MTU.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Set the per-packet trailer reservation.
    pub fn packet_trailer(mut self, trailer: usize) -> Self {
        self.config.packet_trailer = trailer;
        self
    }

    /// Override the dead peer detection interval.
    pub fn ssl_fallback(mut self, interval: Duration) -> Self {
        self.config.ssl_fallback = Some(interval);
        self
    }

    /// Set the keepalive interval.
    pub fn keepalive(mut self, interval: Duration) -> Self {
        self.config.keepalive = interval;
        self
    }

    /// Set the rekey interval and method.
    pub fn rekey(mut self, interval: Duration, method: RekeyMethod) -> Self {
        self.config.rekey = interval;
        self.config.rekey_method = method;
        self
    }

    /// Set the old-session sequence grace.
    pub fn old_session_grace(mut self, grace: u64) -> Self {
        self.config.old_session_grace = grace;
        self
    }

    /// Finish building.
    pub fn build(self) -> EspConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EspConfig::builder()
            .mtu(9000)
            .ssl_fallback(Duration::from_secs(5))
            .keepalive(Duration::from_secs(20))
            .rekey(Duration::from_secs(3600), RekeyMethod::NewTunnel)
            .old_session_grace(64)
            .build();

        assert_eq!(config.mtu, 9000);
        assert_eq!(config.receive_mtu(), 9256);
        assert_eq!(config.ssl_fallback, Some(Duration::from_secs(5)));
        assert_eq!(config.keepalive, Duration::from_secs(20));
        assert_eq!(config.rekey_method, RekeyMethod::NewTunnel);
        assert_eq!(config.old_session_grace, 64);
        assert_eq!(config.packet_trailer, DEFAULT_PACKET_TRAILER);
    }

    #[test]
    fn test_config_default() {
        let config = EspConfig::default();
        assert_eq!(config.receive_mtu(), 2048);
        assert!(config.ssl_fallback.is_none());
        assert!(config.keepalive.is_zero());
    }
}
