//! ESP key sessions and algorithm selection.

use std::fmt;

use tracing::trace;
use zeroize::Zeroize;

use crate::core::{
    ConfigError, CryptoError, ENC_AES_128_CBC, ENC_AES_256_CBC, MAC_HMAC_MD5_96,
    MAC_HMAC_SHA1_96, MD5_KEY_SIZE, SHA1_KEY_SIZE,
};

use super::codec::CipherState;
use super::replay::ReplayWindow;

/// Encryption algorithm negotiated for the ESP path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncAlgorithm {
    /// AES-128-CBC (RFC 3602).
    Aes128Cbc = ENC_AES_128_CBC,
    /// AES-256-CBC (RFC 3602).
    Aes256Cbc = ENC_AES_256_CBC,
}

impl EncAlgorithm {
    /// Parse an encryption identifier.
    pub fn from_byte(byte: u8) -> Result<Self, ConfigError> {
        match byte {
            ENC_AES_128_CBC => Ok(Self::Aes128Cbc),
            ENC_AES_256_CBC => Ok(Self::Aes256Cbc),
            other => Err(ConfigError::UnsupportedEncryption(other)),
        }
    }

    /// Identifier as sent by the gateway.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Required key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes256Cbc => 32,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "AES-128-CBC (RFC3602)",
            Self::Aes256Cbc => "AES-256-CBC (RFC3602)",
        }
    }
}

/// Authentication algorithm negotiated for the ESP path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MacAlgorithm {
    /// HMAC-MD5-96 (RFC 2403).
    HmacMd5_96 = MAC_HMAC_MD5_96,
    /// HMAC-SHA1-96 (RFC 2404).
    HmacSha1_96 = MAC_HMAC_SHA1_96,
}

impl MacAlgorithm {
    /// Parse an authentication identifier.
    pub fn from_byte(byte: u8) -> Result<Self, ConfigError> {
        match byte {
            MAC_HMAC_MD5_96 => Ok(Self::HmacMd5_96),
            MAC_HMAC_SHA1_96 => Ok(Self::HmacSha1_96),
            other => Err(ConfigError::UnsupportedMac(other)),
        }
    }

    /// Identifier as sent by the gateway.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Required key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::HmacMd5_96 => MD5_KEY_SIZE,
            Self::HmacSha1_96 => SHA1_KEY_SIZE,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::HmacMd5_96 => "HMAC-MD5-96 (RFC2403)",
            Self::HmacSha1_96 => "HMAC-SHA-1-96 (RFC2404)",
        }
    }
}

/// Key material and cipher state for one direction of one SPI.
///
/// The cipher state belongs to this record alone and lives until
/// [`teardown`](KeySession::teardown) or drop; key bytes are zeroized at
/// either point.
pub struct KeySession {
    /// Security Parameter Index, host order.
    spi: u32,
    enc: EncAlgorithm,
    mac: MacAlgorithm,
    enc_key: Vec<u8>,
    mac_key: Vec<u8>,
    /// Outgoing: next sequence to send. Incoming: next sequence expected.
    sequence: u64,
    replay: ReplayWindow,
    cipher: Option<CipherState>,
}

impl KeySession {
    /// Create a keyed session.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for unknown algorithm identifiers or key
    /// material of the wrong length.
    pub fn new(
        spi: u32,
        enc: u8,
        mac: u8,
        enc_key: &[u8],
        mac_key: &[u8],
    ) -> Result<Self, ConfigError> {
        let enc = EncAlgorithm::from_byte(enc)?;
        let mac = MacAlgorithm::from_byte(mac)?;

        if enc_key.len() != enc.key_len() {
            return Err(ConfigError::InvalidKeyLength {
                kind: "encryption",
                expected: enc.key_len(),
                actual: enc_key.len(),
            });
        }
        if mac_key.len() != mac.key_len() {
            return Err(ConfigError::InvalidKeyLength {
                kind: "authentication",
                expected: mac.key_len(),
                actual: mac_key.len(),
            });
        }

        let cipher = CipherState::new(enc, mac, enc_key, mac_key)?;

        Ok(Self {
            spi,
            enc,
            mac,
            enc_key: enc_key.to_vec(),
            mac_key: mac_key.to_vec(),
            sequence: 0,
            replay: ReplayWindow::new(),
            cipher: Some(cipher),
        })
    }

    /// A slot placeholder with no key material.
    ///
    /// Every decode and encode against it fails with
    /// [`CryptoError::NoCipherState`].
    pub fn unkeyed() -> Self {
        Self {
            spi: 0,
            enc: EncAlgorithm::Aes128Cbc,
            mac: MacAlgorithm::HmacSha1_96,
            enc_key: Vec::new(),
            mac_key: Vec::new(),
            sequence: 0,
            replay: ReplayWindow::new(),
            cipher: None,
        }
    }

    /// Security Parameter Index (host order).
    pub fn spi(&self) -> u32 {
        self.spi
    }

    /// Encryption algorithm.
    pub fn enc_algorithm(&self) -> EncAlgorithm {
        self.enc
    }

    /// Authentication algorithm.
    pub fn mac_algorithm(&self) -> MacAlgorithm {
        self.mac
    }

    /// Sequence counter: next to send for outgoing sessions, next expected
    /// for incoming ones.
    pub fn sequence_counter(&self) -> u64 {
        self.sequence
    }

    /// Whether the session still holds a cipher state.
    pub fn is_keyed(&self) -> bool {
        self.cipher.is_some()
    }

    pub(crate) fn cipher(&self) -> Result<&CipherState, CryptoError> {
        self.cipher.as_ref().ok_or(CryptoError::NoCipherState)
    }

    /// Reject a sequence number already seen, without recording it.
    pub fn check_replay(&self, seq: u32) -> Result<(), CryptoError> {
        self.replay.check(seq)
    }

    /// Record an authenticated incoming sequence number.
    pub fn record_received(&mut self, seq: u32) -> Result<(), CryptoError> {
        self.replay.check_and_update(seq)?;
        self.sequence = self.replay.next_expected();
        Ok(())
    }

    /// Take the next outgoing sequence number.
    pub fn next_sequence(&mut self) -> Result<u32, CryptoError> {
        let seq = u32::try_from(self.sequence).map_err(|_| CryptoError::SequenceExhausted)?;
        self.sequence += 1;
        Ok(seq)
    }

    /// Zeroize key material and drop the cipher state.
    pub fn teardown(&mut self) {
        self.cipher = None;
        self.enc_key.zeroize();
        self.mac_key.zeroize();
    }

    /// Dump the session parameters at trace level.
    ///
    /// This prints raw key material and exists for debugging interop only.
    pub fn trace_parameters(&self, direction: &str) {
        trace!("Parameters for {} ESP: SPI 0x{:08x}", direction, self.spi);
        trace!(
            "ESP encryption type {} key 0x{}",
            self.enc.name(),
            hex::encode(&self.enc_key)
        );
        trace!(
            "ESP authentication type {} key 0x{}",
            self.mac.name(),
            hex::encode(&self.mac_key)
        );
    }
}

impl Default for KeySession {
    fn default() -> Self {
        Self::unkeyed()
    }
}

impl fmt::Debug for KeySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySession")
            .field("spi", &format_args!("0x{:08x}", self.spi))
            .field("enc", &self.enc)
            .field("mac", &self.mac)
            .field("sequence", &self.sequence)
            .field("keyed", &self.is_keyed())
            .finish()
    }
}

impl Drop for KeySession {
    fn drop(&mut self) {
        self.teardown();
    }
}
