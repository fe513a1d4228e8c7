//! Error types for the ESP transport.

use std::io;

use thiserror::Error;

use crate::transport::TransportState;

/// Configuration errors. These fail fast and have no side effects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Encryption algorithm identifier is not supported.
    #[error("unsupported ESP encryption type 0x{0:02x}")]
    UnsupportedEncryption(u8),

    /// Authentication algorithm identifier is not supported.
    #[error("unsupported ESP authentication type 0x{0:02x}")]
    UnsupportedMac(u8),

    /// Key material has the wrong length for the selected algorithm.
    #[error("invalid {kind} key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Which key ("encryption" or "authentication").
        kind: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
}

/// Errors from the packet codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Integrity tag did not verify.
    #[error("ESP authentication failed")]
    AuthenticationFailed,

    /// Ciphertext could not be decrypted (bad block alignment).
    #[error("ESP decryption failed")]
    DecryptionFailed,

    /// Sequence number already seen or below the replay window.
    #[error("replay detected for sequence {0}")]
    ReplayDetected(u32),

    /// Session has been torn down.
    #[error("no cipher state for session")]
    NoCipherState,

    /// Packet buffer cannot hold the encoded output.
    #[error("packet buffer too small: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Outgoing 32-bit sequence space is exhausted.
    #[error("outgoing sequence exhausted - session must be rekeyed")]
    SequenceExhausted,
}

/// Errors from the decompression primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// Decompression failed.
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Decompressor stopped before consuming all input.
    #[error("{0} bytes of compressed input left unconsumed")]
    TrailingInput(usize),

    /// Compression is not available in this build.
    #[error("compressed packets are not supported")]
    Unsupported,
}

/// Reasons an inbound datagram is discarded.
///
/// None of these leave the receive pass; they are logged and the datagram
/// is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram not longer than header + tag.
    #[error("ESP packet of {0} bytes too short")]
    TooShort(usize),

    /// SPI matches neither incoming session, or the old session's
    /// sequence window has closed.
    #[error("ESP packet with invalid SPI 0x{0:08x}")]
    UnknownSession(u32),

    /// Codec rejected the packet.
    #[error("ESP decode failed: {0}")]
    Decode(#[from] CryptoError),

    /// Next-header byte is not IPv4, IPv6 or compressed.
    #[error("ESP packet with unrecognised payload type {0:02x}")]
    UnknownNextHeader(u8),

    /// Pad-length byte exceeds the payload.
    #[error("invalid padding length {0:02x} in ESP")]
    InvalidPadLength(u8),

    /// Padding bytes are not 1, 2, ..., n.
    #[error("invalid padding bytes in ESP")]
    InvalidPadding,

    /// Compressed payload failed to decompress.
    #[error("decompression of ESP packet failed: {0}")]
    Decompression(#[from] CompressionError),

    /// No memory for the decompressed copy.
    #[error("failed to allocate memory to decompress ESP packet")]
    AllocationFailed,
}

impl PacketError {
    /// Whether the datagram passed authentication before being rejected.
    ///
    /// Rejections after authentication indicate a broken peer rather than
    /// line noise and are logged louder.
    pub fn is_post_authentication(&self) -> bool {
        matches!(
            self,
            PacketError::UnknownNextHeader(_)
                | PacketError::InvalidPadLength(_)
                | PacketError::InvalidPadding
                | PacketError::Decompression(_)
                | PacketError::AllocationFailed
        )
    }
}

/// Top-level ESP transport errors.
#[derive(Debug, Error)]
pub enum EspError {
    /// Operation not permitted in the current transport state.
    #[error("invalid transport state: {0:?}")]
    InvalidState(TransportState),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for transport operations.
pub type EspResult<T> = Result<T, EspError>;
