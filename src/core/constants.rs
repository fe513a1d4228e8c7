//! Protocol constants for the ESP datagram path.
//!
//! Wire sizes follow RFC 4303 with the CBC ciphers of RFC 3602 and the
//! 96-bit truncated HMACs of RFC 2403/2404.

use std::time::Duration;

// =============================================================================
// WIRE SIZES (RFC 4303)
// =============================================================================

/// Security Parameter Index size.
pub const SPI_SIZE: usize = 4;

/// Sequence number size (32-bit, network order).
pub const SEQUENCE_SIZE: usize = 4;

/// CBC initialisation vector size (AES block).
pub const IV_SIZE: usize = 16;

/// Cleartext ESP header: SPI + sequence + IV.
pub const ESP_HEADER_SIZE: usize = SPI_SIZE + SEQUENCE_SIZE + IV_SIZE;

/// Integrity tag size. Both HMAC-MD5-96 and HMAC-SHA1-96 truncate to 12 bytes.
pub const ESP_TAG_SIZE: usize = 12;

/// Trailing pad-length and next-header bytes.
pub const ESP_TRAILER_FIELDS: usize = 2;

/// AES block size, used for padding.
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// Worst-case bytes appended to a payload by encoding (padding, trailer
/// fields and tag).
pub const DEFAULT_PACKET_TRAILER: usize = CIPHER_BLOCK_SIZE + ESP_TRAILER_FIELDS + ESP_TAG_SIZE;

// =============================================================================
// NEXT HEADER VALUES
// =============================================================================

/// IPv4-in-IP payload.
pub const NEXT_HEADER_IPV4: u8 = 0x04;

/// Compressed payload (used for LZO/zstd compressed packets by some gateways).
pub const NEXT_HEADER_COMPRESSED: u8 = 0x05;

/// IPv6 encapsulation.
pub const NEXT_HEADER_IPV6: u8 = 0x29;

// =============================================================================
// ALGORITHM IDENTIFIERS
// =============================================================================

/// AES-128-CBC (RFC 3602).
pub const ENC_AES_128_CBC: u8 = 0x02;

/// AES-256-CBC (RFC 3602).
pub const ENC_AES_256_CBC: u8 = 0x05;

/// HMAC-MD5-96 (RFC 2403).
pub const MAC_HMAC_MD5_96: u8 = 0x01;

/// HMAC-SHA1-96 (RFC 2404).
pub const MAC_HMAC_SHA1_96: u8 = 0x02;

/// HMAC key length for MD5.
pub const MD5_KEY_SIZE: usize = 16;

/// HMAC key length for SHA-1.
pub const SHA1_KEY_SIZE: usize = 20;

// =============================================================================
// RECEIVE SIZING
// =============================================================================

/// Receive buffers are never smaller than this, whatever the negotiated MTU.
///
/// Some gateways send packets larger than the MTU they negotiated, or cannot
/// negotiate one at all.
pub const MIN_RECEIVE_MTU: usize = 2048;

/// Extra room above the negotiated MTU for oversized packets.
pub const RECEIVE_MTU_MARGIN: usize = 256;

// =============================================================================
// SESSION ROTATION
// =============================================================================

/// Default number of sequence numbers an old incoming session is still
/// accepted for after rotation.
pub const OLD_SESSION_SEQUENCE_GRACE: u64 = 32;

/// Anti-replay window size in bits.
pub const REPLAY_WINDOW_SIZE: usize = 128;

// =============================================================================
// TIMING
// =============================================================================

/// Default interval between probe attempts while sleeping.
pub const DEFAULT_ATTEMPT_PERIOD: Duration = Duration::from_secs(60);

/// Compute the receive MTU for a negotiated tunnel MTU.
pub fn receive_mtu(mtu: usize) -> usize {
    usize::max(MIN_RECEIVE_MTU, mtu + RECEIVE_MTU_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(ESP_HEADER_SIZE, 24);
        assert_eq!(ESP_HEADER_SIZE + ESP_TAG_SIZE, 36);
    }

    #[test]
    fn test_receive_mtu_floor() {
        assert_eq!(receive_mtu(1400), MIN_RECEIVE_MTU);
        assert_eq!(receive_mtu(0), MIN_RECEIVE_MTU);
        assert_eq!(receive_mtu(9000), 9256);
    }
}
