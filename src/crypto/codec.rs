//! RFC 4303 ESP codec with AES-CBC encryption and truncated HMAC.
//!
//! Wire format:
//! ```text
//! +--------+--------+----------+---------------------------+-----+----+---------+
//! | SPI    | Seq    | IV       | payload + padding         | pad | nh | tag     |
//! | 4 (BE) | 4 (BE) | 16 bytes | (encrypted)               | len |    | 12 bytes|
//! +--------+--------+----------+---------------------------+-----+----+---------+
//!                              |<-------- encrypted, block aligned ------->|
//! |<------------------------ authenticated ------------------------------->|
//! ```

use aes::{Aes128, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit};
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;

use crate::core::{
    ConfigError, CryptoError, PacketCodec, CIPHER_BLOCK_SIZE, ESP_HEADER_SIZE, ESP_TAG_SIZE,
    ESP_TRAILER_FIELDS, IV_SIZE, SEQUENCE_SIZE, SPI_SIZE,
};
use crate::transport::{NextHeader, Packet};

use super::keys::{EncAlgorithm, KeySession, MacAlgorithm};

/// Key-scheduled block cipher.
#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(alg: EncAlgorithm, key: &[u8]) -> Result<Self, ConfigError> {
        let invalid = |_| ConfigError::InvalidKeyLength {
            kind: "encryption",
            expected: alg.key_len(),
            actual: key.len(),
        };
        Ok(match alg {
            EncAlgorithm::Aes128Cbc => Self::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            EncAlgorithm::Aes256Cbc => Self::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
        })
    }

    /// CBC-encrypt `buf` in place. `buf` must be block aligned.
    fn encrypt(&self, iv: &[u8], buf: &mut [u8]) -> Result<(), CryptoError> {
        let len = buf.len();
        let failed = |_| CryptoError::BufferTooSmall {
            needed: len.next_multiple_of(CIPHER_BLOCK_SIZE),
            available: len,
        };
        match self {
            Self::Aes128(c) => cbc::Encryptor::<Aes128>::inner_iv_slice_init(c.clone(), iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(failed),
            Self::Aes256(c) => cbc::Encryptor::<Aes256>::inner_iv_slice_init(c.clone(), iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(failed),
        }
    }

    /// CBC-decrypt `buf` in place.
    fn decrypt(&self, iv: &[u8], buf: &mut [u8]) -> Result<(), CryptoError> {
        match self {
            Self::Aes128(c) => cbc::Decryptor::<Aes128>::inner_iv_slice_init(c.clone(), iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|_| CryptoError::DecryptionFailed),
            Self::Aes256(c) => cbc::Decryptor::<Aes256>::inner_iv_slice_init(c.clone(), iv)
                .map_err(|_| CryptoError::DecryptionFailed)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|_| CryptoError::DecryptionFailed),
        }
    }
}

/// Keyed HMAC, cloned per packet.
#[derive(Clone)]
enum MacState {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
}

impl MacState {
    fn new(alg: MacAlgorithm, key: &[u8]) -> Result<Self, ConfigError> {
        let invalid = |_| ConfigError::InvalidKeyLength {
            kind: "authentication",
            expected: alg.key_len(),
            actual: key.len(),
        };
        Ok(match alg {
            MacAlgorithm::HmacMd5_96 => {
                Self::Md5(<Hmac<Md5> as Mac>::new_from_slice(key).map_err(invalid)?)
            }
            MacAlgorithm::HmacSha1_96 => {
                Self::Sha1(<Hmac<Sha1> as Mac>::new_from_slice(key).map_err(invalid)?)
            }
        })
    }

    fn sign(&self, data: &[u8]) -> [u8; ESP_TAG_SIZE] {
        match self {
            Self::Md5(m) => truncated_tag(m, data),
            Self::Sha1(m) => truncated_tag(m, data),
        }
    }

    fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        match self {
            Self::Md5(m) => verify_tag(m, data, tag),
            Self::Sha1(m) => verify_tag(m, data, tag),
        }
    }
}

fn truncated_tag<M: Mac + Clone>(mac: &M, data: &[u8]) -> [u8; ESP_TAG_SIZE] {
    let mut mac = mac.clone();
    mac.update(data);
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; ESP_TAG_SIZE];
    tag.copy_from_slice(&full[..ESP_TAG_SIZE]);
    tag
}

fn verify_tag<M: Mac + Clone>(mac: &M, data: &[u8], tag: &[u8]) -> bool {
    let mut mac = mac.clone();
    mac.update(data);
    mac.verify_truncated_left(tag).is_ok()
}

/// Cipher state owned by a [`KeySession`].
#[derive(Clone)]
pub(crate) struct CipherState {
    cipher: BlockCipher,
    mac: MacState,
}

impl CipherState {
    pub(crate) fn new(
        enc: EncAlgorithm,
        mac: MacAlgorithm,
        enc_key: &[u8],
        mac_key: &[u8],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            cipher: BlockCipher::new(enc, enc_key)?,
            mac: MacState::new(mac, mac_key)?,
        })
    }
}

/// Number of padding bytes for a payload so that payload, padding,
/// pad-length and next-header fill whole cipher blocks.
pub fn padding_len(payload_len: usize) -> usize {
    CIPHER_BLOCK_SIZE - 1 - ((payload_len + 1) % CIPHER_BLOCK_SIZE)
}

/// The ESP codec for the CBC/HMAC suites.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspCodec;

impl EspCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }
}

impl PacketCodec for EspCodec {
    fn decode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<(), CryptoError> {
        let seq = packet.sequence();
        let len = packet.len();

        // Replay check first, it costs nothing
        session.check_replay(seq)?;

        {
            let cipher = session.cipher()?;
            let frame = packet.frame_mut();
            if frame.len() < ESP_HEADER_SIZE + len + ESP_TAG_SIZE {
                return Err(CryptoError::BufferTooSmall {
                    needed: ESP_HEADER_SIZE + len + ESP_TAG_SIZE,
                    available: frame.len(),
                });
            }

            let (signed, rest) = frame.split_at_mut(ESP_HEADER_SIZE + len);
            if !cipher.mac.verify(signed, &rest[..ESP_TAG_SIZE]) {
                return Err(CryptoError::AuthenticationFailed);
            }

            let (header, body) = signed.split_at_mut(ESP_HEADER_SIZE);
            cipher
                .cipher
                .decrypt(&header[SPI_SIZE + SEQUENCE_SIZE..], body)?;
        }

        session.record_received(seq)
    }

    fn encode(&self, session: &mut KeySession, packet: &mut Packet) -> Result<usize, CryptoError> {
        let payload_len = packet.len();
        let next_header = NextHeader::for_payload(packet.payload());
        let pad_len = padding_len(payload_len);
        let body_len = payload_len + pad_len + ESP_TRAILER_FIELDS;
        let wire_len = ESP_HEADER_SIZE + body_len + ESP_TAG_SIZE;

        let available = packet.frame_mut().len();
        if available < wire_len {
            return Err(CryptoError::BufferTooSmall {
                needed: wire_len,
                available,
            });
        }

        let spi = session.spi();
        session.cipher()?;
        let seq = session.next_sequence()?;
        let cipher = session.cipher()?;

        let frame = packet.frame_mut();
        frame[..SPI_SIZE].copy_from_slice(&spi.to_be_bytes());
        frame[SPI_SIZE..SPI_SIZE + SEQUENCE_SIZE].copy_from_slice(&seq.to_be_bytes());
        OsRng.fill_bytes(&mut frame[SPI_SIZE + SEQUENCE_SIZE..ESP_HEADER_SIZE]);

        let trailer = ESP_HEADER_SIZE + payload_len;
        for (i, byte) in frame[trailer..trailer + pad_len].iter_mut().enumerate() {
            *byte = (i + 1) as u8;
        }
        frame[trailer + pad_len] = pad_len as u8;
        frame[trailer + pad_len + 1] = next_header.as_byte();

        {
            let (header, body) = frame[..ESP_HEADER_SIZE + body_len].split_at_mut(ESP_HEADER_SIZE);
            cipher
                .cipher
                .encrypt(&header[SPI_SIZE + SEQUENCE_SIZE..SPI_SIZE + SEQUENCE_SIZE + IV_SIZE], body)?;
        }

        let tag = cipher.mac.sign(&frame[..ESP_HEADER_SIZE + body_len]);
        frame[ESP_HEADER_SIZE + body_len..wire_len].copy_from_slice(&tag);

        Ok(wire_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ENC_AES_128_CBC, ENC_AES_256_CBC, MAC_HMAC_MD5_96, MAC_HMAC_SHA1_96, NEXT_HEADER_IPV4,
        NEXT_HEADER_IPV6,
    };

    fn session_pair(enc: u8, mac: u8) -> (KeySession, KeySession) {
        let key_len = if enc == ENC_AES_256_CBC { 32 } else { 16 };
        let mac_len = if mac == MAC_HMAC_MD5_96 { 16 } else { 20 };
        let enc_key = vec![0x11; key_len];
        let mac_key = vec![0x22; mac_len];
        (
            KeySession::new(0x0102_0304, enc, mac, &enc_key, &mac_key).unwrap(),
            KeySession::new(0x0102_0304, enc, mac, &enc_key, &mac_key).unwrap(),
        )
    }

    /// Turn an encoded outgoing packet into what the receive path hands the
    /// codec: a fresh buffer holding the datagram, `len` set to the body.
    fn as_received(packet: &Packet, wire_len: usize) -> Packet {
        let mut rx = Packet::with_capacity(2048);
        rx.frame_mut()[..wire_len].copy_from_slice(&packet.frame()[..wire_len]);
        rx.set_len(wire_len - ESP_HEADER_SIZE - ESP_TAG_SIZE);
        rx
    }

    #[test]
    fn test_padding_len() {
        assert_eq!(padding_len(0), 14);
        assert_eq!(padding_len(14), 0);
        assert_eq!(padding_len(15), 15);
        for len in 0..64 {
            assert_eq!((len + padding_len(len) + 2) % CIPHER_BLOCK_SIZE, 0);
        }
    }

    #[test]
    fn test_codec_roundtrip_all_suites() {
        let codec = EspCodec::new();
        for (enc, mac) in [
            (ENC_AES_128_CBC, MAC_HMAC_SHA1_96),
            (ENC_AES_128_CBC, MAC_HMAC_MD5_96),
            (ENC_AES_256_CBC, MAC_HMAC_SHA1_96),
            (ENC_AES_256_CBC, MAC_HMAC_MD5_96),
        ] {
            let (mut tx, mut rx) = session_pair(enc, mac);
            let payload = [0x45u8, 0x00, 0x00, 0x1c, 0xde, 0xad, 0xbe, 0xef];
            let mut packet = Packet::from_payload(&payload);

            let wire_len = codec.encode(&mut tx, &mut packet).unwrap();
            assert_eq!(wire_len, ESP_HEADER_SIZE + 16 + ESP_TAG_SIZE);
            assert_eq!(packet.spi(), 0x0102_0304);
            assert_eq!(packet.sequence(), 0);
            assert_eq!(tx.sequence_counter(), 1);

            let mut received = as_received(&packet, wire_len);
            codec.decode(&mut rx, &mut received).unwrap();

            let body = received.payload();
            assert_eq!(&body[..payload.len()], &payload);
            let pad_len = body[body.len() - 2] as usize;
            assert_eq!(pad_len, padding_len(payload.len()));
            assert_eq!(body[body.len() - 1], NEXT_HEADER_IPV4);
            assert_eq!(rx.sequence_counter(), 1);
        }
    }

    #[test]
    fn test_codec_ipv6_next_header() {
        let codec = EspCodec::new();
        let (mut tx, mut rx) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        let payload = [0x60u8; 40];
        let mut packet = Packet::from_payload(&payload);
        let wire_len = codec.encode(&mut tx, &mut packet).unwrap();

        let mut received = as_received(&packet, wire_len);
        codec.decode(&mut rx, &mut received).unwrap();
        assert_eq!(received.payload()[received.len() - 1], NEXT_HEADER_IPV6);
    }

    #[test]
    fn test_codec_rejects_tampering() {
        let codec = EspCodec::new();
        let (mut tx, mut rx) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        let mut packet = Packet::from_payload(&[0x45; 30]);
        let wire_len = codec.encode(&mut tx, &mut packet).unwrap();

        let mut received = as_received(&packet, wire_len);
        received.frame_mut()[ESP_HEADER_SIZE + 3] ^= 0x01;
        assert_eq!(
            codec.decode(&mut rx, &mut received),
            Err(CryptoError::AuthenticationFailed)
        );
        assert_eq!(rx.sequence_counter(), 0);
    }

    #[test]
    fn test_codec_rejects_replay() {
        let codec = EspCodec::new();
        let (mut tx, mut rx) = session_pair(ENC_AES_256_CBC, MAC_HMAC_MD5_96);
        let mut packet = Packet::from_payload(&[0x45; 30]);
        let wire_len = codec.encode(&mut tx, &mut packet).unwrap();

        let mut first = as_received(&packet, wire_len);
        codec.decode(&mut rx, &mut first).unwrap();

        let mut again = as_received(&packet, wire_len);
        assert_eq!(
            codec.decode(&mut rx, &mut again),
            Err(CryptoError::ReplayDetected(0))
        );
    }

    #[test]
    fn test_codec_wrong_key_fails() {
        let codec = EspCodec::new();
        let (mut tx, _) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        let mut other =
            KeySession::new(0x0102_0304, ENC_AES_128_CBC, MAC_HMAC_SHA1_96, &[0x11; 16], &[0x33; 20])
                .unwrap();
        let mut packet = Packet::from_payload(&[0x45; 10]);
        let wire_len = codec.encode(&mut tx, &mut packet).unwrap();

        let mut received = as_received(&packet, wire_len);
        assert_eq!(
            codec.decode(&mut other, &mut received),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_codec_torn_down_session() {
        let codec = EspCodec::new();
        let (mut tx, _) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        codec.teardown(&mut tx);

        let mut packet = Packet::from_payload(&[0x45; 10]);
        assert_eq!(
            codec.encode(&mut tx, &mut packet),
            Err(CryptoError::NoCipherState)
        );
        assert_eq!(tx.sequence_counter(), 0);
    }

    #[test]
    fn test_codec_buffer_too_small() {
        let codec = EspCodec::new();
        let (mut tx, _) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        let mut packet = Packet::with_capacity(20);
        packet.set_len(20);
        assert!(matches!(
            codec.encode(&mut tx, &mut packet),
            Err(CryptoError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_codec_misaligned_ciphertext() {
        let codec = EspCodec::new();
        let (_, mut rx) = session_pair(ENC_AES_128_CBC, MAC_HMAC_SHA1_96);
        let cipher = rx.cipher().unwrap().clone();

        // Correctly signed but 17 bytes of ciphertext
        let mut received = Packet::with_capacity(2048);
        received.set_len(17);
        let signed_len = ESP_HEADER_SIZE + 17;
        let tag = cipher.mac.sign(&received.frame()[..signed_len]);
        received.frame_mut()[signed_len..signed_len + ESP_TAG_SIZE].copy_from_slice(&tag);

        assert_eq!(
            codec.decode(&mut rx, &mut received),
            Err(CryptoError::DecryptionFailed)
        );
    }
}
