//! AES-GCM protection for RTP packets per
//! [RFC7714 section 9.1](https://tools.ietf.org/html/rfc7714#section-9.1).
//!
//! The IV is assembled from header fields and the rollover counter, then
//! XORed with the session salt:
//!
//! ```text
//!   0  0  0  0  0  0  0  0  0  0  1  1
//!   0  1  2  3  4  5  6  7  8  9  0  1
//! +--+--+--+--+--+--+--+--+--+--+--+--+
//! |00|00|    SSRC   |     ROC   | SEQ |---+
//! +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!                                         |
//! +--+--+--+--+--+--+--+--+--+--+--+--+   |
//! |         Encryption Salt           |->(+)
//! +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!                                         |
//! +--+--+--+--+--+--+--+--+--+--+--+--+   |
//! |       Initialization Vector       |<--+
//! +--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
//!
//! Everything before the payload offset is authenticated as associated
//! data; the payload region (for the double transform this includes the
//! trailing OHB) is encrypted in place and the 16-byte tag appended.

use aes_gcm::{AeadInPlace, Aes128Gcm, Aes256Gcm, Key, KeyInit, Nonce, Tag};

use crate::{RtpError, RtpPacket, GCM_TAG_SIZE, MTU};

const GCM_IV_SIZE: usize = 12;

impl RtpPacket {
    fn gcm_iv(&self, roc: u32, salt: &[u8]) -> [u8; GCM_IV_SIZE] {
        let mut iv = [0u8; GCM_IV_SIZE];

        iv[2..6].copy_from_slice(&self.as_bytes()[8..12]); // SSRC
        iv[6..10].copy_from_slice(&roc.to_be_bytes()); // ROC
        iv[10..12].copy_from_slice(&self.as_bytes()[2..4]); // SEQ

        for (b, s) in iv.iter_mut().zip(salt) {
            *b ^= s;
        }

        iv
    }

    /// Encrypt the payload region in place and append the authentication
    /// tag. The key length selects AES-128 or AES-256.
    pub fn encrypt_gcm(&mut self, roc: u32, key: &[u8], salt: &[u8]) -> Result<(), RtpError> {
        if salt.len() != GCM_IV_SIZE {
            return Err(RtpError::InvalidField("salt length"));
        }

        let start = self.payload_offset();
        let end = self.buffer.len();
        if start >= end {
            return Err(RtpError::InvalidField("empty payload"));
        }

        if end + GCM_TAG_SIZE > MTU {
            return Err(RtpError::SizeOverflow);
        }

        let iv = self.gcm_iv(roc, salt);
        let nonce = Nonce::from_slice(&iv);

        let (aad, body) = self.buffer.split_at_mut(start);
        let tag = match key.len() {
            16 => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key))
                .encrypt_in_place_detached(nonce, aad, body),
            32 => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
                .encrypt_in_place_detached(nonce, aad, body),
            _ => return Err(RtpError::InvalidField("key length")),
        }
        .map_err(|_| RtpError::AuthFailure)?;

        self.buffer.extend_from_slice(&tag);
        Ok(())
    }

    /// Verify and decrypt the payload region in place, then drop the tag.
    /// The buffer is left untouched when authentication fails.
    pub fn decrypt_gcm(&mut self, roc: u32, key: &[u8], salt: &[u8]) -> Result<(), RtpError> {
        if salt.len() != GCM_IV_SIZE {
            return Err(RtpError::InvalidField("salt length"));
        }

        let start = self.payload_offset();
        let end = self.buffer.len();
        if start + GCM_TAG_SIZE >= end {
            return Err(RtpError::InvalidField("ciphertext shorter than tag"));
        }

        let iv = self.gcm_iv(roc, salt);
        let nonce = Nonce::from_slice(&iv);

        let (aad, body) = self.buffer.split_at_mut(start);
        let (ct, tag) = body.split_at_mut(end - start - GCM_TAG_SIZE);
        let tag = Tag::from_slice(tag);

        match key.len() {
            16 => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key))
                .decrypt_in_place_detached(nonce, aad, ct, tag),
            32 => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
                .decrypt_in_place_detached(nonce, aad, ct, tag),
            _ => return Err(RtpError::InvalidField("key length")),
        }
        .map_err(|_| RtpError::AuthFailure)?;

        self.buffer.truncate(end - GCM_TAG_SIZE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // https://tools.ietf.org/html/rfc7714#section-16.1.1
    const PLAINTEXT: &str = "8040f17b8041f8d35501a0b247616c6c\
                             696120657374206f6d6e697320646976\
                             69736120696e20706172746573207472\
                             6573";
    const KEY: &str = "000102030405060708090a0b0c0d0e0f";
    const SALT: &str = "517569642070726f2071756f";
    const CIPHERTEXT: &str = "8040f17b8041f8d35501a0b2f24de3a3\
                              fb34de6cacba861c9d7e4bcabe633bd5\
                              0d294e6f42a5f47a51c7d19b36de3adf\
                              8833899d7f27beb16a9152cf765ee439\
                              0cce";

    #[test]
    fn rfc7714_encrypt() {
        let mut p = RtpPacket::parse(&hex(PLAINTEXT)).unwrap();
        p.encrypt_gcm(0, &hex(KEY), &hex(SALT)).unwrap();
        assert_eq!(p.as_bytes(), &hex(CIPHERTEXT)[..]);
    }

    #[test]
    fn rfc7714_decrypt() {
        let mut p = RtpPacket::parse(&hex(CIPHERTEXT)).unwrap();
        p.decrypt_gcm(0, &hex(KEY), &hex(SALT)).unwrap();
        assert_eq!(p.as_bytes(), &hex(PLAINTEXT)[..]);
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let mut wire = hex(CIPHERTEXT);
        wire[20] ^= 0x01;

        let mut p = RtpPacket::parse(&wire).unwrap();
        assert_eq!(
            p.decrypt_gcm(0, &hex(KEY), &hex(SALT)),
            Err(RtpError::AuthFailure)
        );
    }

    #[test]
    fn tampered_aad_fails_auth() {
        let mut wire = hex(CIPHERTEXT);
        wire[4] ^= 0x80; // timestamp byte, part of the associated data

        let mut p = RtpPacket::parse(&wire).unwrap();
        assert_eq!(
            p.decrypt_gcm(0, &hex(KEY), &hex(SALT)),
            Err(RtpError::AuthFailure)
        );
    }

    #[test]
    fn round_trip_aes_256() {
        let key = hex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let salt = hex(SALT);

        let mut p = RtpPacket::new(&[0xC8, 11, 12, 13], 8, 22, 33, 44).unwrap();
        let clear = p.as_bytes().to_vec();

        p.encrypt_gcm(7, &key, &salt).unwrap();
        assert_ne!(p.as_bytes(), &clear[..]);

        p.decrypt_gcm(7, &key, &salt).unwrap();
        assert_eq!(p.as_bytes(), &clear[..]);
    }

    #[test]
    fn rejects_bad_key_length() {
        let mut p = RtpPacket::new(&[1, 2, 3], 8, 22, 33, 44).unwrap();
        assert_eq!(
            p.encrypt_gcm(0, &[0u8; 24], &hex(SALT)),
            Err(RtpError::InvalidField("key length"))
        );
    }
}
