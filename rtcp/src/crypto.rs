//! AES-GCM protection for SRTCP per
//! [RFC7714 section 9.2](https://tools.ietf.org/html/rfc7714#section-9.2).
//!
//! ```text
//!      0  1  2  3  4  5  6  7  8  9 10 11
//!    +--+--+--+--+--+--+--+--+--+--+--+--+
//!    |00|00|    SSRC   |00|00|0+SRTCP Idx|---+
//!    +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!                                            |
//!    +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!    |         Encryption Salt           |->(+)
//!    +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!                                            |
//!    +--+--+--+--+--+--+--+--+--+--+--+--+   |
//!    |       Initialization Vector       |<--+
//!    +--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
//!
//! The associated data is the 8-byte header followed by the ESRTCP word
//! with the E bit set; the body is encrypted in place.

use aes_gcm::{AeadInPlace, Aes128Gcm, Aes256Gcm, Key, KeyInit, Nonce, Tag};

use crate::{
    RtcpError, RtcpPacket, ESRTCP_WORD_SIZE, GCM_TAG_SIZE, MTU, RTCP_HEADER_SIZE,
};

const GCM_IV_SIZE: usize = 12;

impl RtcpPacket {
    pub(crate) fn gcm_iv(&self, salt: &[u8]) -> Result<[u8; GCM_IV_SIZE], RtcpError> {
        let index = self
            .srtcp_index()
            .ok_or(RtcpError::InvalidField("missing esrtcp word"))?;

        let mut iv = [0u8; GCM_IV_SIZE];
        iv[2..6].copy_from_slice(&self.buffer[4..8]); // sender SSRC
        iv[8..12].copy_from_slice(&index.to_be_bytes()); // E bit masked off

        for (b, s) in iv.iter_mut().zip(salt) {
            *b ^= s;
        }

        Ok(iv)
    }

    pub(crate) fn aad(&self) -> Result<[u8; RTCP_HEADER_SIZE + ESRTCP_WORD_SIZE], RtcpError> {
        let word = self
            .appendix
            .ok_or(RtcpError::InvalidField("missing esrtcp word"))?;

        let mut aad = [0u8; RTCP_HEADER_SIZE + ESRTCP_WORD_SIZE];
        aad[..RTCP_HEADER_SIZE].copy_from_slice(&self.buffer[..RTCP_HEADER_SIZE]);
        aad[RTCP_HEADER_SIZE..].copy_from_slice(&word);
        Ok(aad)
    }

    /// Encrypt the body in place and append the authentication tag. The
    /// ESRTCP word must already be stamped; the key length selects
    /// AES-128 or AES-256.
    pub fn encrypt_gcm(&mut self, key: &[u8], salt: &[u8]) -> Result<(), RtcpError> {
        if salt.len() != GCM_IV_SIZE {
            return Err(RtcpError::InvalidField("salt length"));
        }

        if self.buffer.len() + GCM_TAG_SIZE + ESRTCP_WORD_SIZE > MTU {
            return Err(RtcpError::SizeOverflow);
        }

        let iv = self.gcm_iv(salt)?;
        let nonce = Nonce::from_slice(&iv);
        let aad = self.aad()?;

        let body = &mut self.buffer[RTCP_HEADER_SIZE..];
        let tag = match key.len() {
            16 => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key))
                .encrypt_in_place_detached(nonce, &aad, body),
            32 => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
                .encrypt_in_place_detached(nonce, &aad, body),
            _ => return Err(RtcpError::InvalidField("key length")),
        }
        .map_err(|_| RtcpError::AuthFailure)?;

        self.buffer.extend_from_slice(&tag);
        Ok(())
    }

    /// Verify and decrypt the body in place, then drop the tag. Requires
    /// the E flag; the buffer is left untouched when authentication
    /// fails.
    pub fn decrypt_gcm(&mut self, key: &[u8], salt: &[u8]) -> Result<(), RtcpError> {
        if salt.len() != GCM_IV_SIZE {
            return Err(RtcpError::InvalidField("salt length"));
        }

        if !self.e_flag() {
            return Err(RtcpError::InvalidField("encryption flag not set"));
        }

        let end = self.buffer.len();
        if RTCP_HEADER_SIZE + GCM_TAG_SIZE > end {
            return Err(RtcpError::InvalidField("ciphertext shorter than tag"));
        }

        let iv = self.gcm_iv(salt)?;
        let nonce = Nonce::from_slice(&iv);
        let aad = self.aad()?;

        let (ct, tag) = self.buffer[RTCP_HEADER_SIZE..].split_at_mut(end - RTCP_HEADER_SIZE - GCM_TAG_SIZE);
        let tag = Tag::from_slice(tag);

        match key.len() {
            16 => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key))
                .decrypt_in_place_detached(nonce, &aad, ct, tag),
            32 => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
                .decrypt_in_place_detached(nonce, &aad, ct, tag),
            _ => return Err(RtcpError::InvalidField("key length")),
        }
        .map_err(|_| RtcpError::AuthFailure)?;

        self.buffer.truncate(end - GCM_TAG_SIZE);
        Ok(())
    }
}
