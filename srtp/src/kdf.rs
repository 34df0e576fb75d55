//! SRTP key derivation per
//! [RFC3711 section 4.3](https://tools.ietf.org/html/rfc3711#section-4.3),
//! using the AES-CTR pseudo-random function.
//!
//! ```text
//! packet index ---+
//!                 v
//! +-----------+ master  +--------+ session encr_key
//! | ext       | key     |        |---------->
//! | key mgmt  |-------->|  key   | session auth_key
//! | (not part |         | deriv  |---------->
//! | of SRTP)  |-------->|        | session salt_key
//! +-----------+ master  +--------+---------->
//!               salt
//! ```
//!
//! The derivation forms `key_id = label || index`, XORs it into the low
//! end of the 14-byte master salt, appends two zero octets to make a
//! 16-byte IV and runs AES-CTR over a run of zero bytes. Distinct labels
//! yield the independent session keys and salts.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256};
use ctr::Ctr128BE;

use crate::{CipherId, SrtpError};

type Aes128Ctr = Ctr128BE<Aes128>;
type Aes256Ctr = Ctr128BE<Aes256>;

/// SRTP encryption key derivation label (Ke).
pub const LABEL_RTP_ENCRYPTION: u8 = 0x00;
/// SRTP authentication key derivation label (Ka).
pub const LABEL_RTP_AUTH: u8 = 0x01;
/// SRTP salting key derivation label (Ks).
pub const LABEL_RTP_SALT: u8 = 0x02;
/// SRTCP encryption key derivation label (KCe).
pub const LABEL_RTCP_ENCRYPTION: u8 = 0x03;
/// SRTCP authentication key derivation label (KCa).
pub const LABEL_RTCP_AUTH: u8 = 0x04;
/// SRTCP salting key derivation label (KCs).
pub const LABEL_RTCP_SALT: u8 = 0x05;

const MASTER_SALT_SIZE: usize = 14;
const KEY_ID_SIZE: usize = 7;

/// Session keys and salts for one stream, both directions of the
/// protocol split between RTP and RTCP.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    pub rtp_key: Vec<u8>,
    pub rtp_salt: Vec<u8>,
    pub rtcp_key: Vec<u8>,
    pub rtcp_salt: Vec<u8>,
}

/// Key derivation context: the AES-keyed PRF plus the right-zero-padded
/// master salt.
#[derive(Debug, Clone)]
pub struct Kdf {
    master_key: Vec<u8>,
    master_salt: [u8; MASTER_SALT_SIZE],
}

impl Kdf {
    /// The master key must be 16 or 32 bytes; a master salt shorter than
    /// 14 bytes is zero padded on the right.
    pub fn new(master_key: &[u8], master_salt: &[u8]) -> Result<Self, SrtpError> {
        if !matches!(master_key.len(), 16 | 32) {
            return Err(SrtpError::InvalidField("master key length"));
        }

        if master_salt.len() > MASTER_SALT_SIZE {
            return Err(SrtpError::InvalidField("master salt length"));
        }

        let mut salt = [0u8; MASTER_SALT_SIZE];
        salt[..master_salt.len()].copy_from_slice(master_salt);

        Ok(Self {
            master_key: master_key.to_vec(),
            master_salt: salt,
        })
    }

    /// Derive `size` bytes of key material for `label` at the given
    /// 48-bit packet index. Per-stream derivation passes index 0.
    pub fn derive(&self, label: u8, index: u64, size: usize) -> Vec<u8> {
        let mut key_id = [0u8; KEY_ID_SIZE];
        key_id[0] = label;
        key_id[1..].copy_from_slice(&index.to_be_bytes()[2..]);

        let mut iv = [0u8; 16];
        iv[..MASTER_SALT_SIZE].copy_from_slice(&self.master_salt);
        for (i, id) in key_id.iter().enumerate() {
            iv[MASTER_SALT_SIZE - KEY_ID_SIZE + i] ^= id;
        }

        let mut out = vec![0u8; size];
        match self.master_key.len() {
            16 => Aes128Ctr::new(GenericArray::from_slice(&self.master_key), &iv.into())
                .apply_keystream(&mut out),
            _ => Aes256Ctr::new(GenericArray::from_slice(&self.master_key), &iv.into())
                .apply_keystream(&mut out),
        }

        out
    }

    /// Derive the per-stream key material for `cipher`: RTP and RTCP
    /// keys and salts at index 0.
    pub fn derive_for_stream(&self, cipher: CipherId) -> Result<SessionKeys, SrtpError> {
        let (key_size, salt_size) = match cipher {
            CipherId::AeadAes128Gcm | CipherId::DoubleAeadAes128Gcm => (16, 12),
            CipherId::AeadAes256Gcm | CipherId::DoubleAeadAes256Gcm => (32, 12),
            CipherId::None => {
                return Err(SrtpError::UnsupportedCipher(cipher.into()));
            }
        };

        Ok(SessionKeys {
            rtp_key: self.derive(LABEL_RTP_ENCRYPTION, 0, key_size),
            rtp_salt: self.derive(LABEL_RTP_SALT, 0, salt_size),
            rtcp_key: self.derive(LABEL_RTCP_ENCRYPTION, 0, key_size),
            rtcp_salt: self.derive(LABEL_RTCP_SALT, 0, salt_size),
        })
    }
}
