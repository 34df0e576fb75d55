//! General header extensions from
//! [RFC8285](https://tools.ietf.org/html/rfc8285) and the client-to-mixer
//! audio level from [RFC6464](https://tools.ietf.org/html/rfc6464).
//!
//! ### One-Byte Header
//!
//! In the one-byte form the 16-bit "defined by profile" value of the RTP
//! header extension takes the fixed pattern 0xBEDE. Each element starts
//! with a byte holding the local id in the high nibble and the data
//! length minus one in the low nibble:
//!
//! ```text
//!  0
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |  ID   |  len  |
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Ids 1-14 carry data; id 0 is a padding byte and id 15 terminates
//! processing of the block. The two-byte form (profile 0x1000-0x100F) is
//! recognized but not implemented.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use crate::{RtpError, RtpPacket};

/// "defined by profile" value selecting the RFC8285 one-byte form.
pub const ONE_BYTE_PROFILE: u16 = 0xBEDE;

const TWO_BYTE_PROFILE: u16 = 0x1000;
const TWO_BYTE_PROFILE_MASK: u16 = 0xFFF0;

/// Extension URI of the RFC6464 client-to-mixer audio level.
pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";

/// Negotiated mapping from extension URI to local id, the `extmap` of the
/// signaling layer. Only the one-byte id range 1-14 is supported.
#[derive(Debug, Clone, Default)]
pub struct ExtensionMap {
    map: HashMap<String, u8>,
}

impl ExtensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: u8, uri: &str) -> Result<(), RtpError> {
        if id == 0 {
            return Err(RtpError::InvalidField("extension id"));
        }

        if id > 14 {
            return Err(RtpError::NotImplemented("two byte extension headers"));
        }

        self.map.insert(uri.to_owned(), id);
        Ok(())
    }

    pub fn id(&self, uri: &str) -> Option<u8> {
        self.map.get(uri).copied()
    }
}

impl RtpPacket {
    /// Write a single one-byte-header general extension element inside a
    /// 0xBEDE block, zero padded to a 32-bit boundary. Only one element
    /// per packet is supported for now; appending to an existing block is
    /// future work.
    pub fn set_general_ext(&mut self, id: u8, data: &[u8]) -> Result<(), RtpError> {
        if id == 0 || id == 15 {
            return Err(RtpError::InvalidField("extension id"));
        }

        if id > 14 {
            return Err(RtpError::NotImplemented("two byte extension headers"));
        }

        if data.is_empty() || data.len() > 16 {
            return Err(RtpError::InvalidField("extension data length"));
        }

        let unpadded = 1 + data.len();
        let pad = (4 - unpadded % 4) % 4;

        let mut ext = BytesMut::with_capacity(unpadded + pad);
        ext.put_u8((id << 4) | (data.len() - 1) as u8);
        ext.put(data);
        ext.put_bytes(0, pad);

        self.set_hdr_ext(ONE_BYTE_PROFILE, &ext)
    }

    /// Look up a one-byte-header general extension element by local id.
    /// Walks the whole block, skipping id-0 padding and stopping at an
    /// id-15 terminator. Two-byte-form blocks yield `None`.
    pub fn general_ext(&self, id: u8) -> Option<&[u8]> {
        let (profile, mut data) = self.hdr_ext()?;

        if profile & TWO_BYTE_PROFILE_MASK == TWO_BYTE_PROFILE {
            return None;
        }

        if profile != ONE_BYTE_PROFILE {
            return None;
        }

        loop {
            let head = *data.first()?;
            let elem_id = head >> 4;

            if elem_id == 0 {
                data = &data[1..];
                continue;
            }

            if elem_id == 15 {
                return None;
            }

            let elem_len = (head & 0x0F) as usize + 1;
            if data.len() < 1 + elem_len {
                return None;
            }

            if elem_id == id {
                return Some(&data[1..1 + elem_len]);
            }

            data = &data[1 + elem_len..];
        }
    }

    /// Write the RFC6464 audio level under the id negotiated for
    /// [`AUDIO_LEVEL_URI`]. `dbov` is the level in dBov, -127..=0.
    pub fn set_audio_level(
        &mut self,
        exts: &ExtensionMap,
        vad: bool,
        dbov: i8,
    ) -> Result<(), RtpError> {
        if !(-127..=0).contains(&dbov) {
            return Err(RtpError::InvalidField("audio level out of range"));
        }

        let id = exts
            .id(AUDIO_LEVEL_URI)
            .ok_or(RtpError::InvalidField("audio level extension not mapped"))?;

        let mut value = dbov.unsigned_abs();
        if vad {
            value |= 0x80;
        }

        self.set_general_ext(id, &[value])
    }

    /// Read the RFC6464 audio level as `(vad, dbov)`.
    pub fn audio_level(&self, exts: &ExtensionMap) -> Option<(bool, i8)> {
        let id = exts.id(AUDIO_LEVEL_URI)?;
        let data = self.general_ext(id)?;

        if data.len() != 1 {
            return None;
        }

        let vad = data[0] & 0x80 > 0;
        let dbov = -((data[0] & 0x7F) as i8);
        Some((vad, dbov))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut p = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();

        p.set_general_ext(10, &[22, 33, 44]).unwrap();
        p.set_payload(&[200, 11, 12, 13]).unwrap();

        assert_eq!(p.general_ext(1), None);
        assert_eq!(p.general_ext(10), Some(&[22u8, 33, 44][..]));
        assert_eq!(p.payload(), &[200, 11, 12, 13]);
    }

    #[test]
    fn word_aligned_element_needs_no_padding() {
        let mut p = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();

        p.set_general_ext(9, &[0xA, 0xB, 0xC, 0xD]).unwrap();
        p.set_payload(&[200, 11, 12, 13]).unwrap();

        assert_eq!(p.hdr_ext_len(), 4 + 8);
        assert_eq!(p.general_ext(9), Some(&[0xAu8, 0xB, 0xC, 0xD][..]));
    }

    // https://tools.ietf.org/html/rfc5285#section-4.2
    #[test]
    fn multi_element_block() {
        let mut p = RtpPacket::new(&[], 8, 22, 33, 44).unwrap();

        p.set_hdr_ext(
            ONE_BYTE_PROFILE,
            &[
                0xA0, 0x01, 0xB1, 0x01, 0x02, 0x00, 0x00, 0xC3, 0x01, 0x02, 0x03, 0x04,
            ],
        )
        .unwrap();

        assert_eq!(p.general_ext(0xA), Some(&[0x01u8][..]));
        assert_eq!(p.general_ext(0xB), Some(&[0x01u8, 0x02][..]));
        assert_eq!(p.general_ext(0xC), Some(&[0x01u8, 0x02, 0x03, 0x04][..]));
        assert_eq!(p.general_ext(1), None);
    }

    #[test]
    fn terminator_stops_the_scan() {
        let mut p = RtpPacket::new(&[], 8, 22, 33, 44).unwrap();

        p.set_hdr_ext(ONE_BYTE_PROFILE, &[0xF0, 0x00, 0xA0, 0x01]).unwrap();
        assert_eq!(p.general_ext(0xA), None);
    }

    #[test]
    fn two_byte_form_is_not_implemented() {
        let mut p = RtpPacket::new(&[], 8, 22, 33, 44).unwrap();

        assert_eq!(
            p.set_general_ext(42, &[1]),
            Err(RtpError::NotImplemented("two byte extension headers"))
        );

        p.set_hdr_ext(0x1002, &[0xA0, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(p.general_ext(0xA), None);
    }

    #[test]
    fn element_size_bounds() {
        let mut p = RtpPacket::new(&[], 8, 22, 33, 44).unwrap();

        assert!(p.set_general_ext(1, &[]).is_err());
        assert!(p.set_general_ext(1, &[0; 17]).is_err());

        p.set_general_ext(1, &[0x55; 16]).unwrap();
        assert_eq!(p.general_ext(1), Some(&[0x55u8; 16][..]));
    }

    #[test]
    fn audio_level() {
        let mut exts = ExtensionMap::new();
        exts.set(11, AUDIO_LEVEL_URI).unwrap();

        let mut p = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();
        p.set_audio_level(&exts, true, -12).unwrap();
        p.set_payload(&[200, 11, 12, 13]).unwrap();

        assert_eq!(p.audio_level(&exts), Some((true, -12)));
        assert_eq!(p.payload(), &[200, 11, 12, 13]);

        // silence, no voice activity
        p.set_audio_level(&exts, false, -127).unwrap();
        p.set_payload(&[200, 11, 12, 13]).unwrap();
        assert_eq!(p.audio_level(&exts), Some((false, -127)));
    }

    #[test]
    fn audio_level_without_mapping() {
        let exts = ExtensionMap::new();
        let mut p = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();

        assert!(p.set_audio_level(&exts, true, -12).is_err());
        assert_eq!(p.audio_level(&exts), None);
    }
}
