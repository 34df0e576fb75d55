//! ## RTP: A Transport Protocol for Real-Time Applications
//!
//! This crate implements the RTP packet layout described in
//! [RFC3550](https://tools.ietf.org/html/rfc3550#section-5.1), the
//! [RFC8285](https://tools.ietf.org/html/rfc8285) one-byte header
//! extension form together with the
//! [RFC6464](https://tools.ietf.org/html/rfc6464) client-to-mixer audio
//! level, the Original Header Block trailer of the PERC
//! [double transform](https://datatracker.ietf.org/doc/draft-ietf-perc-double/),
//! and AES-GCM payload protection from
//! [RFC7714](https://datatracker.ietf.org/doc/rfc7714/).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! A packet is one owned byte buffer in network byte order. Every accessor
//! recomputes its offset from the live header fields, so in-place mutation
//! of an earlier region (CSRC list, header extension) invalidates the
//! regions after it. When building a packet from scratch the only legal
//! order is CSRC, then header extension, then payload, then padding.

pub mod extension;
pub mod ohb;

mod crypto;

use std::fmt;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Hard cap on every packet buffer.
pub const MTU: usize = 1500;

/// Fixed RTP header size, without CSRC list or extension.
pub const RTP_HEADER_SIZE: usize = 12;

/// AES-GCM authentication tag length appended by [`RtpPacket::encrypt_gcm`].
pub const GCM_TAG_SIZE: usize = 16;

const VERSION_MASK: u8 = 0b1100_0000;
const PADDING_MASK: u8 = 0b0010_0000;
const EXTENSION_MASK: u8 = 0b0001_0000;
const CSRC_COUNT_MASK: u8 = 0b0000_1111;
const MARKER_MASK: u8 = 0b1000_0000;
const PAYLOAD_TYPE_MASK: u8 = 0b0111_1111;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RtpError {
    #[error("SizeOverflow")]
    SizeOverflow,
    #[error("InvalidField: {0}")]
    InvalidField(&'static str),
    #[error("AuthFailure")]
    AuthFailure,
    #[error("NotImplemented: {0}")]
    NotImplemented(&'static str),
}

/// A serialized RTP packet plus the pending EKT tag that travels with it.
///
/// The buffer holds the whole packet, fixed header through padding. The
/// auxiliary `ekt` buffer starts out as the one-byte short tag and is
/// replaced by whatever tail arrived on the wire; the session driver
/// appends it back after encryption.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    buffer: BytesMut,
    ekt: BytesMut,
}

impl RtpPacket {
    /// Build a packet around `payload` with the given header fields. The
    /// version bits are set, every flag starts cleared.
    ///
    /// # Unit Test
    ///
    /// ```
    /// use rtp::RtpPacket;
    ///
    /// let packet = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();
    /// assert_eq!(packet.payload_type(), 8);
    /// assert_eq!(packet.seq(), 22);
    /// assert_eq!(packet.timestamp(), 33);
    /// assert_eq!(packet.ssrc(), 44);
    /// assert_eq!(packet.payload(), &[1, 2, 3, 4]);
    /// assert_eq!(packet.len(), 16);
    /// ```
    pub fn new(
        payload: &[u8],
        payload_type: u8,
        seq: u16,
        ts: u32,
        ssrc: u32,
    ) -> Result<Self, RtpError> {
        if payload_type > PAYLOAD_TYPE_MASK {
            return Err(RtpError::InvalidField("payload type"));
        }

        if RTP_HEADER_SIZE + payload.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        let mut buffer = BytesMut::with_capacity(MTU);
        buffer.put_u8(2 << 6);
        buffer.put_u8(payload_type);
        buffer.put_u16(seq);
        buffer.put_u32(ts);
        buffer.put_u32(ssrc);
        buffer.put(payload);

        let mut ekt = BytesMut::with_capacity(256 / 8 + 4);
        ekt.put_u8(0x00);

        Ok(Self { buffer, ekt })
    }

    /// Wrap an inbound wire buffer.
    pub fn parse(data: &[u8]) -> Result<Self, RtpError> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(RtpError::InvalidField("packet too short"));
        }

        if data.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        // lock rtp version in rfc 3550
        if (data[0] & VERSION_MASK) >> 6 != 2 {
            return Err(RtpError::InvalidField("version"));
        }

        let mut buffer = BytesMut::with_capacity(MTU);
        buffer.extend_from_slice(data);

        let packet = Self {
            buffer,
            ekt: BytesMut::new(),
        };

        if packet.hdr_ext_offset() > packet.buffer.len() {
            return Err(RtpError::InvalidField("truncated csrc list"));
        }

        if packet.ext_bit() {
            if packet.hdr_ext_offset() + 4 > packet.buffer.len() {
                return Err(RtpError::InvalidField("truncated header extension"));
            }

            if packet.payload_offset() > packet.buffer.len() {
                return Err(RtpError::InvalidField("truncated header extension"));
            }
        }

        Ok(packet)
    }

    /// The full packet as wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn csrc_offset(&self) -> usize {
        RTP_HEADER_SIZE
    }

    fn hdr_ext_offset(&self) -> usize {
        RTP_HEADER_SIZE + 4 * self.cc() as usize
    }

    pub(crate) fn payload_offset(&self) -> usize {
        self.hdr_ext_offset() + self.hdr_ext_len()
    }

    pub fn pad(&self) -> bool {
        self.buffer[0] & PADDING_MASK > 0
    }

    pub fn set_pad(&mut self, pad: bool) {
        if pad {
            self.buffer[0] |= PADDING_MASK;
        } else {
            self.buffer[0] &= !PADDING_MASK;
        }
    }

    pub fn ext_bit(&self) -> bool {
        self.buffer[0] & EXTENSION_MASK > 0
    }

    pub fn set_ext_bit(&mut self, x: bool) {
        if x {
            self.buffer[0] |= EXTENSION_MASK;
        } else {
            self.buffer[0] &= !EXTENSION_MASK;
        }
    }

    pub fn cc(&self) -> u8 {
        self.buffer[0] & CSRC_COUNT_MASK
    }

    pub fn set_cc(&mut self, cc: u8) -> Result<(), RtpError> {
        if cc > 15 {
            return Err(RtpError::InvalidField("csrc count"));
        }

        self.buffer[0] = (self.buffer[0] & !CSRC_COUNT_MASK) | cc;
        Ok(())
    }

    pub fn marker(&self) -> bool {
        self.buffer[1] & MARKER_MASK > 0
    }

    pub fn set_marker(&mut self, marker: bool) {
        if marker {
            self.buffer[1] |= MARKER_MASK;
        } else {
            self.buffer[1] &= !MARKER_MASK;
        }
    }

    pub fn payload_type(&self) -> u8 {
        self.buffer[1] & PAYLOAD_TYPE_MASK
    }

    pub fn set_payload_type(&mut self, pt: u8) -> Result<(), RtpError> {
        if pt > PAYLOAD_TYPE_MASK {
            return Err(RtpError::InvalidField("payload type"));
        }

        self.buffer[1] = (self.buffer[1] & MARKER_MASK) | pt;
        Ok(())
    }

    pub fn seq(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    pub fn set_seq(&mut self, seq: u16) {
        self.buffer[2..4].copy_from_slice(&seq.to_be_bytes());
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]])
    }

    pub fn set_timestamp(&mut self, ts: u32) {
        self.buffer[4..8].copy_from_slice(&ts.to_be_bytes());
    }

    pub fn ssrc(&self) -> u32 {
        u32::from_be_bytes([
            self.buffer[8],
            self.buffer[9],
            self.buffer[10],
            self.buffer[11],
        ])
    }

    pub fn set_ssrc(&mut self, ssrc: u32) {
        self.buffer[8..12].copy_from_slice(&ssrc.to_be_bytes());
    }

    /// Write the CSRC list. Truncates the buffer to the fixed header plus
    /// CSRC region, so any header extension, payload or padding must be
    /// set again afterwards.
    pub fn set_csrc(&mut self, csrc: &[u32]) -> Result<(), RtpError> {
        if csrc.len() > 15 {
            return Err(RtpError::InvalidField("csrc count"));
        }

        if RTP_HEADER_SIZE + 4 * csrc.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        self.buffer.truncate(self.csrc_offset());
        self.set_cc(csrc.len() as u8)?;

        for item in csrc {
            self.buffer.put_u32(*item);
        }

        Ok(())
    }

    pub fn csrc(&self) -> Vec<u32> {
        let offset = self.csrc_offset();
        (0..self.cc() as usize)
            .map(|i| {
                u32::from_be_bytes([
                    self.buffer[offset + 4 * i],
                    self.buffer[offset + 4 * i + 1],
                    self.buffer[offset + 4 * i + 2],
                    self.buffer[offset + 4 * i + 3],
                ])
            })
            .collect()
    }

    /// Total header extension block size in bytes, the 4-byte prefix
    /// included, or 0 when the X bit is clear.
    pub fn hdr_ext_len(&self) -> usize {
        if !self.ext_bit() {
            return 0;
        }

        let offset = self.hdr_ext_offset();
        if offset + 4 > self.buffer.len() {
            return 0;
        }

        let words = u16::from_be_bytes([self.buffer[offset + 2], self.buffer[offset + 3]]);
        words as usize * 4 + 4
    }

    /// The defined-by-profile id and the extension data, without the
    /// 4-byte prefix.
    pub fn hdr_ext(&self) -> Option<(u16, &[u8])> {
        if !self.ext_bit() {
            return None;
        }

        let offset = self.hdr_ext_offset();
        let end = offset + self.hdr_ext_len();
        if end > self.buffer.len() {
            return None;
        }

        let profile = u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]);
        Some((profile, &self.buffer[offset + 4..end]))
    }

    /// Write the RFC3550 header extension block. The CSRC list must
    /// already be in place; the payload and padding are invalidated.
    pub fn set_hdr_ext(&mut self, profile: u16, ext: &[u8]) -> Result<(), RtpError> {
        if ext.len() % 4 != 0 {
            return Err(RtpError::InvalidField("header extension not 32 bit padded"));
        }

        let offset = self.hdr_ext_offset();
        if offset + 4 + ext.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        self.buffer.truncate(offset);
        self.set_ext_bit(true);

        self.buffer.put_u16(profile);
        self.buffer.put_u16((ext.len() / 4) as u16);
        self.buffer.put(ext);

        Ok(())
    }

    /// Payload bytes, padding excluded. Empty when the packet carries
    /// none.
    pub fn payload(&self) -> &[u8] {
        let start = self.payload_offset();

        let pad = if self.pad() {
            self.buffer[self.buffer.len() - 1] as usize
        } else {
            0
        };

        let end = self.buffer.len().saturating_sub(pad);
        if start >= end {
            return &[];
        }

        &self.buffer[start..end]
    }

    /// Write the payload after the CSRC list and header extension.
    /// Padding is invalidated.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), RtpError> {
        let offset = self.payload_offset();
        if offset + payload.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        self.buffer.truncate(offset);
        self.buffer.put(payload);

        Ok(())
    }

    /// Pad the packet out to a multiple of `size_mult` bytes, writing the
    /// pad count into the last octet and setting the P bit. Does nothing
    /// when the packet is already aligned.
    pub fn set_padding(&mut self, size_mult: usize) -> Result<(), RtpError> {
        if size_mult == 0 {
            return Err(RtpError::InvalidField("padding multiple"));
        }

        let len = self.buffer.len();
        let pad = match len % size_mult {
            0 => return Ok(()),
            rem => size_mult - rem,
        };

        // the pad count must fit its one-octet field
        if pad > u8::MAX as usize {
            return Err(RtpError::InvalidField("padding multiple"));
        }

        if len + pad > MTU {
            return Err(RtpError::SizeOverflow);
        }

        self.buffer.resize(len + pad, 0);
        self.buffer[len + pad - 1] = pad as u8;
        self.set_pad(true);

        Ok(())
    }

    /// Replace the pending EKT tag with bytes stripped from the wire.
    pub fn set_ekt_tag(&mut self, tag: &[u8]) {
        self.ekt.clear();
        self.ekt.extend_from_slice(tag);
    }

    pub fn ekt_tag(&self) -> &[u8] {
        &self.ekt
    }

    /// Append the pending EKT tag to the wire buffer.
    pub fn append_ekt_tag(&mut self) -> Result<(), RtpError> {
        if self.buffer.len() + self.ekt.len() > MTU {
            return Err(RtpError::SizeOverflow);
        }

        self.buffer.extend_from_slice(&self.ekt);
        Ok(())
    }
}

impl fmt::Display for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pt={} seq={} ts={} M={} P={} X={} CC={}",
            self.payload_type(),
            self.seq(),
            self.timestamp(),
            self.marker(),
            self.pad(),
            self.ext_bit(),
            self.cc(),
        )?;

        if let Some((profile, ext)) = self.hdr_ext() {
            write!(f, " extProfile={:#06x} extData={:02x?}", profile, ext)?;
        }

        let payload = self.payload();
        if payload.is_empty() {
            write!(f, " noPayload")
        } else {
            write!(f, " dataLen={}", payload.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_get() {
        let p = RtpPacket::new(&[1, 2, 3, 4], 8, 22, 33, 44).unwrap();

        assert!(!p.pad());
        assert!(!p.ext_bit());
        assert!(!p.marker());
        assert_eq!(p.cc(), 0);
        assert_eq!(p.payload_type(), 8);
        assert_eq!(p.seq(), 22);
        assert_eq!(p.timestamp(), 33);
        assert_eq!(p.ssrc(), 44);
        assert!(p.csrc().is_empty());
        assert_eq!(p.hdr_ext_len(), 0);
        assert_eq!(p.hdr_ext(), None);
        assert_eq!(p.payload(), &[1, 2, 3, 4]);
        assert_eq!(p.len(), 16);
    }

    #[test]
    fn set_in_canonical_order() {
        let mut p = RtpPacket::new(&[1, 2, 3, 4, 5], 8, 22, 33, 44).unwrap();

        p.set_marker(true);
        p.set_payload_type(9).unwrap();
        p.set_seq(122);
        p.set_timestamp(133);
        p.set_ssrc(144);
        p.set_csrc(&[66, 67]).unwrap();
        p.set_hdr_ext(77, &[99, 11, 12, 14]).unwrap();
        p.set_payload(&[200, 11, 12, 13]).unwrap();
        p.set_padding(48).unwrap();

        assert!(p.pad());
        assert!(p.ext_bit());
        assert!(p.marker());
        assert_eq!(p.cc(), 2);
        assert_eq!(p.payload_type(), 9);
        assert_eq!(p.seq(), 122);
        assert_eq!(p.timestamp(), 133);
        assert_eq!(p.ssrc(), 144);
        assert_eq!(p.csrc(), vec![66, 67]);
        assert_eq!(p.hdr_ext_len(), 8);
        assert_eq!(p.hdr_ext(), Some((77, &[99u8, 11, 12, 14][..])));
        assert_eq!(p.payload(), &[200, 11, 12, 13]);
        assert_eq!(p.len(), 48);
    }

    #[test]
    fn marker_and_payload_type_do_not_clobber() {
        let mut p = RtpPacket::new(&[], 0, 0, 0, 0).unwrap();

        p.set_marker(true);
        p.set_payload_type(0x7F).unwrap();
        assert!(p.marker());
        assert_eq!(p.payload_type(), 0x7F);

        p.set_payload_type(0).unwrap();
        assert!(p.marker());

        p.set_marker(false);
        assert_eq!(p.payload_type(), 0);

        assert_eq!(
            p.set_payload_type(0x80),
            Err(RtpError::InvalidField("payload type"))
        );
    }

    #[test]
    fn csrc_bounds() {
        let mut p = RtpPacket::new(&[], 0, 0, 0, 0).unwrap();

        let full: Vec<u32> = (0..15).collect();
        p.set_csrc(&full).unwrap();
        assert_eq!(p.cc(), 15);
        assert_eq!(p.csrc(), full);

        p.set_csrc(&[]).unwrap();
        assert_eq!(p.cc(), 0);

        let over: Vec<u32> = (0..16).collect();
        assert_eq!(p.set_csrc(&over), Err(RtpError::InvalidField("csrc count")));
    }

    #[test]
    fn hdr_ext_must_be_word_aligned() {
        let mut p = RtpPacket::new(&[], 0, 0, 0, 0).unwrap();

        assert_eq!(
            p.set_hdr_ext(77, &[1, 2, 3]),
            Err(RtpError::InvalidField("header extension not 32 bit padded"))
        );

        p.set_hdr_ext(77, &[]).unwrap();
        assert_eq!(p.hdr_ext_len(), 4);
        assert_eq!(p.hdr_ext(), Some((77, &[][..])));
    }

    #[test]
    fn hdr_ext_fills_the_mtu() {
        let mut p = RtpPacket::new(&[], 0, 0, 0, 0).unwrap();

        // 12 header + 4 prefix + data lands exactly on the MTU
        p.set_hdr_ext(77, &[0x5A; MTU - RTP_HEADER_SIZE - 4]).unwrap();
        assert_eq!(p.len(), MTU);
        assert_eq!(p.hdr_ext_len(), MTU - RTP_HEADER_SIZE);
        assert!(p.payload().is_empty());

        assert_eq!(
            p.set_hdr_ext(77, &[0x5A; MTU - RTP_HEADER_SIZE]),
            Err(RtpError::SizeOverflow)
        );
    }

    #[test]
    fn payload_overflow() {
        let mut p = RtpPacket::new(&[], 0, 0, 0, 0).unwrap();

        p.set_payload(&[0xAB; MTU - RTP_HEADER_SIZE]).unwrap();
        assert_eq!(p.len(), MTU);

        assert_eq!(
            p.set_payload(&[0xAB; MTU - RTP_HEADER_SIZE + 1]),
            Err(RtpError::SizeOverflow)
        );
    }

    #[test]
    fn padding_alignment() {
        let mut p = RtpPacket::new(&[1], 0, 0, 0, 0).unwrap();

        // 13 bytes, pad to 16
        p.set_padding(4).unwrap();
        assert!(p.pad());
        assert_eq!(p.len(), 16);
        assert_eq!(p.as_bytes()[15], 3);
        assert_eq!(p.payload(), &[1]);

        // already aligned, nothing changes
        let mut q = RtpPacket::new(&[1, 2, 3, 4], 0, 0, 0, 0).unwrap();
        q.set_padding(4).unwrap();
        assert!(!q.pad());
        assert_eq!(q.len(), 16);
    }

    #[test]
    fn parse_round_trip() {
        let mut p = RtpPacket::new(&[], 96, 1265, 4169613229, 1744739836).unwrap();
        p.set_marker(true);
        p.set_csrc(&[0xDEADBEEF]).unwrap();
        p.set_hdr_ext(0xBEDE, &[0x22, 0xAA, 0x36, 0x3F]).unwrap();
        p.set_payload(&[9, 8, 7]).unwrap();
        p.set_padding(4).unwrap();

        let parsed = RtpPacket::parse(p.as_bytes()).unwrap();
        assert_eq!(parsed.marker(), p.marker());
        assert_eq!(parsed.payload_type(), 96);
        assert_eq!(parsed.seq(), 1265);
        assert_eq!(parsed.timestamp(), 4169613229);
        assert_eq!(parsed.ssrc(), 1744739836);
        assert_eq!(
            parsed.hdr_ext(),
            Some((0xBEDE, &[0x22u8, 0xAA, 0x36, 0x3F][..]))
        );
        assert_eq!(parsed.csrc(), vec![0xDEADBEEF]);
        assert_eq!(parsed.payload(), &[9, 8, 7]);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RtpPacket::parse(&[0x80, 0x00]).is_err());
        assert!(RtpPacket::parse(&[0x00; 12]).is_err());

        // X bit set without the extension prefix present
        let mut truncated = [0u8; 12];
        truncated[0] = 0x90;
        assert!(RtpPacket::parse(&truncated).is_err());
    }
}
