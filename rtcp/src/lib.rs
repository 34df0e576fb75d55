//! ## RTCP: RTP Control Protocol
//!
//! Compound packet handling for RTCP
//! ([RFC3550 section 6](https://tools.ietf.org/html/rfc3550#section-6))
//! and its secure profile SRTCP
//! ([RFC3711 section 3.4](https://tools.ietf.org/html/rfc3711#section-3.4),
//! AES-GCM transform from
//! [RFC7714 section 9.2](https://tools.ietf.org/html/rfc7714#section-9.2)).
//!
//! ```text
//!     0                   1                   2                   3
//!    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! A |V=2|P|   RC    |  Packet Type  |            length             |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! A |           synchronization source (SSRC) of sender             |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! P |                         packet body                           :
//!   +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! A |1|                         SRTCP index                         |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//!   A = authenticated, P = protected (encrypted)
//! ```
//!
//! The trailing 32-bit word of an SRTCP packet carries the E flag in the
//! high bit and the 31-bit SRTCP index below it; it is appended after the
//! ciphertext and authenticated together with the header. A compound
//! packet currently exposes a single inner sub-packet; parsing and
//! signing multiple sub-packets is future work.

mod crypto;

use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Hard cap on every packet buffer.
pub const MTU: usize = 1500;

/// Fixed RTCP header size: V/P/RC, PT, length, sender SSRC.
pub const RTCP_HEADER_SIZE: usize = 8;

/// Size of the trailing ESRTCP word.
pub const ESRTCP_WORD_SIZE: usize = 4;

/// AES-GCM authentication tag length.
pub const GCM_TAG_SIZE: usize = 16;

const VERSION_MASK: u8 = 0b1100_0000;
const PADDING_MASK: u8 = 0b0010_0000;
const RC_MASK: u8 = 0b0001_1111;

const E_FLAG: u32 = 1 << 31;
const SRTCP_INDEX_MASK: u32 = !E_FLAG;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RtcpError {
    #[error("SizeOverflow")]
    SizeOverflow,
    #[error("InvalidField: {0}")]
    InvalidField(&'static str),
    #[error("AuthFailure")]
    AuthFailure,
    #[error("NotImplemented: {0}")]
    NotImplemented(&'static str),
}

/// RTCP packet type, from
/// [RFC3550 section 12.1](https://tools.ietf.org/html/rfc3550#section-12.1).
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    SR = 200,
    RR = 201,
    SDES = 202,
    BYE = 203,
    APP = 204,
}

/// An RTCP compound packet: the 8-byte header and body in one buffer, and
/// the optional ESRTCP word kept apart until the wire buffer is
/// assembled.
#[derive(Debug, Clone)]
pub struct RtcpPacket {
    buffer: BytesMut,
    appendix: Option<[u8; ESRTCP_WORD_SIZE]>,
}

impl RtcpPacket {
    /// Build a plaintext packet from header fields and body bytes. The
    /// length field follows the RFC3550 convention of 32-bit words minus
    /// one.
    pub fn new(
        kind: PacketKind,
        length: u16,
        sender_ssrc: u32,
        payload: &[u8],
    ) -> Result<Self, RtcpError> {
        if RTCP_HEADER_SIZE + payload.len() > MTU {
            return Err(RtcpError::SizeOverflow);
        }

        let mut buffer = BytesMut::with_capacity(MTU);
        buffer.put_u8(2 << 6);
        buffer.put_u8(kind.into());
        buffer.put_u16(length);
        buffer.put_u32(sender_ssrc);
        buffer.put(payload);

        Ok(Self {
            buffer,
            appendix: None,
        })
    }

    /// Wrap a complete plaintext compound buffer for encryption, stamping
    /// it with `srtcp_index` and the E flag set.
    pub fn compound(buffer: &[u8], srtcp_index: u32) -> Result<Self, RtcpError> {
        if buffer.len() < RTCP_HEADER_SIZE {
            return Err(RtcpError::InvalidField("packet too short"));
        }

        if buffer.len() + ESRTCP_WORD_SIZE > MTU {
            return Err(RtcpError::SizeOverflow);
        }

        let word = (srtcp_index & SRTCP_INDEX_MASK) | E_FLAG;

        let mut inner = BytesMut::with_capacity(MTU);
        inner.extend_from_slice(buffer);

        Ok(Self {
            buffer: inner,
            appendix: Some(word.to_be_bytes()),
        })
    }

    /// Split inbound SRTCP wire bytes into header+body and the trailing
    /// ESRTCP word.
    pub fn parse(wire: &[u8]) -> Result<Self, RtcpError> {
        if wire.len() < RTCP_HEADER_SIZE + ESRTCP_WORD_SIZE {
            return Err(RtcpError::InvalidField("packet too short"));
        }

        if wire.len() > MTU {
            return Err(RtcpError::SizeOverflow);
        }

        let split = wire.len() - ESRTCP_WORD_SIZE;

        let mut buffer = BytesMut::with_capacity(MTU);
        buffer.extend_from_slice(&wire[..split]);

        let mut appendix = [0u8; ESRTCP_WORD_SIZE];
        appendix.copy_from_slice(&wire[split..]);

        Ok(Self {
            buffer,
            appendix: Some(appendix),
        })
    }

    pub fn rc(&self) -> u8 {
        self.buffer[0] & RC_MASK
    }

    pub fn version(&self) -> u8 {
        (self.buffer[0] & VERSION_MASK) >> 6
    }

    pub fn padding(&self) -> bool {
        self.buffer[0] & PADDING_MASK > 0
    }

    pub fn pt(&self) -> u8 {
        self.buffer[1]
    }

    pub fn kind(&self) -> Result<PacketKind, RtcpError> {
        PacketKind::try_from(self.buffer[1]).map_err(|_| RtcpError::InvalidField("packet type"))
    }

    pub fn set_pt(&mut self, kind: PacketKind) {
        self.buffer[1] = kind.into();
    }

    /// Length in 32-bit words minus one, including the header.
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    pub fn set_length(&mut self, length: u16) {
        self.buffer[2..4].copy_from_slice(&length.to_be_bytes());
    }

    pub fn length_in_bytes(&self) -> usize {
        (self.length() as usize + 1) * 4
    }

    pub fn sender_ssrc(&self) -> u32 {
        u32::from_be_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]])
    }

    pub fn set_sender_ssrc(&mut self, ssrc: u32) {
        self.buffer[4..8].copy_from_slice(&ssrc.to_be_bytes());
    }

    /// Body bytes after the 8-byte header.
    pub fn body(&self) -> &[u8] {
        &self.buffer[RTCP_HEADER_SIZE..]
    }

    /// The 31-bit SRTCP index from the ESRTCP word, E flag masked off.
    pub fn srtcp_index(&self) -> Option<u32> {
        self.appendix
            .map(|word| u32::from_be_bytes(word) & SRTCP_INDEX_MASK)
    }

    pub fn e_flag(&self) -> bool {
        self.appendix
            .map(|word| u32::from_be_bytes(word) & E_FLAG > 0)
            .unwrap_or(false)
    }

    /// Assemble the wire buffer: header, body and the ESRTCP word when
    /// present.
    pub fn to_bytes(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(self.buffer.len() + ESRTCP_WORD_SIZE);
        out.extend_from_slice(&self.buffer);

        if let Some(word) = self.appendix {
            out.extend_from_slice(&word);
        }

        out
    }
}
