//! Per-stream SRTP session driver.
//!
//! A session owns the outbound sequence state of exactly one (SSRC,
//! direction) pair. `encode` rewrites the sequence number, records the
//! originals in the OHB, seals the payload and appends the EKT tail;
//! `decode` reverses the pipeline. The (ROC, SEQ) pair feeds the AES-GCM
//! IV, so a session must never be driven from two threads at once: a
//! reused pair would repeat an IV under the same key. Shard by session,
//! one per outbound SSRC.

use bytes::BytesMut;

use rtcp::RtcpPacket;
use rtp::extension::ExtensionMap;
use rtp::RtpPacket;

use crate::ekt;
use crate::kdf::{Kdf, SessionKeys};
use crate::{CipherId, SrtpError};

const SRTCP_INDEX_MASK: u32 = 0x7FFF_FFFF;

/// Session state machine: fresh until [`SrtpSession::set_srtp`] installs
/// the keys, keyed from then on. There is no teardown state; drop the
/// session when the stream ends.
pub struct SrtpSession {
    ext_map: ExtensionMap,
    keys: Option<SessionKeys>,
    cipher: CipherId,
    use_ekt: bool,
    rewrite_seq: bool,
    pub(crate) seq: u16,
    pub(crate) roc: u32,
    pub(crate) srtcp_index: u32,
}

impl SrtpSession {
    /// A fresh session. The outbound sequence number starts at a random
    /// value masked to 15 bits so a long stream does not wrap early;
    /// the rollover counter starts at zero.
    pub fn new(rewrite_seq: bool) -> Self {
        Self {
            ext_map: ExtensionMap::new(),
            keys: None,
            cipher: CipherId::None,
            use_ekt: false,
            rewrite_seq,
            seq: rand::random::<u16>() & 0x7FFF,
            roc: 0,
            srtcp_index: 0,
        }
    }

    /// Install the master key and salt and derive the per-stream session
    /// keys for `cipher`.
    pub fn set_srtp(
        &mut self,
        cipher: CipherId,
        use_ekt: bool,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<(), SrtpError> {
        let kdf = Kdf::new(master_key, master_salt)?;
        let keys = kdf.derive_for_stream(cipher)?;

        self.cipher = cipher;
        self.use_ekt = use_ekt;
        self.keys = Some(keys);

        Ok(())
    }

    /// Map a negotiated extension URI to its local id (1..=14).
    pub fn set_ext_map(&mut self, id: u8, uri: &str) -> Result<(), SrtpError> {
        self.ext_map.set(id, uri)?;
        Ok(())
    }

    /// The negotiated extension mapping, for the RFC6464 helpers on
    /// [`RtpPacket`].
    pub fn ext_map(&self) -> &ExtensionMap {
        &self.ext_map
    }

    fn keys(&self) -> Result<&SessionKeys, SrtpError> {
        if self.cipher == CipherId::None {
            return Err(SrtpError::UnsupportedCipher(self.cipher.into()));
        }

        self.keys
            .as_ref()
            .ok_or(SrtpError::UnsupportedCipher(CipherId::None.into()))
    }

    /// Protect an outbound packet and return the wire bytes.
    ///
    /// The original payload type, sequence number and marker are
    /// captured, the sequence number is rewritten when the session was
    /// built for it, and the OHB records whatever then differs from the
    /// header going out. Sequence state only advances after the packet
    /// has been sealed, so a failed encode never burns a (ROC, SEQ)
    /// pair.
    pub fn encode<'a>(&mut self, packet: &'a mut RtpPacket) -> Result<&'a [u8], SrtpError> {
        let keys = self.keys()?;

        let orig_pt = packet.payload_type();
        let orig_seq = packet.seq();
        let orig_marker = packet.marker();

        if self.rewrite_seq {
            packet.set_seq(self.seq);
        }

        packet.set_ohb(orig_pt, orig_seq, orig_marker)?;
        packet.encrypt_gcm(self.roc, &keys.rtp_key, &keys.rtp_salt)?;

        if self.rewrite_seq {
            self.seq = self.seq.wrapping_add(1);
            if self.seq == 0 {
                self.roc = self.roc.wrapping_add(1);
            }
        }

        if self.use_ekt {
            packet.append_ekt_tag()?;
        }

        Ok(packet.as_bytes())
    }

    /// Unprotect an inbound wire buffer. The EKT tail is split off and
    /// kept with the packet, the payload is verified and decrypted, and
    /// the header fields the relay rewrote are restored from the OHB
    /// before it is stripped. Session state never changes here, so a
    /// failed authentication only drops the one packet.
    pub fn decode(&mut self, data: &[u8]) -> Result<RtpPacket, SrtpError> {
        let keys = self.keys()?;

        let (packet_bytes, ekt_bytes) = if self.use_ekt {
            data.split_at(data.len() - ekt::tail_len(data)?)
        } else {
            (data, &[][..])
        };

        let mut packet = RtpPacket::parse(packet_bytes)?;
        if !ekt_bytes.is_empty() {
            packet.set_ekt_tag(ekt_bytes);
        }

        packet.decrypt_gcm(self.roc, &keys.rtp_key, &keys.rtp_salt)?;

        let (pt, seq, marker) = packet.ohb();
        packet.strip_ohb();
        packet.set_payload_type(pt)?;
        packet.set_seq(seq);
        packet.set_marker(marker);

        Ok(packet)
    }

    /// Protect an outbound RTCP compound buffer: stamp it with the
    /// session's SRTCP index, seal it and emit the wire buffer. The
    /// index advances on success, wrapping inside its 31 bits.
    pub fn encode_rtcp(&mut self, compound: &[u8]) -> Result<BytesMut, SrtpError> {
        let keys = self.keys()?;

        let mut packet = RtcpPacket::compound(compound, self.srtcp_index)?;
        packet.encrypt_gcm(&keys.rtcp_key, &keys.rtcp_salt)?;

        self.srtcp_index = self.srtcp_index.wrapping_add(1) & SRTCP_INDEX_MASK;

        Ok(packet.to_bytes())
    }

    /// Unprotect an inbound SRTCP wire buffer. The E flag must be set;
    /// the returned packet holds the plaintext compound and its index.
    pub fn decode_rtcp(&mut self, data: &[u8]) -> Result<RtcpPacket, SrtpError> {
        let keys = self.keys()?;

        let mut packet = RtcpPacket::parse(data)?;
        packet.decrypt_gcm(&keys.rtcp_key, &keys.rtcp_salt)?;

        Ok(packet)
    }
}
