//! ## Secure RTP
//!
//! RTP is the Real-time Transport Protocol
//! [RFC3550](https://tools.ietf.org/html/rfc3550). We define SRTP as a
//! profile of RTP, an extension to the RTP Audio/Video Profile.
//! Conceptually, SRTP is a "bump in the stack" implementation which
//! resides between the RTP application and the transport layer. SRTP
//! intercepts RTP packets and then forwards an equivalent SRTP packet on
//! the sending side, and intercepts SRTP packets and passes an equivalent
//! RTP packet up the stack on the receiving side.
//!
//! This crate holds the pieces above the packet codecs: the
//! [RFC3711 section 4.3](https://tools.ietf.org/html/rfc3711#section-4.3)
//! key derivation function, the EKT tail framing of
//! [draft-ietf-perc-srtp-ekt-diet](https://tools.ietf.org/html/draft-ietf-perc-srtp-ekt-diet-07),
//! and the per-stream [`SrtpSession`] driver that sequences OHB
//! insertion, AES-GCM protection, sequence rewriting and EKT framing
//! over the `rtp` and `rtcp` crates.
//!
//! The engine consumes a master key and salt from whoever negotiated
//! them (DTLS-SRTP, signaling) and emits or accepts finished byte
//! buffers; transport I/O stays with the caller.

pub mod ekt;
pub mod kdf;

mod session;

pub use session::SrtpSession;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use rtcp::RtcpError;
use rtp::RtpError;

/// SRTP protection profile identifiers, from the
/// [IANA registry](https://www.iana.org/assignments/srtp-protection/srtp-protection.xhtml).
/// Only the AEAD profiles and their PERC double-transform variants are
/// supported; the double variants run here in half mode, with the outer
/// transform applied by the relay.
#[repr(u16)]
#[derive(TryFromPrimitive, IntoPrimitive)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    None = 0x0000,
    AeadAes128Gcm = 0x0007,
    AeadAes256Gcm = 0x0008,
    DoubleAeadAes128Gcm = 0x0009,
    DoubleAeadAes256Gcm = 0x000A,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SrtpError {
    #[error("MalformedEkt")]
    MalformedEkt,
    #[error("UnsupportedCipher: {0:#06x}")]
    UnsupportedCipher(u16),
    #[error("InvalidField: {0}")]
    InvalidField(&'static str),
    #[error(transparent)]
    Rtp(#[from] RtpError),
    #[error(transparent)]
    Rtcp(#[from] RtcpError),
}
