//! Network transport layer for RTSP signaling and RTP/RTCP media intake.
//!
//! The relay uses a split transport model, mirroring the protocol's:
//!
//! - **TCP** ([`tcp`]): one control connection per upstream session,
//!   carrying RTSP request/response signaling and, in interleaved mode,
//!   the media frames themselves.
//! - **UDP** ([`udp`]): out-of-band media intake. Each track gets a bound
//!   RTP/RTCP port pair whose receive loops feed the distribution bridge
//!   and stamp the liveness clock.

pub mod tcp;
pub mod udp;

pub use tcp::{Credentials, InterleavedFrame, Message, RtspConn};
pub use udp::{UdpBinding, UdpListener, UdpListenerPair};
