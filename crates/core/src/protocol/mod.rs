//! RTSP client protocol implementation (RFC 2326).
//!
//! This module handles the text-based RTSP signaling protocol from the
//! client side: building requests, parsing responses, and reading the
//! SDP session description delivered by DESCRIBE.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://camera/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! Key differences from HTTP:
//! - Stateful: sessions persist across requests (RFC 2326 §3).
//! - Different methods: OPTIONS, DESCRIBE, SETUP, PLAY.
//! - Session header carries a server-assigned ID (RFC 2326 §12.37).
//! - Media packets may be interleaved into the control connection,
//!   framed by a `$`-prefixed four-byte header (RFC 2326 §10.12).
//!
//! ## Methods used by the relay
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Reachability probe and session keepalive |
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//! | SETUP | §10.4 | Negotiate transport (UDP ports or channels) |
//! | PLAY | §10.5 | Start media delivery |

pub mod request;
pub mod response;
pub mod sdp;

pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
