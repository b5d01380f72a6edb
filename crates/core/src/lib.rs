//! # rtsp_relay — upstream session core for an RTSP proxy
//!
//! A Rust library implementing the publisher-facing half of an RTSP
//! relay: it pulls live feeds from cameras and streaming servers over the
//! Real-Time Streaming Protocol and hands the media packets to a
//! downstream distribution layer for fan-out.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 2326](https://tools.ietf.org/html/rfc2326) | RTSP 1.0 | Client request/response, transport negotiation, interleaved framing |
//! | [RFC 3550](https://tools.ietf.org/html/rfc3550) | RTP | Even/odd RTP/RTCP port pairing for UDP intake |
//! | [RFC 4566](https://tools.ietf.org/html/rfc4566) | SDP | DESCRIBE body parsing, filtered republication |
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │  Stream        — supervisor, retry loop   │
//! ├───────────────────────────────────────────┤
//! │  Session       — UDP / TCP-interleaved    │
//! │  Bridge        — distribution contract    │
//! ├───────────────────────────────────────────┤
//! │  Protocol      — RTSP messages, SDP       │
//! │  Transport     — control conn, UDP intake │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Each [`Stream`] runs on its own thread and is self-healing: any
//! failure past construction tears the session down, evicts the path's
//! subscribers through the [`DistributionBridge`], and reconnects after a
//! backoff, until [`Stream::close`] is called.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtsp_relay::{SessionTimeouts, Stream, StreamConfig};
//! # use rtsp_relay::{DistributionBridge, TrackFlow};
//! # use rtsp_relay::protocol::sdp::{SdpSession, ServerSdp};
//! # struct Fanout;
//! # impl DistributionBridge for Fanout {
//! #     fn publish_description(&self, _: &str, _: SdpSession, _: ServerSdp) {}
//! #     fn publish_ready(&self, _: &str) {}
//! #     fn publish_starting(&self, _: &str) {}
//! #     fn forward_track(&self, _: &str, _: usize, _: TrackFlow, _: &[u8]) {}
//! # }
//!
//! let bridge: Arc<dyn DistributionBridge> = Arc::new(Fanout);
//! let config = StreamConfig {
//!     url: "rtsp://camera/live".to_string(),
//!     protocol: Some("udp".to_string()),
//! };
//! let stream = Stream::spawn("/cam1", config, SessionTimeouts::default(), bridge).unwrap();
//! // ... runs until ...
//! stream.close();
//! ```
//!
//! ## Crate layout
//!
//! - [`stream`] — [`Stream`] handle, [`StreamConfig`], the supervisor loop.
//! - [`session`] — per-mode session drivers and transport negotiation.
//! - [`bridge`] — [`DistributionBridge`] contract to the fan-out layer.
//! - [`protocol`] — RTSP client messages and SDP handling.
//! - [`transport`] — RTSP control connection, UDP listener pairs.
//! - [`error`] — [`RelayError`] enum and [`Result`] alias.

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

pub use bridge::{DistributionBridge, StreamState, Subscriber, TrackFlow};
pub use error::{RelayError, Result};
pub use stream::{Protocol, SessionTimeouts, Stream, StreamConfig};
