//! Contract between the upstream core and the distribution layer.
//!
//! The relay pulls streams from publishers; a separate distribution layer
//! owns the downstream TCP listener, the subscriber set, and one
//! reader/writer lock over the per-stream records. The core never holds a
//! pointer back into that layer; it holds only this narrow capability
//! handle, which keeps the Stream / distribution / subscriber reference
//! cycle broken.
//!
//! Each trait method is one critical section on the distribution side:
//! the publish methods run under the writer lock, forwarding under the
//! reader lock. The core guarantees the calling order (description before
//! ready, starting on every teardown); the implementor guarantees the
//! locking and the eviction-before-visibility rule documented on
//! [`publish_starting`](DistributionBridge::publish_starting).

use std::fmt;

use crate::protocol::sdp::{SdpSession, ServerSdp};

/// Lifecycle state of a stream as seen by the distribution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Initial state, and the state during every (re)connect.
    Starting,
    /// PLAY succeeded and packets are being forwarded.
    Ready,
}

/// Which of a track's paired packet flows a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFlow {
    Rtp,
    Rtcp,
}

impl fmt::Display for TrackFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rtp => f.write_str("RTP"),
            Self::Rtcp => f.write_str("RTCP"),
        }
    }
}

/// A downstream client held by the distribution layer.
pub trait Subscriber {
    /// The stream path this subscriber is attached to.
    fn path(&self) -> &str;

    /// Disconnect the subscriber. Called once per eviction.
    fn close(&self);
}

/// Capability handle into the distribution layer.
///
/// Implementations must be callable from the stream's run thread and its
/// listener/reader threads concurrently.
pub trait DistributionBridge: Send + Sync + 'static {
    /// Record the session descriptions for `path` (writer lock): the
    /// publisher's own SDP and the filtered copy served to subscribers.
    /// Called after every successful DESCRIBE, before any transport setup.
    fn publish_description(&self, path: &str, client_sdp: SdpSession, server_sdp: ServerSdp);

    /// Transition `path` to [`StreamState::Ready`] (writer lock). The core
    /// calls this only once transport setup is complete and PLAY returned
    /// OK, so a `Ready` stream always has a published description.
    fn publish_ready(&self, path: &str);

    /// Transition `path` back to [`StreamState::Starting`] (writer lock)
    /// and close every subscriber whose path matches, exactly once, within
    /// the same critical section, so the eviction is complete before the
    /// transition is observable outside the lock. Called on every session
    /// teardown.
    fn publish_starting(&self, path: &str);

    /// Deliver one packet to all subscribers of `path` (reader lock).
    /// Must not block the caller; listener and reader threads invoke this
    /// on their receive path.
    fn forward_track(&self, path: &str, track_id: usize, flow: TrackFlow, payload: &[u8]);
}
