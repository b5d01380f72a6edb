//! Error types for the RTSP relay core.

use std::fmt;

/// Errors that can occur while pulling an upstream RTSP stream.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Config** (fatal, returned from [`Stream::spawn`](crate::Stream::spawn)):
///   [`InvalidUrl`](Self::InvalidUrl), [`UnsupportedScheme`](Self::UnsupportedScheme),
///   [`UnsupportedProtocol`](Self::UnsupportedProtocol),
///   [`PartialCredentials`](Self::PartialCredentials).
/// - **Transport**: [`Io`](Self::Io) — dial, socket and timeout failures.
/// - **Protocol**: [`BadStatus`](Self::BadStatus), [`Parse`](Self::Parse),
///   [`HeaderMissing`](Self::HeaderMissing), [`HeaderDuplicated`](Self::HeaderDuplicated),
///   [`WrongContentType`](Self::WrongContentType), [`Sdp`](Self::Sdp),
///   [`MissingServerPorts`](Self::MissingServerPorts),
///   [`MissingInterleavedChannels`](Self::MissingInterleavedChannels).
/// - **Liveness**: [`StreamDead`](Self::StreamDead).
///
/// Everything except the config variants is recoverable: the session is
/// torn down and the supervisor retries after its backoff interval.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream URL could not be parsed.
    #[error("invalid stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The stream URL has a scheme other than `rtsp`.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The configured protocol is neither `udp` nor `tcp`.
    #[error("unsupported protocol: '{0}'")]
    UnsupportedProtocol(String),

    /// The URL userinfo carries a username without a password or vice versa.
    #[error("username and password must be both provided")]
    PartialCredentials,

    /// The upstream answered with a status code the caller does not accept.
    #[error("{method} returned code {code} ({message})")]
    BadStatus {
        method: &'static str,
        code: u16,
        message: String,
    },

    /// Failed to parse an RTSP response or interleaved frame (RFC 2326 §7, §10.12).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A required response header was absent.
    #[error("{0} header not provided")]
    HeaderMissing(&'static str),

    /// A header that must be single-valued appeared more than once.
    #[error("{0} header provided more than once")]
    HeaderDuplicated(&'static str),

    /// DESCRIBE returned a body that is not `application/sdp`.
    #[error("wrong Content-Type '{0}', expected application/sdp")]
    WrongContentType(String),

    /// The session description in the DESCRIBE body is malformed.
    #[error("invalid SDP: {0}")]
    Sdp(String),

    /// SETUP response Transport header lacks a usable `server_port` pair.
    #[error("server ports not provided")]
    MissingServerPorts,

    /// SETUP response Transport header does not echo the requested channels.
    #[error("transport header does not have {0}")]
    MissingInterleavedChannels(String),

    /// Client-side RTP/RTCP port pair allocation gave up after its retry cap.
    #[error("UDP port allocation exhausted the 10000-65534 range")]
    PortRangeExhausted,

    /// No RTP or RTCP datagrams arrived within the liveness window.
    #[error("stream is dead")]
    StreamDead,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// The peer closed the connection before sending a status line.
    EmptyResponse,
    /// Status line did not have the expected `RTSP/1.0 Code Reason` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// Interleaved frame did not start with the `$` magic byte (RFC 2326 §10.12).
    InvalidFrameHeader,
    /// Interleaved frame payload exceeds the caller's buffer.
    FrameTooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResponse => write!(f, "empty response"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidFrameHeader => write!(f, "invalid interleaved frame header"),
            Self::FrameTooLarge => write!(f, "interleaved frame too large"),
        }
    }
}

/// Convenience alias for `Result<T, RelayError>`.
pub type Result<T> = std::result::Result<T, RelayError>;
