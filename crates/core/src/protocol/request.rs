use std::fmt;

use url::Url;

/// RTSP methods issued by the relay (RFC 2326 §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// ```
///
/// Uses a builder pattern: chain [`with_header`](Self::with_header), then
/// call [`serialize`](Self::serialize). The connection layer appends
/// `CSeq`, `Session` and `Authorization` when writing
/// (see [`RtspConn`](crate::transport::tcp::RtspConn)), so requests built
/// here carry only method-specific headers.
#[derive(Debug, Clone)]
#[must_use]
pub struct RtspRequest {
    /// RTSP method.
    pub method: Method,
    /// Absolute request URL (e.g. `rtsp://host:554/stream/track1`).
    pub url: Url,
    /// Headers as ordered (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, url: Url) -> Self {
        RtspRequest {
            method,
            url,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// None of the four methods the relay issues carries a body, so no
    /// `Content-Length` is ever emitted.
    pub fn serialize(&self) -> String {
        let mut request = format!("{} {} RTSP/1.0\r\n", self.method, self.url);

        for (name, value) in &self.headers {
            request.push_str(&format!("{}: {}\r\n", name, value));
        }

        request.push_str("\r\n");
        request
    }
}
