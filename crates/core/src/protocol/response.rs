use std::io::{BufRead, Read};

use crate::error::{ParseErrorKind, RelayError, Result};

/// Largest response body the relay accepts. SDP descriptions are a few
/// hundred bytes; anything beyond this is a misbehaving peer.
const MAX_BODY_LEN: usize = 1024 * 1024;

/// A parsed RTSP response (RFC 2326 §7).
///
/// Wire format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 2\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. Headers that the
/// protocol requires to be single-valued go through
/// [`single_header`](Self::single_header), which rejects duplicates.
#[derive(Debug)]
pub struct RtspResponse {
    /// Numeric status code (e.g. 200, 404).
    pub status_code: u16,
    /// Reason phrase from the status line.
    pub status_text: String,
    /// Headers as ordered (name, value) pairs. Names are stored as-received;
    /// lookups are case-insensitive.
    pub headers: Vec<(String, String)>,
    /// Response body, sized by `Content-Length` (empty when absent).
    pub body: Vec<u8>,
}

impl RtspResponse {
    /// Read and parse one response from the connection.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        Self::read_internal(reader, None)
    }

    /// Same as [`read_from`](Self::read_from), for the case where the
    /// dispatcher already consumed the first byte of the status line to
    /// distinguish a response from an interleaved frame.
    pub(crate) fn read_after_prefix<R: BufRead>(reader: &mut R, first: u8) -> Result<Self> {
        Self::read_internal(reader, Some(first))
    }

    fn read_internal<R: BufRead>(reader: &mut R, first: Option<u8>) -> Result<Self> {
        let mut status_line = String::new();
        if let Some(byte) = first {
            status_line.push(byte as char);
        }
        if reader.read_line(&mut status_line)? == 0 && status_line.is_empty() {
            return Err(RelayError::Parse {
                kind: ParseErrorKind::EmptyResponse,
            });
        }

        let (status_code, status_text) = parse_status_line(status_line.trim_end())?;

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(RelayError::Parse {
                    kind: ParseErrorKind::EmptyResponse,
                });
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }

            let colon_pos = line.find(':').ok_or(RelayError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;

            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            headers.push((name, value));
        }

        let mut response = RtspResponse {
            status_code,
            status_text,
            headers,
            body: Vec::new(),
        };

        if let Some(len) = response
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            if len > MAX_BODY_LEN {
                return Err(RelayError::Parse {
                    kind: ParseErrorKind::InvalidHeader,
                });
            }
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body)?;
            response.body = body;
        }

        Ok(response)
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    /// Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Look up a header that the caller requires to appear exactly once.
    pub fn single_header(&self, name: &'static str) -> Result<&str> {
        let mut matches = self
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name));

        let value = matches
            .next()
            .map(|(_, value)| value.as_str())
            .ok_or(RelayError::HeaderMissing(name))?;

        if matches.next().is_some() {
            return Err(RelayError::HeaderDuplicated(name));
        }
        Ok(value)
    }
}

fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().unwrap_or("");
    if !version.starts_with("RTSP/") {
        return Err(RelayError::Parse {
            kind: ParseErrorKind::InvalidStatusLine,
        });
    }

    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or(RelayError::Parse {
            kind: ParseErrorKind::InvalidStatusLine,
        })?;

    let text = parts.next().unwrap_or("").to_string();
    Ok((code, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(raw: &str) -> Result<RtspResponse> {
        RtspResponse::read_from(&mut BufReader::new(raw.as_bytes()))
    }

    #[test]
    fn parse_ok_no_body() {
        let res = parse("RTSP/1.0 200 OK\r\nCSeq: 1\r\nPublic: OPTIONS, DESCRIBE\r\n\r\n").unwrap();
        assert_eq!(res.status_code, 200);
        assert_eq!(res.status_text, "OK");
        assert_eq!(res.header("Public"), Some("OPTIONS, DESCRIBE"));
        assert!(res.body.is_empty());
    }

    #[test]
    fn parse_with_body() {
        let res = parse(
            "RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-Type: application/sdp\r\n\
             Content-Length: 5\r\n\r\nv=0\r\n",
        )
        .unwrap();
        assert_eq!(res.body, b"v=0\r\n");
    }

    #[test]
    fn parse_not_found() {
        let res = parse("RTSP/1.0 404 Not Found\r\nCSeq: 1\r\n\r\n").unwrap();
        assert_eq!(res.status_code, 404);
        assert_eq!(res.status_text, "Not Found");
    }

    #[test]
    fn parse_empty_input() {
        assert!(matches!(
            parse(""),
            Err(RelayError::Parse {
                kind: ParseErrorKind::EmptyResponse
            })
        ));
    }

    #[test]
    fn parse_garbage_status_line() {
        assert!(matches!(
            parse("HTTP/1.1 200 OK\r\n\r\n"),
            Err(RelayError::Parse {
                kind: ParseErrorKind::InvalidStatusLine
            })
        ));
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let res = parse("RTSP/1.0 200 OK\r\ncontent-type: application/sdp\r\n\r\n").unwrap();
        assert_eq!(res.header("Content-Type"), Some("application/sdp"));
        assert_eq!(res.header("CONTENT-TYPE"), Some("application/sdp"));
    }

    #[test]
    fn single_header_missing() {
        let res = parse("RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n").unwrap();
        assert!(matches!(
            res.single_header("Transport"),
            Err(RelayError::HeaderMissing("Transport"))
        ));
    }

    #[test]
    fn single_header_duplicated() {
        let res = parse("RTSP/1.0 200 OK\r\nTransport: a\r\nTransport: b\r\n\r\n").unwrap();
        assert!(matches!(
            res.single_header("Transport"),
            Err(RelayError::HeaderDuplicated("Transport"))
        ));
    }

    #[test]
    fn status_text_may_be_empty() {
        let res = parse("RTSP/1.0 200\r\n\r\n").unwrap();
        assert_eq!(res.status_code, 200);
        assert_eq!(res.status_text, "");
    }
}
