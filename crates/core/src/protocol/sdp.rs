//! SDP (Session Description Protocol) parsing and filtering (RFC 4566 / RFC 8866).
//!
//! The DESCRIBE response body describes the publisher's media session:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=- 1606 1606 IN IP4 192.168.1.10            ← origin
//! s=Media Presentation                          ← session name
//! t=0 0                                         ← timing (live stream)
//! m=video 0 RTP/AVP 96                          ← media description
//! a=rtpmap:96 H264/90000                        ← codec/clock rate
//! a=fmtp:96 packetization-mode=1                ← codec parameters
//! a=control:trackID=1                           ← track control URL
//! m=audio 0 RTP/AVP 0                           ← second track
//! ```
//!
//! Two consumers need different views of it:
//!
//! - the relay itself enumerates the `m=` sections to drive one SETUP per
//!   track, reading each `control` attribute ([`parse`]);
//! - the distribution layer republishes a cleaned copy to its own
//!   subscribers, with control attributes renumbered to `trackID=<i>` so
//!   they resolve against the relay rather than the publisher ([`filter`]).

use crate::error::{RelayError, Result};

/// A parsed session description, reduced to what transport setup needs.
#[derive(Debug, Clone)]
pub struct SdpSession {
    /// Media sections in declaration order; the index is the track id.
    pub medias: Vec<SdpMedia>,
}

/// One `m=` section with its media-level attributes.
#[derive(Debug, Clone)]
pub struct SdpMedia {
    /// Media type from the `m=` line (`video`, `audio`, `application`, ...).
    pub kind: String,
    /// Payload format numbers from the `m=` line.
    pub formats: Vec<String>,
    /// `a=` attributes as (name, value) pairs; flag attributes have an
    /// empty value.
    pub attributes: Vec<(String, String)>,
}

impl SdpMedia {
    /// Look up a media-level attribute value.
    ///
    /// Distinguishes an absent attribute (`None`) from a flag or
    /// empty-valued one (`Some("")`); SETUP URL derivation needs that
    /// distinction.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The filtered session description published to subscribers: the opaque
/// bytes served in DESCRIBE responses plus the parsed form.
#[derive(Debug, Clone)]
pub struct ServerSdp {
    pub raw: Vec<u8>,
    pub parsed: SdpSession,
}

/// Parse a DESCRIBE body into its media sections.
///
/// Lenient by intent: cameras emit all sorts of session-level lines, and
/// the relay only needs the `m=` sections and their attributes. The body
/// must still open with `v=0` and describe at least one media.
pub fn parse(raw: &[u8]) -> Result<SdpSession> {
    let text = std::str::from_utf8(raw).map_err(|_| RelayError::Sdp("not valid UTF-8".into()))?;

    let mut lines = text.lines().map(str::trim_end).filter(|l| !l.is_empty());
    match lines.next() {
        Some("v=0") => {}
        Some(other) => {
            return Err(RelayError::Sdp(format!("expected v=0, got '{other}'")));
        }
        None => return Err(RelayError::Sdp("empty description".into())),
    }

    let mut medias: Vec<SdpMedia> = Vec::new();
    for line in lines {
        let Some((kind, value)) = line.split_once('=') else {
            return Err(RelayError::Sdp(format!("malformed line '{line}'")));
        };

        match kind {
            "m" => {
                // m=<media> <port> <proto> <fmt> ...
                let mut fields = value.split_whitespace();
                let media_kind = fields
                    .next()
                    .ok_or_else(|| RelayError::Sdp("empty m= line".into()))?;
                let formats: Vec<String> = fields.skip(2).map(str::to_string).collect();
                medias.push(SdpMedia {
                    kind: media_kind.to_string(),
                    formats,
                    attributes: Vec::new(),
                });
            }
            "a" => {
                // Session-level attributes (before the first m=) are not needed.
                if let Some(media) = medias.last_mut() {
                    let (name, attr_value) = match value.split_once(':') {
                        Some((name, attr_value)) => (name, attr_value),
                        None => (value, ""),
                    };
                    media
                        .attributes
                        .push((name.to_string(), attr_value.to_string()));
                }
            }
            _ => {}
        }
    }

    if medias.is_empty() {
        return Err(RelayError::Sdp("no media sections".into()));
    }

    Ok(SdpSession { medias })
}

/// Derive the subscriber-facing session description.
///
/// Keeps one `m=` line per media with its `rtpmap` and `fmtp` attributes
/// and replaces every control attribute with `trackID=<i>`, the form the
/// distribution layer's own SETUP handling resolves. Origin and
/// connection lines are neutralized since the publisher's addresses mean
/// nothing to subscribers.
pub fn filter(session: &SdpSession) -> ServerSdp {
    let mut lines: Vec<String> = vec![
        "v=0".to_string(),
        "o=- 0 0 IN IP4 127.0.0.1".to_string(),
        "s=-".to_string(),
        "c=IN IP4 127.0.0.1".to_string(),
        "t=0 0".to_string(),
    ];

    let mut medias = Vec::with_capacity(session.medias.len());
    for (i, media) in session.medias.iter().enumerate() {
        lines.push(format!("m={} 0 RTP/AVP {}", media.kind, media.formats.join(" ")));

        let mut attributes = Vec::new();
        for (name, value) in &media.attributes {
            if name == "rtpmap" || name == "fmtp" {
                lines.push(format!("a={name}:{value}"));
                attributes.push((name.clone(), value.clone()));
            }
        }

        let control = format!("trackID={i}");
        lines.push(format!("a=control:{control}"));
        attributes.push(("control".to_string(), control));

        medias.push(SdpMedia {
            kind: media.kind.clone(),
            formats: media.formats.clone(),
            attributes,
        });
    }

    let mut raw = lines.join("\r\n");
    raw.push_str("\r\n");

    ServerSdp {
        raw: raw.into_bytes(),
        parsed: SdpSession { medias },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRACKS: &str = "v=0\r\n\
        o=- 1606 1606 IN IP4 192.168.1.10\r\n\
        s=Media Presentation\r\n\
        t=0 0\r\n\
        a=range:npt=0-\r\n\
        m=video 0 RTP/AVP 96\r\n\
        a=rtpmap:96 H264/90000\r\n\
        a=fmtp:96 packetization-mode=1\r\n\
        a=control:trackID=1\r\n\
        m=audio 0 RTP/AVP 0\r\n\
        a=control:trackID=2\r\n";

    #[test]
    fn parse_two_tracks() {
        let session = parse(TWO_TRACKS.as_bytes()).unwrap();
        assert_eq!(session.medias.len(), 2);
        assert_eq!(session.medias[0].kind, "video");
        assert_eq!(session.medias[0].formats, vec!["96"]);
        assert_eq!(session.medias[0].attribute("control"), Some("trackID=1"));
        assert_eq!(session.medias[1].kind, "audio");
        assert_eq!(session.medias[1].attribute("control"), Some("trackID=2"));
    }

    #[test]
    fn parse_distinguishes_absent_from_empty_control() {
        let sdp = "v=0\r\nm=audio 0 RTP/AVP 0\r\na=control\r\n";
        let session = parse(sdp.as_bytes()).unwrap();
        assert_eq!(session.medias[0].attribute("control"), Some(""));

        let sdp = "v=0\r\nm=audio 0 RTP/AVP 0\r\n";
        let session = parse(sdp.as_bytes()).unwrap();
        assert_eq!(session.medias[0].attribute("control"), None);
    }

    #[test]
    fn parse_rejects_non_sdp() {
        assert!(parse(b"not a description").is_err());
        assert!(parse(b"").is_err());
    }

    #[test]
    fn parse_rejects_no_media() {
        assert!(parse(b"v=0\r\ns=Session\r\n").is_err());
    }

    #[test]
    fn filter_renumbers_control_attributes() {
        let session = parse(TWO_TRACKS.as_bytes()).unwrap();
        let server = filter(&session);

        assert_eq!(server.parsed.medias.len(), 2);
        assert_eq!(server.parsed.medias[0].attribute("control"), Some("trackID=0"));
        assert_eq!(server.parsed.medias[1].attribute("control"), Some("trackID=1"));

        let text = String::from_utf8(server.raw.clone()).unwrap();
        assert!(text.starts_with("v=0\r\n"));
        assert!(text.contains("m=video 0 RTP/AVP 96\r\n"));
        assert!(text.contains("a=rtpmap:96 H264/90000\r\n"));
        assert!(text.contains("a=control:trackID=0\r\n"));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn filter_drops_publisher_session_lines() {
        let session = parse(TWO_TRACKS.as_bytes()).unwrap();
        let text = String::from_utf8(filter(&session).raw).unwrap();
        assert!(!text.contains("192.168.1.10"));
        assert!(!text.contains("Media Presentation"));
    }

    #[test]
    fn filter_output_reparses() {
        let session = parse(TWO_TRACKS.as_bytes()).unwrap();
        let server = filter(&session);
        let reparsed = parse(&server.raw).unwrap();
        assert_eq!(reparsed.medias.len(), server.parsed.medias.len());
    }
}
