use url::Url;

use crate::bridge::TrackFlow;

/// Build the request URL for SETUP of track `index` (RFC 2326 §10.4).
///
/// The control attribute of the track's media section decides the shape:
///
/// 1. No control attribute → the stream's base URL.
/// 2. Absolute control (`rtsp://...`) → used as-is; if it fails to parse,
///    fall back to the base URL.
/// 3. Relative control → base host and path (with a trailing `/`) plus the
///    control value, or `trackID=<index+1>` when the attribute is empty,
///    preserving the base query.
pub fn setup_url(base: &Url, control: Option<&str>, index: usize) -> Url {
    let control = match control {
        None => return base.clone(),
        Some(control) => control,
    };

    if control.starts_with("rtsp://") {
        return Url::parse(control).unwrap_or_else(|_| base.clone());
    }

    let mut path = base.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    if control.is_empty() {
        path.push_str(&format!("trackID={}", index + 1));
    } else {
        path.push_str(control);
    }

    let mut url = base.clone();
    url.set_path(&path);
    url
}

/// URL for OPTIONS requests: the target host with a bare `/` path and no
/// query. Used both for the reachability probe and for keepalive.
pub fn options_url(base: &Url) -> Url {
    let mut url = base.clone();
    url.set_path("/");
    url.set_query(None);
    url
}

/// Transport request header for UDP mode (RFC 2326 §12.39).
pub fn udp_transport(rtp_port: u16, rtcp_port: u16) -> String {
    format!("RTP/AVP/UDP;unicast;client_port={rtp_port}-{rtcp_port}")
}

/// The `interleaved=<rtp>-<rtcp>` parameter for track `index`; the SETUP
/// response must echo it verbatim.
pub fn interleaved_channels(index: usize) -> String {
    format!(
        "interleaved={}-{}",
        track_to_channel(index, TrackFlow::Rtp),
        track_to_channel(index, TrackFlow::Rtcp)
    )
}

/// Transport request header for interleaved TCP mode.
pub fn interleaved_transport(index: usize) -> String {
    format!("RTP/AVP/TCP;unicast;{}", interleaved_channels(index))
}

/// Extract the `server_port=RTP-RTCP` pair from a SETUP response Transport
/// header. Returns `None` when the parameter is absent or malformed; a
/// zero RTP port counts as absent (the publisher declined to commit).
pub fn server_ports(header: &str) -> Option<(u16, u16)> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(ports) = part.strip_prefix("server_port=") {
            let (rtp, rtcp) = ports.split_once('-')?;
            let rtp: u16 = rtp.trim().parse().ok()?;
            let rtcp: u16 = rtcp.trim().parse().ok()?;
            if rtp == 0 {
                return None;
            }
            return Some((rtp, rtcp));
        }
    }
    None
}

/// Whether a SETUP response Transport header echoes the exact
/// `interleaved=<rtp>-<rtcp>` token requested for a track.
pub fn has_interleaved(header: &str, token: &str) -> bool {
    header.split(';').any(|part| part.trim() == token)
}

/// Interleaved channel for a track flow: RTP on `2 * track`, RTCP on
/// `2 * track + 1`.
pub fn track_to_channel(track_id: usize, flow: TrackFlow) -> u8 {
    let base = (track_id * 2) as u8;
    match flow {
        TrackFlow::Rtp => base,
        TrackFlow::Rtcp => base + 1,
    }
}

/// Inverse of [`track_to_channel`]: even channels are RTP, odd RTCP.
pub fn channel_to_track(channel: u8) -> (usize, TrackFlow) {
    let flow = if channel % 2 == 0 {
        TrackFlow::Rtp
    } else {
        TrackFlow::Rtcp
    };
    ((channel / 2) as usize, flow)
}
