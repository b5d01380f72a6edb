//! Active upstream sessions (RFC 2326 §10.4–§10.5).
//!
//! Once the supervisor has a control connection and a parsed session
//! description, one of two session types drives the media transport:
//!
//! - [`UdpSession`]: out-of-band mode. Per track, allocate an RTP/RTCP
//!   port pair and SETUP it; after PLAY the UDP listeners receive the
//!   media while the control connection only carries keepalives. A
//!   watchdog declares the stream dead when all listeners go silent.
//! - [`TcpSession`]: interleaved mode. Per track, SETUP a channel pair
//!   inside the control connection; after PLAY a reader thread shuttles
//!   interleaved frames to the distribution bridge.
//!
//! Both return `true` when the session ended recoverably (the supervisor
//! retries) and `false` on cancellation. On every exit path the session
//! rolls the stream back to Starting, which evicts its subscribers, and
//! releases every socket it opened.

pub mod transport;

use std::net::Shutdown;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded, select, tick};
use url::Url;

use crate::bridge::{DistributionBridge, TrackFlow};
use crate::error::RelayError;
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::sdp::SdpSession;
use crate::transport::tcp::{Message, RtspConn};
use crate::transport::udp::{UdpBinding, UdpListenerPair};

/// Interval between keepalive OPTIONS requests on the control connection.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// How often the liveness watchdog inspects the listeners.
pub const CHECK_STREAM_INTERVAL: Duration = Duration::from_secs(6);

/// Silence across all of a session's listeners after which the stream is
/// declared dead.
pub const STREAM_DEAD_AFTER: Duration = Duration::from_secs(5);

/// Buffer size for interleaved frame payloads.
const INTERLEAVED_BUFFER: usize = 512 * 1024;

/// Everything a session borrows from its supervising stream.
pub(crate) struct SessionContext<'a> {
    pub path: &'a str,
    pub target: &'a Url,
    pub bridge: &'a Arc<dyn DistributionBridge>,
    pub terminate: &'a Receiver<()>,
}

/// One track's bound listener pair plus the publisher ports SETUP returned.
struct TrackTransport {
    pair: UdpListenerPair,
    server_rtp_port: u16,
    server_rtcp_port: u16,
}

fn close_all(tracks: &mut [TrackTransport]) {
    for track in tracks {
        track.pair.close();
    }
}

/// UDP-mode session: out-of-band media, control channel kept for
/// keepalive and supervised by the liveness watchdog.
pub(crate) struct UdpSession<'a> {
    ctx: SessionContext<'a>,
}

impl<'a> UdpSession<'a> {
    pub(crate) fn new(ctx: SessionContext<'a>) -> Self {
        UdpSession { ctx }
    }

    /// Returns `true` if the session ended recoverably, `false` on
    /// cancellation.
    pub(crate) fn run(&self, conn: &mut RtspConn, sdp: &SdpSession) -> bool {
        let publisher_ip = conn.peer_addr().ip();
        let mut tracks: Vec<TrackTransport> = Vec::with_capacity(sdp.medias.len());

        for (i, media) in sdp.medias.iter().enumerate() {
            let mut pair = match UdpListenerPair::bind() {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "listener allocation failed");
                    close_all(&mut tracks);
                    return true;
                }
            };

            let request = RtspRequest::new(
                Method::Setup,
                transport::setup_url(self.ctx.target, media.attribute("control"), i),
            )
            .with_header(
                "Transport",
                &transport::udp_transport(pair.rtp_port(), pair.rtcp_port()),
            );

            let response = match conn.send(&request) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "SETUP failed");
                    pair.close();
                    close_all(&mut tracks);
                    return true;
                }
            };

            if response.status_code != 200 {
                tracing::error!(
                    stream = %self.ctx.path,
                    "{}",
                    RelayError::BadStatus {
                        method: "SETUP",
                        code: response.status_code,
                        message: response.status_text,
                    }
                );
                pair.close();
                close_all(&mut tracks);
                return true;
            }

            let header = match response.single_header("Transport") {
                Ok(header) => header,
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "SETUP response invalid");
                    pair.close();
                    close_all(&mut tracks);
                    return true;
                }
            };

            let Some((server_rtp_port, server_rtcp_port)) = transport::server_ports(header) else {
                tracing::error!(stream = %self.ctx.path, "{}", RelayError::MissingServerPorts);
                pair.close();
                close_all(&mut tracks);
                return true;
            };

            tracks.push(TrackTransport {
                pair,
                server_rtp_port,
                server_rtcp_port,
            });
        }

        let request = RtspRequest::new(Method::Play, self.ctx.target.clone());
        match conn.send(&request) {
            Ok(response) if response.status_code == 200 => {}
            Ok(response) => {
                tracing::error!(
                    stream = %self.ctx.path,
                    "{}",
                    RelayError::BadStatus {
                        method: "PLAY",
                        code: response.status_code,
                        message: response.status_text,
                    }
                );
                close_all(&mut tracks);
                return true;
            }
            Err(e) => {
                tracing::error!(stream = %self.ctx.path, error = %e, "PLAY failed");
                close_all(&mut tracks);
                return true;
            }
        }

        for i in 0..tracks.len() {
            let rtp_binding = UdpBinding {
                publisher_ip,
                publisher_port: tracks[i].server_rtp_port,
                track_id: i,
                flow: TrackFlow::Rtp,
                path: self.ctx.path.to_string(),
            };
            if let Err(e) = tracks[i].pair.rtp.start(rtp_binding, Arc::clone(self.ctx.bridge)) {
                tracing::error!(stream = %self.ctx.path, error = %e, "listener start failed");
                close_all(&mut tracks);
                return true;
            }

            let rtcp_binding = UdpBinding {
                publisher_ip,
                publisher_port: tracks[i].server_rtcp_port,
                track_id: i,
                flow: TrackFlow::Rtcp,
                path: self.ctx.path.to_string(),
            };
            if let Err(e) = tracks[i].pair.rtcp.start(rtcp_binding, Arc::clone(self.ctx.bridge)) {
                tracing::error!(stream = %self.ctx.path, error = %e, "listener start failed");
                close_all(&mut tracks);
                return true;
            }
        }

        self.ctx.bridge.publish_ready(self.ctx.path);
        tracing::info!(stream = %self.ctx.path, "ready");

        let recover = self.steady_loop(conn, &tracks);

        self.ctx.bridge.publish_starting(self.ctx.path);
        close_all(&mut tracks);
        recover
    }

    /// Keepalive and liveness supervision until termination or failure.
    fn steady_loop(&self, conn: &mut RtspConn, tracks: &[TrackTransport]) -> bool {
        let keepalive = tick(KEEPALIVE_INTERVAL);
        let liveness = tick(CHECK_STREAM_INTERVAL);

        loop {
            select! {
                recv(self.ctx.terminate) -> _ => {
                    return false;
                }
                recv(keepalive) -> _ => {
                    let request = RtspRequest::new(
                        Method::Options,
                        transport::options_url(self.ctx.target),
                    );
                    if let Err(e) = conn.send(&request) {
                        tracing::error!(stream = %self.ctx.path, error = %e, "keepalive failed");
                        return true;
                    }
                }
                recv(liveness) -> _ => {
                    let last_frame = tracks
                        .iter()
                        .map(|track| track.pair.last_frame_time())
                        .max();
                    let Some(last_frame) = last_frame else {
                        continue;
                    };
                    if last_frame.elapsed() >= STREAM_DEAD_AFTER {
                        tracing::error!(stream = %self.ctx.path, "{}", RelayError::StreamDead);
                        return true;
                    }
                }
            }
        }
    }
}

/// TCP-mode session: media interleaved into the control connection.
pub(crate) struct TcpSession<'a> {
    ctx: SessionContext<'a>,
}

impl<'a> TcpSession<'a> {
    pub(crate) fn new(ctx: SessionContext<'a>) -> Self {
        TcpSession { ctx }
    }

    /// Returns `true` if the session ended recoverably, `false` on
    /// cancellation. Takes the connection by value: after negotiation it
    /// belongs to the frame reader thread.
    pub(crate) fn run(&self, mut conn: RtspConn, sdp: &SdpSession) -> bool {
        for (i, media) in sdp.medias.iter().enumerate() {
            let channels = transport::interleaved_channels(i);
            let request = RtspRequest::new(
                Method::Setup,
                transport::setup_url(self.ctx.target, media.attribute("control"), i),
            )
            .with_header("Transport", &transport::interleaved_transport(i));

            let response = match conn.send(&request) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "SETUP failed");
                    return true;
                }
            };

            if response.status_code != 200 {
                tracing::error!(
                    stream = %self.ctx.path,
                    "{}",
                    RelayError::BadStatus {
                        method: "SETUP",
                        code: response.status_code,
                        message: response.status_text,
                    }
                );
                return true;
            }

            let header = match response.single_header("Transport") {
                Ok(header) => header,
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "SETUP response invalid");
                    return true;
                }
            };

            if !transport::has_interleaved(header, &channels) {
                tracing::error!(
                    stream = %self.ctx.path,
                    header,
                    "{}",
                    RelayError::MissingInterleavedChannels(channels)
                );
                return true;
            }
        }

        // The publisher may start pushing frames before answering PLAY, so
        // the response is read from the same demultiplexed message stream.
        let request = RtspRequest::new(Method::Play, self.ctx.target.clone());
        if let Err(e) = conn.send_no_response(&request) {
            tracing::error!(stream = %self.ctx.path, error = %e, "PLAY failed");
            return true;
        }

        let mut buf = vec![0u8; INTERLEAVED_BUFFER];
        loop {
            match conn.read_message(&mut buf) {
                Ok(Message::Response(response)) => {
                    if response.status_code != 200 {
                        tracing::error!(
                            stream = %self.ctx.path,
                            "{}",
                            RelayError::BadStatus {
                                method: "PLAY",
                                code: response.status_code,
                                message: response.status_text,
                            }
                        );
                        return true;
                    }
                    break;
                }
                Ok(Message::Frame(_)) => {
                    // frames sent before the PLAY response are dropped
                }
                Err(e) => {
                    tracing::error!(stream = %self.ctx.path, error = %e, "PLAY response read failed");
                    return true;
                }
            }
        }

        let shutdown = match conn.shutdown_handle() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(stream = %self.ctx.path, error = %e, "connection clone failed");
                return true;
            }
        };

        self.ctx.bridge.publish_ready(self.ctx.path);
        tracing::info!(stream = %self.ctx.path, "ready");

        let (conn_error_tx, conn_error_rx) = bounded::<()>(1);
        let bridge = Arc::clone(self.ctx.bridge);
        let path = self.ctx.path.to_string();
        let reader = thread::spawn(move || {
            loop {
                match conn.read_interleaved(&mut buf) {
                    Ok(frame) => {
                        let (track_id, flow) = transport::channel_to_track(frame.channel);
                        bridge.forward_track(&path, track_id, flow, &buf[..frame.len]);
                    }
                    Err(e) => {
                        tracing::error!(stream = %path, error = %e, "interleaved read failed");
                        let _ = conn_error_tx.send(());
                        break;
                    }
                }
            }
        });

        let recover = select! {
            recv(self.ctx.terminate) -> _ => {
                // unblocks the reader thread's pending read
                let _ = shutdown.shutdown(Shutdown::Both);
                false
            }
            recv(conn_error_rx) -> _ => true,
        };

        let _ = reader.join();
        self.ctx.bridge.publish_starting(self.ctx.path);
        recover
    }
}
