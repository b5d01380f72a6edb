use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use rtsp_relay::protocol::sdp::{SdpSession, ServerSdp};
use rtsp_relay::{DistributionBridge, SessionTimeouts, Stream, StreamConfig, TrackFlow};

#[derive(Parser)]
#[command(
    name = "rtsp-relay",
    about = "Pull an upstream RTSP stream and report received packets"
)]
struct Args {
    /// Upstream RTSP URL (rtsp://[user:pass@]host[:port]/path)
    url: String,

    /// Transport protocol: udp or tcp
    #[arg(long, short, default_value = "udp")]
    protocol: String,

    /// Path under which a distribution layer would expose the stream
    #[arg(long, default_value = "/stream")]
    path: String,
}

/// Minimal distribution layer: counts forwarded packets and logs state
/// transitions.
#[derive(Default)]
struct ProbeBridge {
    packets: AtomicU64,
}

impl DistributionBridge for ProbeBridge {
    fn publish_description(&self, path: &str, client_sdp: SdpSession, _server_sdp: ServerSdp) {
        tracing::info!(stream = %path, tracks = client_sdp.medias.len(), "description received");
    }

    fn publish_ready(&self, path: &str) {
        tracing::info!(stream = %path, "stream ready");
    }

    fn publish_starting(&self, path: &str) {
        tracing::info!(stream = %path, "stream starting");
    }

    fn forward_track(&self, _path: &str, track_id: usize, flow: TrackFlow, payload: &[u8]) {
        let total = self.packets.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(track_id, %flow, bytes = payload.len(), total, "packet");
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let bridge = Arc::new(ProbeBridge::default());
    let config = StreamConfig {
        url: args.url,
        protocol: Some(args.protocol),
    };

    let stream = match Stream::spawn(&args.path, config, SessionTimeouts::default(), bridge.clone())
    {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to start stream: {e}");
            return;
        }
    };

    println!("relaying {} — press Enter to stop", args.path);
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    stream.close();
    println!("forwarded {} packets", bridge.packets.load(Ordering::Relaxed));
}
