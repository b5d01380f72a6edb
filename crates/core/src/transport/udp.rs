use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::bridge::{DistributionBridge, TrackFlow};
use crate::error::{RelayError, Result};

/// Client-side RTP port range. The low end stays above well-known service
/// ports; the range size keeps the even/odd pairing aligned.
const RTP_PORT_MIN: u16 = 10000;
const RTP_PORT_MAX: u16 = 65534;

/// How many random port pairs to try before giving up on a bind.
const BIND_ATTEMPTS: usize = 20;

/// Poll interval for the receive loop, so [`UdpListener::close`] can stop
/// it promptly.
const RECV_POLL: Duration = Duration::from_millis(50);

/// Receive buffer size; RTP packets stay under the typical 1500-byte MTU.
const RECV_BUFFER: usize = 2048;

/// Where the packets arriving on a listener belong.
#[derive(Debug, Clone)]
pub struct UdpBinding {
    /// IP of the publisher, taken from the control connection's peer.
    pub publisher_ip: IpAddr,
    /// The publisher's announced `server_port` for this flow.
    pub publisher_port: u16,
    /// Track index within the session.
    pub track_id: usize,
    /// RTP or RTCP.
    pub flow: TrackFlow,
    /// Stream path the payloads are forwarded under.
    pub path: String,
}

/// A UDP socket bound to one fixed port of an RTP/RTCP pair.
///
/// After SETUP succeeds, [`start`](Self::start) spawns a receive thread
/// that stamps `last_frame` and hands each datagram to the distribution
/// bridge. The liveness watchdog reads the stamp through
/// [`last_frame_time`](Self::last_frame_time) under the same mutex.
pub struct UdpListener {
    socket: UdpSocket,
    port: u16,
    last_frame: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl UdpListener {
    /// Bind a socket on the given port, receive-timeout configured for the
    /// polling loop.
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(RECV_POLL))?;

        Ok(UdpListener {
            socket,
            port,
            last_frame: Arc::new(Mutex::new(Instant::now())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Spawn the receive loop. Datagrams are accepted from any source; the
    /// binding's publisher address is diagnostic.
    pub fn start(&mut self, binding: UdpBinding, bridge: Arc<dyn DistributionBridge>) -> Result<()> {
        let socket = self.socket.try_clone()?;
        let last_frame = self.last_frame.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        tracing::debug!(
            stream = %binding.path,
            port = self.port,
            track_id = binding.track_id,
            flow = %binding.flow,
            publisher = %binding.publisher_ip,
            publisher_port = binding.publisher_port,
            "UDP listener started"
        );

        self.handle = Some(thread::spawn(move || {
            receive_loop(socket, binding, bridge, last_frame, running);
        }));
        Ok(())
    }

    /// Time of the most recent datagram, or of the bind if none arrived.
    pub fn last_frame_time(&self) -> Instant {
        *self.last_frame.lock()
    }

    /// Stop the receive loop and wait for it to exit.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn receive_loop(
    socket: UdpSocket,
    binding: UdpBinding,
    bridge: Arc<dyn DistributionBridge>,
    last_frame: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RECV_BUFFER];
    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                *last_frame.lock() = Instant::now();
                bridge.forward_track(&binding.path, binding.track_id, binding.flow, &buf[..len]);
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(
                        stream = %binding.path,
                        port = socket.local_addr().map(|a| a.port()).unwrap_or_default(),
                        error = %e,
                        "UDP receive error"
                    );
                }
                break;
            }
        }
    }
}

/// The RTP/RTCP listener pair backing one track in UDP mode.
pub struct UdpListenerPair {
    pub rtp: UdpListener,
    pub rtcp: UdpListener,
}

impl UdpListenerPair {
    /// Allocate a random even RTP port in `[RTP_PORT_MIN, RTP_PORT_MAX]`
    /// with `rtcp = rtp + 1` and bind both sockets. A failed bind of
    /// either releases the partner and retries with a fresh port, up to
    /// [`BIND_ATTEMPTS`] times.
    pub fn bind() -> Result<Self> {
        let mut rng = rand::rng();
        for _ in 0..BIND_ATTEMPTS {
            let rtp_port = RTP_PORT_MIN + 2 * rng.random_range(0..=(RTP_PORT_MAX - RTP_PORT_MIN) / 2);

            let rtp = match UdpListener::bind(rtp_port) {
                Ok(listener) => listener,
                Err(_) => continue,
            };
            // dropping `rtp` on failure releases the first socket
            let rtcp = match UdpListener::bind(rtp_port + 1) {
                Ok(listener) => listener,
                Err(_) => continue,
            };

            return Ok(UdpListenerPair { rtp, rtcp });
        }
        Err(RelayError::PortRangeExhausted)
    }

    pub fn rtp_port(&self) -> u16 {
        self.rtp.port()
    }

    pub fn rtcp_port(&self) -> u16 {
        self.rtcp.port()
    }

    /// Most recent datagram time across both flows.
    pub fn last_frame_time(&self) -> Instant {
        self.rtp.last_frame_time().max(self.rtcp.last_frame_time())
    }

    pub fn close(&mut self) {
        self.rtp.close();
        self.rtcp.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct CountingBridge {
        forwards: Mutex<Vec<(String, usize, TrackFlow, Vec<u8>)>>,
    }

    impl CountingBridge {
        fn new() -> Arc<Self> {
            Arc::new(CountingBridge {
                forwards: Mutex::new(Vec::new()),
            })
        }
    }

    impl DistributionBridge for CountingBridge {
        fn publish_description(
            &self,
            _path: &str,
            _client_sdp: crate::protocol::sdp::SdpSession,
            _server_sdp: crate::protocol::sdp::ServerSdp,
        ) {
        }
        fn publish_ready(&self, _path: &str) {}
        fn publish_starting(&self, _path: &str) {}
        fn forward_track(&self, path: &str, track_id: usize, flow: TrackFlow, payload: &[u8]) {
            self.forwards
                .lock()
                .push((path.to_string(), track_id, flow, payload.to_vec()));
        }
    }

    #[test]
    fn pair_ports_are_even_and_adjacent() {
        for _ in 0..10 {
            let pair = UdpListenerPair::bind().expect("pair");
            assert_eq!(pair.rtp_port() % 2, 0, "RTP port must be even");
            assert_eq!(pair.rtcp_port(), pair.rtp_port() + 1);
            assert!((RTP_PORT_MIN..=RTP_PORT_MAX).contains(&pair.rtp_port()));
        }
    }

    #[test]
    fn pair_sockets_are_bound_at_return() {
        let pair = UdpListenerPair::bind().expect("pair");
        // binding the same ports again must fail while the pair is alive
        assert!(UdpSocket::bind(("0.0.0.0", pair.rtp_port())).is_err());
        assert!(UdpSocket::bind(("0.0.0.0", pair.rtcp_port())).is_err());
    }

    #[test]
    fn listener_forwards_datagrams_and_stamps_time() {
        let mut pair = UdpListenerPair::bind().expect("pair");
        let bridge = CountingBridge::new();
        let before = pair.last_frame_time();

        pair.rtp
            .start(
                UdpBinding {
                    publisher_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
                    publisher_port: 50000,
                    track_id: 0,
                    flow: TrackFlow::Rtp,
                    path: "/cam".to_string(),
                },
                bridge.clone(),
            )
            .expect("start");

        let sender = UdpSocket::bind("127.0.0.1:0").expect("sender");
        sender
            .send_to(b"payload", ("127.0.0.1", pair.rtp_port()))
            .expect("send");

        let deadline = Instant::now() + Duration::from_secs(2);
        while bridge.forwards.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let forwards = bridge.forwards.lock();
        assert_eq!(forwards.len(), 1, "expected exactly one forwarded packet");
        assert_eq!(
            forwards[0],
            ("/cam".to_string(), 0, TrackFlow::Rtp, b"payload".to_vec())
        );
        drop(forwards);

        assert!(pair.last_frame_time() > before, "last_frame must advance");
        pair.close();
    }

    #[test]
    fn close_stops_the_receive_loop() {
        let mut pair = UdpListenerPair::bind().expect("pair");
        let bridge = CountingBridge::new();
        pair.rtp
            .start(
                UdpBinding {
                    publisher_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
                    publisher_port: 50000,
                    track_id: 0,
                    flow: TrackFlow::Rtp,
                    path: "/cam".to_string(),
                },
                bridge,
            )
            .expect("start");

        let start = Instant::now();
        pair.close();
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "close must not hang on the receive loop"
        );
    }
}
