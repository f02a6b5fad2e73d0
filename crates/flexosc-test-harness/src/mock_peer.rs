//! Loopback UDP peer standing in for a DAW.
//!
//! [`MockOscPeer`] binds a socket on `127.0.0.1`, decodes every datagram it
//! receives and queues the messages for inspection. It can also push
//! messages (or raw bytes) to a surface's receive port, the way a DAW
//! sends feedback.
//!
//! # Example
//!
//! ```no_run
//! use flexosc_test_harness::MockOscPeer;
//! use std::time::Duration;
//!
//! # async fn example() -> flexosc_core::Result<()> {
//! let mut daw = MockOscPeer::new().await?;
//! // ... point a connection at daw.port() and send something ...
//! let msg = daw.expect_message(Duration::from_secs(1)).await?;
//! assert_eq!(msg.address(), "/transport_play");
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use flexosc_core::error::{Error, Result};
use flexosc_proto::{OscMessage, decode_message, encode_message};
use flexosc_transport::UdpSocketTransport;

/// Poll interval of the peer's receive task.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A UDP peer on loopback that records the OSC messages sent to it.
pub struct MockOscPeer {
    socket: Arc<UdpSocketTransport>,
    received: mpsc::UnboundedReceiver<OscMessage>,
    malformed: mpsc::UnboundedReceiver<Vec<u8>>,
    task: JoinHandle<()>,
}

impl MockOscPeer {
    /// Bind to a random loopback port and start recording.
    pub async fn new() -> Result<Self> {
        let socket = Arc::new(UdpSocketTransport::bind("127.0.0.1:0").await?);
        let (msg_tx, received) = mpsc::unbounded_channel();
        let (raw_tx, malformed) = mpsc::unbounded_channel();

        let task = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 65_536];
                loop {
                    match socket.recv(&mut buf, POLL_INTERVAL).await {
                        Ok(n) => match decode_message(&buf[..n]) {
                            Ok(msg) => {
                                if msg_tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "Mock peer received malformed datagram");
                                if raw_tx.send(buf[..n].to_vec()).is_err() {
                                    break;
                                }
                            }
                        },
                        Err(Error::Timeout) => {
                            if msg_tx.is_closed() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Mock peer receive error");
                        }
                    }
                }
            })
        };

        Ok(Self {
            socket,
            received,
            malformed,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// The port to use as a connection's send port.
    pub fn port(&self) -> u16 {
        self.socket.local_addr().port()
    }

    /// Wait for the next message sent to this peer.
    ///
    /// Returns [`Error::Timeout`] if none arrives in time.
    pub async fn expect_message(&mut self, timeout: Duration) -> Result<OscMessage> {
        match tokio::time::timeout(timeout, self.received.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(Error::StreamClosed),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Assert-style helper: no message arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) -> Result<()> {
        match self.expect_message(wait).await {
            Err(Error::Timeout) => Ok(()),
            Ok(msg) => Err(Error::Protocol(format!("unexpected message: {}", msg))),
            Err(e) => Err(e),
        }
    }

    /// Messages received so far that have not been consumed.
    pub fn drain(&mut self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.received.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Raw datagrams that failed to decode.
    pub fn drain_malformed(&mut self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Ok(raw) = self.malformed.try_recv() {
            out.push(raw);
        }
        out
    }

    /// Send `msg` to `port` on loopback.
    pub async fn send_to_port(&self, msg: &OscMessage, port: u16) -> Result<()> {
        let packet = encode_message(msg)?;
        self.send_raw_to_port(&packet, port).await
    }

    /// Send arbitrary bytes to `port` on loopback.
    pub async fn send_raw_to_port(&self, data: &[u8], port: u16) -> Result<()> {
        let dest = SocketAddr::from(([127, 0, 0, 1], port));
        self.socket.send_to(data, dest).await
    }
}

impl Drop for MockOscPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
