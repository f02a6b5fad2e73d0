//! Datagram socket wrapper.
//!
//! [`UdpSocketTransport`] wraps a [`tokio::net::UdpSocket`] with the error
//! mapping and logging used by the rest of flexosc. It knows nothing about
//! OSC; [`UdpOscConnection`](crate::UdpOscConnection) builds on it.
//!
//! # Example
//!
//! ```no_run
//! use flexosc_transport::UdpSocketTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> flexosc_core::Result<()> {
//! let socket = UdpSocketTransport::bind_port(8000).await?;
//!
//! let mut buf = [0u8; 4096];
//! let (n, src) = socket.recv_from(&mut buf, Duration::from_secs(1)).await?;
//! println!("Received {} bytes from {}", n, src);
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use flexosc_core::error::{Error, Result};

/// A bound UDP socket with timeout-aware receive.
#[derive(Debug)]
pub struct UdpSocketTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpSocketTransport {
    /// Bind to a local `host:port` address.
    ///
    /// Use `"0.0.0.0:0"` for an ephemeral port on all interfaces.
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "Binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "Failed to bind UDP socket");
            Error::Transport(format!("failed to bind UDP socket on {}: {}", addr, e))
        })?;

        let local_addr = socket.local_addr().map_err(|e| {
            tracing::error!(error = %e, "Failed to get local address");
            Error::Io(e)
        })?;

        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// Bind to `port` on all IPv4 interfaces (0 for any available port).
    pub async fn bind_port(port: u16) -> Result<Self> {
        Self::bind(&format!("0.0.0.0:{}", port)).await
    }

    /// Bind an ephemeral socket able to reach `dest`.
    ///
    /// The wildcard address matches the destination's address family.
    pub async fn bind_for(dest: SocketAddr) -> Result<Self> {
        match dest {
            SocketAddr::V4(_) => Self::bind("0.0.0.0:0").await,
            SocketAddr::V6(_) => Self::bind("[::]:0").await,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send `data` as one datagram to `addr`.
    ///
    /// Takes `&self`: concurrent sends each submit their own datagram.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        tracing::trace!(
            local = %self.local_addr,
            remote = %addr,
            bytes = data.len(),
            "Sending datagram"
        );

        let sent = self.socket.send_to(data, addr).await.map_err(|e| {
            tracing::debug!(
                local = %self.local_addr,
                remote = %addr,
                error = %e,
                "Failed to send datagram"
            );
            Error::Transport(format!("failed to send datagram to {}: {}", addr, e))
        })?;

        if sent != data.len() {
            return Err(Error::Transport(format!(
                "short datagram write to {}: {} of {} bytes",
                addr,
                sent,
                data.len()
            )));
        }

        Ok(())
    }

    /// Receive one datagram, waiting at most `timeout`.
    ///
    /// Returns `(bytes_read, source_addr)`. Bytes beyond `buf.len()` are
    /// discarded by the OS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if nothing arrives within `timeout`.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => {
                tracing::trace!(
                    local = %self.local_addr,
                    remote = %src,
                    bytes = n,
                    "Received datagram"
                );
                Ok((n, src))
            }
            Ok(Err(e)) => {
                tracing::debug!(
                    local = %self.local_addr,
                    error = %e,
                    "Failed to receive datagram"
                );
                Err(Error::Io(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Receive one datagram, ignoring the source address.
    pub async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let (n, _src) = self.recv_from(buf, timeout).await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_local_addr() {
        let socket = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr();

        assert_eq!(addr.ip(), std::net::Ipv4Addr::LOCALHOST);
        assert_ne!(addr.port(), 0, "OS should assign a nonzero port");
    }

    #[tokio::test]
    async fn bind_port_zero() {
        let socket = UdpSocketTransport::bind_port(0).await.unwrap();
        assert_ne!(socket.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn bind_in_use_port_is_transport_error() {
        let first = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().to_string();
        let result = UdpSocketTransport::bind(&taken).await;
        assert!(matches!(result, Err(Error::Transport(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn bind_for_matches_family() {
        let v4: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let socket = UdpSocketTransport::bind_for(v4).await.unwrap();
        assert!(socket.local_addr().is_ipv4());
    }

    #[tokio::test]
    async fn send_recv_loopback() {
        let sender = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();

        let data = b"/transport_play\0,\0\0\0";
        sender.send_to(data, receiver.local_addr()).await.unwrap();

        let mut buf = [0u8; 256];
        let n = receiver
            .recv(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(&buf[..n], data);
    }

    #[tokio::test]
    async fn recv_timeout() {
        let socket = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();

        let mut buf = [0u8; 256];
        let result = socket.recv_from(&mut buf, Duration::from_millis(50)).await;

        assert!(
            matches!(result, Err(Error::Timeout)),
            "expected Timeout, got: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn recv_from_returns_source() {
        let socket_a = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let socket_b = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();

        socket_a.send_to(b"hello", socket_b.local_addr()).await.unwrap();

        let mut buf = [0u8; 256];
        let (n, src) = socket_b
            .recv_from(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(&buf[..n], b"hello");
        assert_eq!(src, socket_a.local_addr(), "source should be socket A");
    }

    #[tokio::test]
    async fn datagrams_arrive_in_send_order_on_loopback() {
        let sender = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let dest = receiver.local_addr();

        let messages: &[&[u8]] = &[b"/goto_start", b"/next_marker", b"/goto_end"];
        for msg in messages {
            sender.send_to(msg, dest).await.unwrap();
        }

        let mut buf = [0u8; 256];
        for expected in messages {
            let n = receiver
                .recv(&mut buf, Duration::from_secs(2))
                .await
                .unwrap();
            assert_eq!(&buf[..n], *expected);
        }
    }

    #[tokio::test]
    async fn oversized_datagram_is_truncated_to_buffer() {
        let sender = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpSocketTransport::bind("127.0.0.1:0").await.unwrap();

        let data: Vec<u8> = (0..1500).map(|i| (i % 256) as u8).collect();
        sender.send_to(&data, receiver.local_addr()).await.unwrap();

        let mut buf = [0u8; 64];
        let result = receiver.recv(&mut buf, Duration::from_secs(2)).await;

        // Linux truncates silently; other platforms report an error. Either
        // way no more than the buffer is ever returned.
        if let Ok(n) = result {
            assert!(n <= buf.len());
            assert_eq!(&buf[..n], &data[..n]);
        }
    }
}
