//! UdpConnectionBuilder -- fluent builder for [`UdpOscConnection`].
//!
//! Configuration and opening are separate steps so that the one failure
//! point of opening, host name resolution, happens at a known place:
//! [`build`](UdpConnectionBuilder::build).
//!
//! # Example
//!
//! ```no_run
//! use flexosc_core::ConnectionParams;
//! use flexosc_transport::UdpConnectionBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> flexosc_core::Result<()> {
//! let conn = UdpConnectionBuilder::new(ConnectionParams::new("studio.local", 3819, 8000))
//!     .receive_timeout(Duration::from_millis(500))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use flexosc_core::error::{Error, Result};
use flexosc_core::{ConnectionParams, TransportOptions};

use crate::connection::UdpOscConnection;
use crate::udp::UdpSocketTransport;

/// Fluent builder for [`UdpOscConnection`].
#[derive(Debug, Clone)]
pub struct UdpConnectionBuilder {
    params: ConnectionParams,
    options: TransportOptions,
}

impl UdpConnectionBuilder {
    /// Start from `params` and default [`TransportOptions`].
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            options: TransportOptions::default(),
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the receive poll interval (default: 1000ms).
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.options.receive_timeout = timeout;
        self
    }

    /// Set the receive buffer size (default: 4096 bytes).
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.options.max_datagram_size = size;
        self
    }

    /// Set the receive queue capacity (default: 64 messages).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.options.channel_capacity = capacity;
        self
    }

    /// Resolve the destination host and open the send socket.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if an option is zero.
    /// - [`Error::HostResolution`] if the host does not resolve. Not retried.
    /// - [`Error::Transport`] if the send socket cannot be bound.
    pub async fn build(self) -> Result<UdpOscConnection> {
        self.options.validate()?;

        let destination = resolve(&self.params).await?;
        let send_socket = UdpSocketTransport::bind_for(destination).await?;

        tracing::debug!(
            params = %self.params,
            destination = %destination,
            local = %send_socket.local_addr(),
            "OSC connection opened"
        );

        Ok(UdpOscConnection::from_parts(
            self.params,
            self.options,
            destination,
            send_socket,
        ))
    }
}

/// Resolve the send destination, preferring IPv4 when both families are
/// offered.
pub async fn resolve(params: &ConnectionParams) -> Result<SocketAddr> {
    let target = params.send_target();

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&target)
        .await
        .map_err(|e| {
            tracing::warn!(host = %params.address, error = %e, "Host resolution failed");
            Error::HostResolution(format!("{}: {}", params.address, e))
        })?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| Error::HostResolution(format!("{}: no addresses", params.address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::OscConnection;

    #[tokio::test]
    async fn build_resolves_ip_literal() {
        let conn = UdpConnectionBuilder::new(ConnectionParams::new("127.0.0.1", 3819, 0))
            .build()
            .await
            .unwrap();
        assert_eq!(conn.destination(), "127.0.0.1:3819".parse::<SocketAddr>().unwrap());
        assert!(!conn.is_closed());
        assert!(conn.send_local_addr().await.is_some());
        assert!(conn.rcv_local_addr().await.is_none(), "receive socket is lazy");
    }

    #[tokio::test]
    async fn build_resolves_localhost() {
        let conn = UdpConnectionBuilder::new(ConnectionParams::new("localhost", 3819, 0))
            .build()
            .await
            .unwrap();
        assert!(conn.destination().ip().is_loopback());
        assert_eq!(conn.destination().port(), 3819);
    }

    #[tokio::test]
    async fn unresolvable_host_is_host_resolution_error() {
        let result = UdpConnectionBuilder::new(ConnectionParams::new("daw.invalid", 3819, 8000))
            .build()
            .await;
        assert!(
            matches!(result, Err(Error::HostResolution(_))),
            "got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_before_io() {
        let result = UdpConnectionBuilder::new(ConnectionParams::new("daw.invalid", 3819, 8000))
            .channel_capacity(0)
            .build()
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_setters_reach_options() {
        let conn = UdpConnectionBuilder::new(ConnectionParams::new("127.0.0.1", 3819, 0))
            .receive_timeout(Duration::from_millis(250))
            .max_datagram_size(1024)
            .channel_capacity(8)
            .build()
            .await
            .unwrap();
        assert_eq!(conn.options().receive_timeout, Duration::from_millis(250));
        assert_eq!(conn.options().max_datagram_size, 1024);
        assert_eq!(conn.options().channel_capacity, 8);
    }

    #[tokio::test]
    async fn open_uses_defaults() {
        let conn = UdpOscConnection::open(ConnectionParams::new("127.0.0.1", 3819, 0))
            .await
            .unwrap();
        assert_eq!(conn.options(), &TransportOptions::default());
        assert_eq!(conn.params().send_port, 3819);
    }
}
