//! OSC connection over UDP.
//!
//! [`OscConnection`] is the seam between the control surface and the
//! network: fire-and-forget sends plus a receive loop that drains inbound
//! datagrams into a bounded channel. [`UdpOscConnection`] is the UDP
//! implementation; tests substitute in-memory implementations.
//!
//! A connection owns one send socket, opened by
//! [`UdpConnectionBuilder::build`](crate::UdpConnectionBuilder::build), and
//! one receive socket bound to the configured receive port the first time
//! [`receive_messages`](OscConnection::receive_messages) runs. Both are
//! released by [`close`](OscConnection::close). A closed connection cannot
//! be reopened; build a new one instead.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use flexosc_core::error::{Error, Result};
use flexosc_core::{ConnectionParams, TransportOptions};
use flexosc_proto::{OscMessage, decode_message, encode_message};

use crate::udp::UdpSocketTransport;

/// Bidirectional OSC message exchange with one peer.
#[async_trait]
pub trait OscConnection: Send + Sync {
    /// The parameters this connection was built from.
    fn params(&self) -> &ConnectionParams;

    /// Encode `msg` and send it as one datagram.
    ///
    /// Returns [`Error::Closed`] without any I/O once the connection is
    /// closed. Socket errors are reported to this caller only; they do not
    /// close the connection.
    async fn send_message(&self, msg: &OscMessage) -> Result<()>;

    /// Receive, decode and forward messages into `sink` until `cancel`
    /// fires or the connection is closed.
    ///
    /// Malformed datagrams are logged and dropped. When `sink` is full the
    /// loop waits for room instead of dropping messages. Returns
    /// [`Error::StreamClosed`] if the receiving end of `sink` is dropped.
    async fn receive_messages(
        &self,
        sink: mpsc::Sender<OscMessage>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Release both sockets and stop any running receive loop. Idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// OSC over UDP: one socket for sending, one bound to the receive port.
pub struct UdpOscConnection {
    params: ConnectionParams,
    options: TransportOptions,

    /// Resolved destination for sends.
    destination: SocketAddr,

    send_socket: Mutex<Option<Arc<UdpSocketTransport>>>,

    /// Bound lazily by the first receive loop, then reused.
    rcv_socket: Mutex<Option<Arc<UdpSocketTransport>>>,

    /// Fired by `close()` to stop a running receive loop.
    shutdown: CancellationToken,

    closed: AtomicBool,
}

impl UdpOscConnection {
    /// Connect with default [`TransportOptions`].
    ///
    /// Shorthand for `UdpConnectionBuilder::new(params).build()`.
    pub async fn open(params: ConnectionParams) -> Result<Self> {
        crate::builder::UdpConnectionBuilder::new(params).build().await
    }

    pub(crate) fn from_parts(
        params: ConnectionParams,
        options: TransportOptions,
        destination: SocketAddr,
        send_socket: UdpSocketTransport,
    ) -> Self {
        Self {
            params,
            options,
            destination,
            send_socket: Mutex::new(Some(Arc::new(send_socket))),
            rcv_socket: Mutex::new(None),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// The resolved address messages are sent to.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Local address of the send socket, or `None` once closed.
    pub async fn send_local_addr(&self) -> Option<SocketAddr> {
        let socket = self.send_socket.lock().await;
        socket.as_ref().map(|s| s.local_addr())
    }

    /// Local address of the receive socket, or `None` if no receive loop
    /// has run yet or the connection is closed.
    pub async fn rcv_local_addr(&self) -> Option<SocketAddr> {
        let socket = self.rcv_socket.lock().await;
        socket.as_ref().map(|s| s.local_addr())
    }

    /// Bind the receive socket if no loop has done so yet.
    async fn rcv_socket(&self) -> Result<Arc<UdpSocketTransport>> {
        let mut slot = self.rcv_socket.lock().await;
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(socket) = slot.as_ref() {
            return Ok(Arc::clone(socket));
        }
        let socket = Arc::new(UdpSocketTransport::bind_port(self.params.rcv_port).await?);
        *slot = Some(Arc::clone(&socket));
        Ok(socket)
    }

    /// Forward one decoded message, waiting for room in `sink`.
    ///
    /// Returns `Ok(false)` if the loop was cancelled while waiting.
    async fn forward(
        &self,
        sink: &mpsc::Sender<OscMessage>,
        cancel: &CancellationToken,
        msg: OscMessage,
    ) -> Result<bool> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(false),
            _ = self.shutdown.cancelled() => Ok(false),
            sent = sink.send(msg) => match sent {
                Ok(()) => Ok(true),
                Err(_) => Err(Error::StreamClosed),
            },
        }
    }

    /// Wait one receive timeout before retrying after a socket error.
    ///
    /// Returns `false` if the loop was cancelled or the connection closed
    /// meanwhile.
    async fn back_off(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.options.receive_timeout) => true,
        }
    }
}

#[async_trait]
impl OscConnection for UdpOscConnection {
    fn params(&self) -> &ConnectionParams {
        &self.params
    }

    async fn send_message(&self, msg: &OscMessage) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let packet = encode_message(msg)?;

        // Clone the socket handle so concurrent sends never hold the lock
        // across I/O.
        let socket = {
            let guard = self.send_socket.lock().await;
            guard.as_ref().map(Arc::clone).ok_or(Error::Closed)?
        };

        tracing::debug!(
            address = %msg.address,
            remote = %self.destination,
            bytes = packet.len(),
            "Sending OSC message"
        );
        socket.send_to(&packet, self.destination).await
    }

    async fn receive_messages(
        &self,
        sink: mpsc::Sender<OscMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let socket = self.rcv_socket().await?;
        let timeout = self.options.receive_timeout;
        let mut buf = vec![0u8; self.options.max_datagram_size];

        tracing::debug!(
            local = %socket.local_addr(),
            params = %self.params,
            "Entering OSC receive loop"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                received = socket.recv_from(&mut buf, timeout) => received,
            };

            match received {
                Ok((n, src)) => match decode_message(&buf[..n]) {
                    Ok(msg) => {
                        tracing::trace!(remote = %src, message = %msg, "Received OSC message");
                        if !self.forward(&sink, &cancel, msg).await? {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            remote = %src,
                            bytes = n,
                            error = %e,
                            "Dropping malformed OSC datagram"
                        );
                    }
                },
                Err(Error::Timeout) => continue,
                Err(e) => {
                    // Transient socket errors do not end the loop.
                    tracing::debug!(error = %e, "OSC receive error, retrying");
                    if !self.back_off(&cancel).await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(params = %self.params, "Exiting OSC receive loop");
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(params = %self.params, "Closing OSC connection");

        self.shutdown.cancel();
        self.send_socket.lock().await.take();
        self.rcv_socket.lock().await.take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for UdpOscConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpOscConnection")
            .field("params", &self.params)
            .field("destination", &self.destination)
            .field("closed", &self.is_closed())
            .finish()
    }
}
