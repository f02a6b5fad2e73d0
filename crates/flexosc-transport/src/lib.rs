//! Transport layer for flexosc.
//!
//! This crate moves OSC messages over UDP:
//!
//! - [`UdpSocketTransport`]: a bound datagram socket with timeout-aware
//!   receive and consistent error mapping
//! - [`OscConnection`]: the send / receive-loop / close contract the control
//!   surface depends on
//! - [`UdpOscConnection`]: the UDP implementation, opened through
//!   [`UdpConnectionBuilder`]
//!
//! # Example
//!
//! ```no_run
//! use flexosc_core::ConnectionParams;
//! use flexosc_proto::OscMessage;
//! use flexosc_transport::{OscConnection, UdpOscConnection};
//!
//! # async fn example() -> flexosc_core::Result<()> {
//! let conn = UdpOscConnection::open(ConnectionParams::new("127.0.0.1", 3819, 8000)).await?;
//! conn.send_message(&OscMessage::new("/transport_play")?).await?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod connection;
pub mod udp;

pub use builder::UdpConnectionBuilder;
pub use connection::{OscConnection, UdpOscConnection};
pub use udp::UdpSocketTransport;
