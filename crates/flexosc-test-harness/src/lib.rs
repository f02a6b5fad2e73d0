//! Test utilities for flexosc.
//!
//! - [`MockOscPeer`]: a real UDP socket on loopback that plays the DAW
//! - [`MockConnection`]: an in-memory [`OscConnection`](flexosc_transport::OscConnection)
//!   for exercising the surface without sockets

pub mod mock_connection;
pub mod mock_peer;

pub use mock_connection::MockConnection;
pub use mock_peer::MockOscPeer;
