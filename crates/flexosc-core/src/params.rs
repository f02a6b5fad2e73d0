//! Connection parameters for an OSC peer.
//!
//! [`ConnectionParams`] names the remote host, the port the peer listens on
//! (our send port) and the local port we listen on (our receive port). It is
//! an immutable value: changing any field means building a new connection.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Upward arrow used in the display form for the send port.
const SEND_ARROW: char = '\u{2191}';

/// Downward arrow used in the display form for the receive port.
const RCV_ARROW: char = '\u{2193}';

/// Where to send OSC messages and where to listen for replies.
///
/// Displays as `host:↑send_port:↓rcv_port`. Parses from either
/// `host:send_port:rcv_port` or the display form.
///
/// ```
/// use flexosc_core::ConnectionParams;
///
/// let params: ConnectionParams = "192.168.1.20:3819:8000".parse().unwrap();
/// assert_eq!(params.send_port, 3819);
/// assert_eq!(params.to_string(), "192.168.1.20:\u{2191}3819:\u{2193}8000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParams {
    /// Host name or IP address of the DAW.
    pub address: String,
    /// UDP port the DAW listens on.
    pub send_port: u16,
    /// Local UDP port the DAW sends feedback to.
    pub rcv_port: u16,
}

impl ConnectionParams {
    pub fn new(address: impl Into<String>, send_port: u16, rcv_port: u16) -> Self {
        Self {
            address: address.into(),
            send_port,
            rcv_port,
        }
    }

    /// The `host:port` string of the send destination, suitable for
    /// `tokio::net::lookup_host` resolution.
    pub fn send_target(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            // Bare IPv6 literal.
            format!("[{}]:{}", self.address, self.send_port)
        } else {
            format!("{}:{}", self.address, self.send_port)
        }
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}:{}{}",
            self.address, SEND_ARROW, self.send_port, RCV_ARROW, self.rcv_port
        )
    }
}

impl FromStr for ConnectionParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().rsplitn(3, ':');
        let rcv = parts.next();
        let send = parts.next();
        let host = parts.next();

        let (Some(host), Some(send), Some(rcv)) = (host, send, rcv) else {
            return Err(Error::InvalidParameter(format!(
                "expected host:send_port:rcv_port, got {:?}",
                s
            )));
        };

        if host.is_empty() {
            return Err(Error::InvalidParameter(format!("empty host in {:?}", s)));
        }

        let send_port = parse_port(send.strip_prefix(SEND_ARROW).unwrap_or(send), "send")?;
        let rcv_port = parse_port(rcv.strip_prefix(RCV_ARROW).unwrap_or(rcv), "receive")?;

        Ok(Self::new(host, send_port, rcv_port))
    }
}

fn parse_port(s: &str, which: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|e| Error::InvalidParameter(format!("invalid {} port {:?}: {}", which, s, e)))
}
