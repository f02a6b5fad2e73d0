//! Tunables for the OSC transport and receive pipeline.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default receive timeout (1 second).
///
/// Bounds how long a cancelled receive loop may keep running.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default receive buffer size. OSC bundles are not supported, so single
/// messages comfortably fit.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 4096;

/// Default capacity of the queue between the receive loop and subscribers.
///
/// A DAW announcing its markers sends a burst of messages at once; the
/// queue absorbs the burst and then applies backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Options for the UDP connection and its receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Poll interval of the receive loop. A timeout is not an error; the
    /// loop checks for cancellation and waits again.
    pub receive_timeout: Duration,
    /// Size of the receive buffer; longer datagrams are truncated by the OS
    /// and will fail to decode.
    pub max_datagram_size: usize,
    /// Capacity of the bounded queue fed by the receive loop.
    pub channel_capacity: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TransportOptions {
    /// Reject zero-valued options.
    pub fn validate(&self) -> Result<()> {
        if self.receive_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "receive_timeout must be non-zero".into(),
            ));
        }
        if self.max_datagram_size == 0 {
            return Err(Error::InvalidParameter(
                "max_datagram_size must be non-zero".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidParameter(
                "channel_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
