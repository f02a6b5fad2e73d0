//! Error types for flexosc.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Wire-format, configuration, and
//! socket-level failures are all captured here.

/// The error type for all flexosc operations.
///
/// Codec errors ([`Error::Protocol`], [`Error::Encoding`]) are raised by the
/// OSC codec; the remaining variants come from the transport and surface
/// layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed wire data: missing `,` in the type tags, unsupported type
    /// tag, non-zero blob padding, truncated string or blob.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value cannot be represented on the wire (e.g. non-ASCII text in an
    /// OSC string).
    #[error("encoding constraint violated: {0}")]
    Encoding(String),

    /// The destination host name could not be resolved.
    ///
    /// This is fatal to opening a connection and is never retried
    /// automatically.
    #[error("cannot resolve host: {0}")]
    HostResolution(String),

    /// The connection was closed; no I/O was attempted.
    #[error("connection closed")]
    Closed,

    /// No connection has been configured yet.
    #[error("not connected")]
    NotConnected,

    /// Timed out waiting for a datagram.
    #[error("timeout waiting for datagram")]
    Timeout,

    /// A configuration value is malformed or out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A socket-level error with context (bind, send, receive).
    #[error("transport error: {0}")]
    Transport(String),

    /// A message stream was closed because its other end was dropped.
    #[error("stream closed")]
    StreamClosed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("missing ',' in type tags".into());
        assert_eq!(e.to_string(), "protocol error: missing ',' in type tags");
    }

    #[test]
    fn error_display_encoding() {
        let e = Error::Encoding("\"é\" is not ASCII".into());
        assert_eq!(e.to_string(), "encoding constraint violated: \"é\" is not ASCII");
    }

    #[test]
    fn error_display_host_resolution() {
        let e = Error::HostResolution("daw.invalid".into());
        assert_eq!(e.to_string(), "cannot resolve host: daw.invalid");
    }

    #[test]
    fn error_display_closed() {
        assert_eq!(Error::Closed.to_string(), "connection closed");
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for datagram");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("port out of range".into());
        assert_eq!(e.to_string(), "invalid parameter: port out of range");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("address in use"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
