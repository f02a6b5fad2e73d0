//! flexosc-core: Core types, configuration, and error definitions for flexosc.
//!
//! This crate holds what every other flexosc crate agrees on: the error
//! taxonomy, the peer address ([`ConnectionParams`]) and the transport
//! tunables ([`TransportOptions`]).
//!
//! # Key types
//!
//! - [`ConnectionParams`] -- host, send port and receive port of a DAW
//! - [`TransportOptions`] -- receive timeout, buffer size, queue capacity
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod options;
pub mod params;

pub use error::{Error, Result};
pub use options::TransportOptions;
pub use params::ConnectionParams;
