//! # flexosc -- DAW transport remote control over OSC
//!
//! `flexosc` drives a digital audio workstation's transport (play, stop,
//! record, markers) with Open Sound Control messages over UDP, and listens
//! to the state the DAW reports back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flexosc::{ConnectionParams, ControlSurface};
//!
//! #[tokio::main]
//! async fn main() -> flexosc::Result<()> {
//!     let surface = ControlSurface::with_default_controls();
//!     surface.set_params(ConnectionParams::new("127.0.0.1", 3819, 8000)).await?;
//!
//!     let mut rec = surface.led_state("rec")?;
//!     surface.click("rec").await?;
//!     println!("record enabled: {:?}", rec.changed().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | `flexosc-core`         | Errors, [`ConnectionParams`], [`TransportOptions`] |
//! | `flexosc-proto`        | OSC atomics and message codec                    |
//! | `flexosc-transport`    | UDP sockets and the [`OscConnection`] trait      |
//! | `flexosc-surface`      | Message fan-out, controls, [`ControlSurface`]    |
//! | **`flexosc`**          | This facade crate -- re-exports everything       |
//!
//! ## Wire Format
//!
//! The OSC 1.0 subset understood here:
//!
//! ```text
//! Message  := Address(String) TypeTags(String) Arg*
//! String   := ASCII bytes, NUL-terminated, zero-padded to 4 bytes
//! Int32    := 4 bytes big-endian
//! Float32  := 4 bytes big-endian IEEE-754
//! Blob     := u32 big-endian length N, N bytes, zero-padded to 4 bytes
//! TypeTags := ',' then one of 'i' 'f' 's' 'b' per argument
//! ```
//!
//! Bundles are not supported.
//!
//! ## Receiving
//!
//! Inbound messages are delivered through [`Subscription`]s filtered by
//! address. The UDP receive loop only runs while at least one subscription
//! is alive, and applies backpressure instead of dropping messages when
//! subscribers are slow. If the loop fails, for instance because the
//! receive port is taken, `recv` returns the error:
//!
//! ```no_run
//! # async fn example(surface: &flexosc::ControlSurface) -> flexosc::Result<()> {
//! let mut markers = surface.subscribe("/marker_name");
//! while let Ok(msg) = markers.recv().await {
//!     println!("{}", msg);
//! }
//! # Ok(())
//! # }
//! ```

pub use flexosc_core::*;

/// OSC wire codec.
///
/// [`OscAtomic`](proto::OscAtomic) values, [`OscMessage`](proto::OscMessage)
/// and the [`encode_message`](proto::encode_message) /
/// [`decode_message`](proto::decode_message) pair.
pub mod proto {
    pub use flexosc_proto::*;
}

/// UDP transport.
pub mod transport {
    pub use flexosc_transport::*;
}

/// Controls, fan-out and the control surface.
pub mod surface {
    pub use flexosc_surface::*;
}

pub use flexosc_proto::{OscAtomic, OscMessage, OscString, decode_message, encode_message};
pub use flexosc_surface::{
    Control, ControlKind, ControlSurface, Icon, LedState, MessageStream, Position, Subscription,
    SurfaceEvent, default_transport_controls,
};
pub use flexosc_transport::{OscConnection, UdpConnectionBuilder, UdpOscConnection};
