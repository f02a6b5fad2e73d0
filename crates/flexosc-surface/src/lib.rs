//! Control surface layer for flexosc.
//!
//! - [`MessageStream`] / [`Subscription`]: address-filtered fan-out of a
//!   connection's inbound messages, receiving only while someone listens
//! - [`Control`], [`Icon`], [`Position`], [`LedState`]: buttons on a grid,
//!   and the LED state fed back by the DAW
//! - [`ControlSurface`]: controls plus the current connection, swapped as a
//!   whole when the connection parameters change

pub mod control;
pub mod stream;
pub mod surface;

pub use control::{Control, ControlKind, Icon, LedState, Position, default_transport_controls};
pub use stream::{MessageStream, Subscription};
pub use surface::{ControlSurface, SurfaceEvent};
