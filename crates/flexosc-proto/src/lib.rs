//! flexosc-proto: Open Sound Control 1.0 message codec.
//!
//! This crate is a pure codec with no I/O: it turns [`OscMessage`] values
//! into datagram payloads and back. Only the four basic atomic types are
//! supported (`i`, `f`, `s`, `b`); bundles are not.
//!
//! # Example
//!
//! ```
//! use flexosc_proto::{OscMessage, decode_message, encode_message};
//!
//! # fn example() -> flexosc_core::Result<()> {
//! let msg = OscMessage::new("/rec_enable_toggle")?;
//! let packet = encode_message(&msg)?;
//! assert_eq!(packet.len() % 4, 0);
//!
//! let decoded = decode_message(&packet)?;
//! assert_eq!(decoded, msg);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod message;

pub use atomic::{OscAtomic, OscString, align_up};
pub use message::{OscMessage, decode_message, encode_message};
