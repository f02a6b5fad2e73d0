//! OSC message framing.
//!
//! A message is an address string, a type-tag string, and the arguments in
//! declaration order:
//!
//! ```text
//! Message  := Address(String) TypeTags(String) Args(Atomic)*
//! TypeTags := ',' followed by one tag per argument: 'i' | 'f' | 's' | 'b'
//! ```
//!
//! [`encode_message`] sizes the packet up front from the atomics' encoded
//! lengths and writes it in a single pass. [`decode_message`] parses a
//! received datagram back into an [`OscMessage`].

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

use flexosc_core::{Error, Result};

use crate::atomic::{OscAtomic, OscString};

/// First character of every type-tag string.
pub const TYPE_TAG_PREFIX: char = ',';

/// An OSC message: an address and an ordered list of arguments.
///
/// Two messages are equal when their addresses and argument lists are equal
/// element-wise.
///
/// ```
/// use flexosc_proto::{OscMessage, decode_message, encode_message};
///
/// let msg = OscMessage::new("/transport_play").unwrap().with_arg(1);
/// let packet = encode_message(&msg).unwrap();
/// assert_eq!(decode_message(&packet).unwrap(), msg);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    /// Destination address. Starts with `/` by convention; not enforced.
    pub address: OscString,
    /// Arguments in wire order.
    pub args: Vec<OscAtomic>,
}

impl OscMessage {
    /// A message with no arguments. Fails with [`Error::Encoding`] if the
    /// address is not ASCII.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            address: OscString::new(address)?,
            args: Vec::new(),
        })
    }

    pub fn from_parts(address: OscString, args: Vec<OscAtomic>) -> Self {
        Self { address, args }
    }

    /// Append one argument (builder style).
    pub fn with_arg(mut self, arg: impl Into<OscAtomic>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments (builder style).
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OscAtomic>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn push_arg(&mut self, arg: impl Into<OscAtomic>) {
        self.args.push(arg.into());
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    /// The type-tag string for the current arguments, e.g. `",ifs"`.
    pub fn type_tags(&self) -> OscString {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(TYPE_TAG_PREFIX);
        tags.extend(self.args.iter().map(OscAtomic::tag));
        OscString::from_ascii(tags)
    }

    /// Size in bytes of the encoded packet.
    pub fn wire_len(&self) -> usize {
        self.address.wire_len()
            + self.type_tags().wire_len()
            + self.args.iter().map(OscAtomic::wire_len).sum::<usize>()
    }

    /// Interpret the first argument as an on/off state.
    ///
    /// Returns `Some(value > 0)` when the first argument is an `Int32`, and
    /// `None` otherwise (no arguments, or another type). DAWs report toggles
    /// such as record-enable this way.
    pub fn single_bool(&self) -> Option<bool> {
        match self.args.first() {
            Some(OscAtomic::Int32(v)) => Some(*v > 0),
            _ => None,
        }
    }
}

impl fmt::Display for OscMessage {
    /// `OscMessage(/addr i:42 f:53.4 s:"text" b:[7 bytes])`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OscMessage({}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        f.write_str(")")
    }
}

/// Encode `msg` into a single OSC packet.
///
/// The buffer is allocated at its exact final size. Fails with
/// [`Error::Encoding`] only when a blob is too long for its 32-bit length
/// prefix.
pub fn encode_message(msg: &OscMessage) -> Result<Bytes> {
    if let Some(len) = msg
        .args
        .iter()
        .filter_map(OscAtomic::as_blob)
        .map(<[u8]>::len)
        .find(|&len| u32::try_from(len).is_err())
    {
        return Err(Error::Encoding(format!(
            "blob of {} bytes exceeds the 32-bit length prefix",
            len
        )));
    }

    let type_tags = msg.type_tags();
    let size = msg.address.wire_len()
        + type_tags.wire_len()
        + msg.args.iter().map(OscAtomic::wire_len).sum::<usize>();

    let mut buf = BytesMut::with_capacity(size);
    msg.address.encode(&mut buf);
    type_tags.encode(&mut buf);
    for arg in &msg.args {
        arg.encode(&mut buf);
    }
    debug_assert_eq!(buf.len(), size);

    Ok(buf.freeze())
}

/// Decode one OSC packet.
///
/// Fails with [`Error::Protocol`] if the type-tag string is empty or does
/// not start with `,`, on any unsupported tag, or on a truncated argument.
/// Bytes after the last declared argument are ignored.
pub fn decode_message(packet: &[u8]) -> Result<OscMessage> {
    let mut cursor = packet;

    let address = OscString::decode(&mut cursor)?;
    let type_tags = OscString::decode(&mut cursor)?;

    let tags = match type_tags.as_str().strip_prefix(TYPE_TAG_PREFIX) {
        Some(tags) => tags,
        None => {
            return Err(Error::Protocol(format!(
                "ill-formed message for {}: missing ',' in type tags {:?}",
                address,
                type_tags.as_str()
            )));
        }
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        args.push(OscAtomic::decode(tag, &mut cursor)?);
    }

    if cursor.has_remaining() {
        tracing::trace!(
            address = %address,
            trailing = cursor.remaining(),
            "Ignoring trailing bytes after OSC message"
        );
    }

    Ok(OscMessage { address, args })
}
