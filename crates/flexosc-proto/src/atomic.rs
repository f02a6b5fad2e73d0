//! OSC atomic values: 32-bit integers, 32-bit floats, strings and blobs.
//!
//! Every atomic occupies a multiple of 4 bytes on the wire. Numbers are
//! big-endian. Strings are ASCII, terminated by at least one NUL and padded
//! with NULs to the next 4-byte boundary. Blobs carry a 4-byte big-endian
//! length prefix followed by the bytes, zero-padded to a 4-byte boundary.
//!
//! ```text
//! Int32    := i32 BE
//! Float32  := f32 BE (IEEE-754)
//! String   := ASCII bytes, NUL, NUL padding to 4
//! Blob     := u32 BE length N, N bytes, zero padding to 4
//! ```
//!
//! Encoding writes through [`bytes::BufMut`] and decoding reads from
//! [`bytes::Buf`], so both work on `BytesMut`, `Vec<u8>`, and `&[u8]`
//! cursors alike.

use std::fmt;

use bytes::{Buf, BufMut};

use flexosc_core::{Error, Result};

/// Type tag of [`OscAtomic::Int32`].
pub const TAG_INT32: char = 'i';

/// Type tag of [`OscAtomic::Float32`].
pub const TAG_FLOAT32: char = 'f';

/// Type tag of [`OscAtomic::String`].
pub const TAG_STRING: char = 's';

/// Type tag of [`OscAtomic::Blob`].
pub const TAG_BLOB: char = 'b';

/// Round `len` up to the next multiple of 4.
///
/// ```
/// use flexosc_proto::align_up;
///
/// assert_eq!(align_up(0), 0);
/// assert_eq!(align_up(3), 4);
/// assert_eq!(align_up(4), 4);
/// assert_eq!(align_up(5), 8);
/// ```
pub const fn align_up(len: usize) -> usize {
    len + (4 - len % 4) % 4
}

// ---------------------------------------------------------------------------
// OscString
// ---------------------------------------------------------------------------

/// An ASCII-only string, as OSC addresses, type tags and string arguments
/// require.
///
/// Construction fails with [`Error::Encoding`] on any character above
/// U+007F, so encoding an `OscString` never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OscString(String);

impl OscString {
    /// Validate `value` as ASCII and wrap it.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !value.is_ascii() {
            return Err(Error::Encoding(format!("{:?} is not ASCII", value)));
        }
        Ok(Self(value))
    }

    /// Wrap a string already known to be ASCII.
    pub(crate) fn from_ascii(value: String) -> Self {
        debug_assert!(value.is_ascii());
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encoded size: payload plus at least one NUL, rounded up to 4.
    pub fn wire_len(&self) -> usize {
        align_up(self.0.len() + 1)
    }

    /// Append the NUL-terminated, padded bytes to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        let nulls = self.wire_len() - self.0.len();
        buf.put_slice(self.0.as_bytes());
        buf.put_bytes(0, nulls);
    }

    /// Read one OSC string from `buf`.
    ///
    /// Consumes 4-byte chunks until one contains a NUL; the string ends at
    /// the first NUL of that chunk. Fails with [`Error::Protocol`] if the
    /// buffer runs out first or a byte is not ASCII.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let mut bytes = Vec::new();
        loop {
            if buf.remaining() < 4 {
                return Err(Error::Protocol(format!(
                    "truncated string: no NUL terminator after {} bytes",
                    bytes.len()
                )));
            }
            let mut chunk = [0u8; 4];
            buf.copy_to_slice(&mut chunk);
            match chunk.iter().position(|&b| b == 0) {
                Some(nul) => {
                    bytes.extend_from_slice(&chunk[..nul]);
                    break;
                }
                None => bytes.extend_from_slice(&chunk),
            }
        }

        if !bytes.is_ascii() {
            return Err(Error::Protocol(format!(
                "string contains non-ASCII bytes: {:02X?}",
                bytes
            )));
        }
        // ASCII is valid UTF-8.
        let value = String::from_utf8(bytes)
            .map_err(|e| Error::Protocol(format!("invalid string bytes: {}", e)))?;
        Ok(Self(value))
    }
}

impl fmt::Display for OscString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OscString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for OscString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for OscString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl TryFrom<&str> for OscString {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for OscString {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// OscAtomic
// ---------------------------------------------------------------------------

/// A single typed OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscAtomic {
    /// 32-bit two's complement integer, tag `'i'`.
    Int32(i32),
    /// 32-bit IEEE-754 float, tag `'f'`.
    Float32(f32),
    /// ASCII string, tag `'s'`.
    String(OscString),
    /// Arbitrary bytes, tag `'b'`.
    Blob(Vec<u8>),
}

impl OscAtomic {
    /// The type tag character of this atomic.
    pub fn tag(&self) -> char {
        match self {
            OscAtomic::Int32(_) => TAG_INT32,
            OscAtomic::Float32(_) => TAG_FLOAT32,
            OscAtomic::String(_) => TAG_STRING,
            OscAtomic::Blob(_) => TAG_BLOB,
        }
    }

    /// Number of bytes [`encode`](Self::encode) writes. Always a multiple
    /// of 4.
    pub fn wire_len(&self) -> usize {
        match self {
            OscAtomic::Int32(_) | OscAtomic::Float32(_) => 4,
            OscAtomic::String(s) => s.wire_len(),
            OscAtomic::Blob(b) => 4 + align_up(b.len()),
        }
    }

    /// Type tag and encoded length together.
    pub fn tag_len(&self) -> (char, usize) {
        (self.tag(), self.wire_len())
    }

    /// Append the big-endian wire bytes of this atomic to `buf`.
    ///
    /// Blob lengths must fit the 32-bit length prefix; the message encoder
    /// checks this before calling.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            OscAtomic::Int32(v) => buf.put_i32(*v),
            OscAtomic::Float32(v) => buf.put_f32(*v),
            OscAtomic::String(s) => s.encode(buf),
            OscAtomic::Blob(b) => {
                buf.put_u32(b.len() as u32);
                buf.put_slice(b);
                buf.put_bytes(0, align_up(b.len()) - b.len());
            }
        }
    }

    /// Decode one atomic of type `tag` from `buf`.
    ///
    /// Fails with [`Error::Protocol`] on an unsupported tag, on a truncated
    /// value, or on a blob with non-zero padding.
    pub fn decode<B: Buf>(tag: char, buf: &mut B) -> Result<Self> {
        match tag {
            TAG_INT32 => {
                ensure_remaining(buf, 4, "int32")?;
                Ok(OscAtomic::Int32(buf.get_i32()))
            }
            TAG_FLOAT32 => {
                ensure_remaining(buf, 4, "float32")?;
                Ok(OscAtomic::Float32(buf.get_f32()))
            }
            TAG_STRING => Ok(OscAtomic::String(OscString::decode(buf)?)),
            TAG_BLOB => decode_blob(buf).map(OscAtomic::Blob),
            other => Err(Error::Protocol(format!(
                "unsupported OSC atomic type: {:?}",
                other
            ))),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscAtomic::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OscAtomic::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscAtomic::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            OscAtomic::Blob(b) => Some(b),
            _ => None,
        }
    }
}

fn ensure_remaining<B: Buf>(buf: &B, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::Protocol(format!(
            "truncated {}: need {} bytes, {} left",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn decode_blob<B: Buf>(buf: &mut B) -> Result<Vec<u8>> {
    ensure_remaining(buf, 4, "blob length")?;
    let len = buf.get_u32() as usize;
    let padded = align_up(len);
    ensure_remaining(buf, padded, "blob")?;

    let mut value = vec![0u8; len];
    buf.copy_to_slice(&mut value);

    for _ in len..padded {
        let pad = buf.get_u8();
        if pad != 0 {
            return Err(Error::Protocol(format!(
                "inconsistent blob: non-zero padding byte 0x{:02X}",
                pad
            )));
        }
    }
    Ok(value)
}

impl fmt::Display for OscAtomic {
    /// Compact `tag:value` form used in message logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscAtomic::Int32(v) => write!(f, "i:{}", v),
            OscAtomic::Float32(v) => write!(f, "f:{}", v),
            OscAtomic::String(s) => write!(f, "s:{:?}", s.as_str()),
            OscAtomic::Blob(b) => write!(f, "b:[{} bytes]", b.len()),
        }
    }
}

impl From<i32> for OscAtomic {
    fn from(value: i32) -> Self {
        OscAtomic::Int32(value)
    }
}

impl From<f32> for OscAtomic {
    fn from(value: f32) -> Self {
        OscAtomic::Float32(value)
    }
}

impl From<OscString> for OscAtomic {
    fn from(value: OscString) -> Self {
        OscAtomic::String(value)
    }
}

impl From<Vec<u8>> for OscAtomic {
    fn from(value: Vec<u8>) -> Self {
        OscAtomic::Blob(value)
    }
}

impl From<&[u8]> for OscAtomic {
    fn from(value: &[u8]) -> Self {
        OscAtomic::Blob(value.to_vec())
    }
}

impl TryFrom<&str> for OscAtomic {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        OscString::new(value).map(OscAtomic::String)
    }
}

impl TryFrom<String> for OscAtomic {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        OscString::new(value).map(OscAtomic::String)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
