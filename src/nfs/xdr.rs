//! XDR encoding and decoding (RFC 4506).
//!
//! Replies to layout operations are written into a caller-provided buffer
//! whose size the client fixed in its request (`loc_body`, `da_addr`), so the
//! encoder here is bounded: every write checks the remaining budget and fails
//! with [`XdrError::BufferTooSmall`] instead of growing past it.
//!
//! ```text
//!   mark()            encode_*() ...            rewind(mark)
//!     │                    │                         │
//!     ▼                    ▼                         ▼
//!  [ prior reply | u32 | u64 | opaque<> | pad ]  →  [ prior reply ]
//! ```
//!
//! A failed encode is undone by rewinding to the mark taken before it, so
//! no partial structure ever reaches the transport.

use thiserror::Error;

/// XDR encoding/decoding error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XdrError {
    /// Output budget exhausted.
    #[error("buffer too small: needed {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    /// Input ended in the middle of an item.
    #[error("unexpected end of XDR stream")]
    UnexpectedEof,

    /// Structurally valid bytes carrying an invalid value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Variable-length item exceeds its declared bound.
    #[error("item of {len} bytes exceeds limit of {max}")]
    TooLong { len: usize, max: usize },
}

/// Result type for XDR operations.
pub type XdrResult<T> = std::result::Result<T, XdrError>;

/// Number of zero bytes needed to pad `len` to a 4-byte boundary.
pub fn pad_len(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Position in an [`XdrEncoder`] that can be rewound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XdrMark(usize);

/// Bounded XDR encoder.
#[derive(Debug, Clone)]
pub struct XdrEncoder {
    /// Encoded bytes.
    buffer: Vec<u8>,
    /// Maximum number of bytes that may be written.
    limit: usize,
}

impl XdrEncoder {
    /// Create an encoder that accepts at most `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit.min(0x2000)),
            limit,
        }
    }

    /// Create an encoder with no practical size limit.
    pub fn unbounded() -> Self {
        Self {
            buffer: Vec::new(),
            limit: usize::MAX,
        }
    }

    /// Get the encoded data.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes still available under the limit.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }

    /// Record the current position.
    pub fn mark(&self) -> XdrMark {
        XdrMark(self.buffer.len())
    }

    /// Discard everything written after `mark`.
    pub fn rewind(&mut self, mark: XdrMark) {
        self.buffer.truncate(mark.0);
    }

    fn reserve(&self, needed: usize) -> XdrResult<()> {
        let available = self.remaining();
        if needed > available {
            return Err(XdrError::BufferTooSmall { needed, available });
        }
        Ok(())
    }

    /// Encode a u32.
    pub fn encode_u32(&mut self, value: u32) -> XdrResult<()> {
        self.reserve(4)?;
        self.buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Encode an i32.
    pub fn encode_i32(&mut self, value: i32) -> XdrResult<()> {
        self.reserve(4)?;
        self.buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Encode a u64.
    pub fn encode_u64(&mut self, value: u64) -> XdrResult<()> {
        self.reserve(8)?;
        self.buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Encode an i64.
    pub fn encode_i64(&mut self, value: i64) -> XdrResult<()> {
        self.reserve(8)?;
        self.buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Encode a bool.
    pub fn encode_bool(&mut self, value: bool) -> XdrResult<()> {
        self.encode_u32(if value { 1 } else { 0 })
    }

    /// Encode opaque data (fixed length).
    pub fn encode_opaque_fixed(&mut self, data: &[u8]) -> XdrResult<()> {
        let pad = pad_len(data.len());
        self.reserve(data.len() + pad)?;
        self.buffer.extend_from_slice(data);
        self.buffer.extend_from_slice(&[0u8; 3][..pad]);
        Ok(())
    }

    /// Encode opaque data (variable length).
    pub fn encode_opaque(&mut self, data: &[u8]) -> XdrResult<()> {
        let len = u32::try_from(data.len()).map_err(|_| XdrError::TooLong {
            len: data.len(),
            max: u32::MAX as usize,
        })?;
        // Check the whole item up front so a failure leaves no length word behind.
        self.reserve(4 + data.len() + pad_len(data.len()))?;
        self.encode_u32(len)?;
        self.encode_opaque_fixed(data)
    }

    /// Encode opaque data with an upper bound (`opaque<max>`).
    pub fn encode_opaque_bounded(&mut self, data: &[u8], max: usize) -> XdrResult<()> {
        if data.len() > max {
            return Err(XdrError::TooLong {
                len: data.len(),
                max,
            });
        }
        self.encode_opaque(data)
    }

    /// Encode a string.
    pub fn encode_string(&mut self, s: &str) -> XdrResult<()> {
        self.encode_opaque(s.as_bytes())
    }

    /// Encode an array of u32.
    pub fn encode_u32_array(&mut self, values: &[u32]) -> XdrResult<()> {
        self.encode_len(values.len())?;
        for v in values {
            self.encode_u32(*v)?;
        }
        Ok(())
    }

    /// Encode an array length.
    pub fn encode_len(&mut self, len: usize) -> XdrResult<()> {
        let len = u32::try_from(len).map_err(|_| XdrError::TooLong {
            len,
            max: u32::MAX as usize,
        })?;
        self.encode_u32(len)
    }
}

impl Default for XdrEncoder {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// XDR decoder over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct XdrDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> XdrDecoder<'a> {
    /// Create a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            position: 0,
        }
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn take(&mut self, len: usize) -> XdrResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(XdrError::UnexpectedEof);
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> XdrResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Decode a u32.
    pub fn decode_u32(&mut self) -> XdrResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Decode an i32.
    pub fn decode_i32(&mut self) -> XdrResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Decode a u64.
    pub fn decode_u64(&mut self) -> XdrResult<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Decode an i64.
    pub fn decode_i64(&mut self) -> XdrResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    /// Decode a bool.
    pub fn decode_bool(&mut self) -> XdrResult<bool> {
        match self.decode_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(XdrError::InvalidData(format!("bool value {}", other))),
        }
    }

    /// Decode opaque data (fixed length).
    pub fn decode_opaque_fixed(&mut self, len: usize) -> XdrResult<&'a [u8]> {
        let padded = len
            .checked_add(pad_len(len))
            .ok_or(XdrError::UnexpectedEof)?;
        let bytes = self.take(padded)?;
        Ok(&bytes[..len])
    }

    /// Decode a fixed-size opaque into an array.
    pub fn decode_array<const N: usize>(&mut self) -> XdrResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.decode_opaque_fixed(N)?);
        Ok(out)
    }

    /// Decode opaque data (variable length).
    pub fn decode_opaque(&mut self) -> XdrResult<&'a [u8]> {
        let len = self.decode_u32()? as usize;
        self.decode_opaque_fixed(len)
    }

    /// Decode a string.
    pub fn decode_string(&mut self) -> XdrResult<String> {
        let bytes = self.decode_opaque()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| XdrError::InvalidData(e.to_string()))
    }

    /// Decode an array of u32.
    pub fn decode_u32_array(&mut self) -> XdrResult<Vec<u32>> {
        let count = self.decode_len()?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.decode_u32()?);
        }
        Ok(values)
    }

    /// Decode an array length, rejecting counts that cannot fit in the
    /// remaining input (every XDR item is at least 4 bytes).
    pub fn decode_len(&mut self) -> XdrResult<usize> {
        let count = self.decode_u32()? as usize;
        if count > self.remaining() / 4 {
            return Err(XdrError::UnexpectedEof);
        }
        Ok(count)
    }
}
