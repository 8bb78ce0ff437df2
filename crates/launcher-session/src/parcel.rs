//! Binary encoding used when a session record crosses the process boundary.
//!
//! Layout: a leading empty-flag byte, then (only when populated) every field
//! in declaration order. Strings are an `i32` byte length followed by UTF-8,
//! with `-1` standing for a null string. Lists are an `i32` count followed by
//! that many strings. All integers are little-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const NULL_LENGTH: i32 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParcelError {
    #[error("parcel truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid flag byte: {0}")]
    InvalidFlag(u8),

    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    #[error("null entry in string list")]
    NullListEntry,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// Accumulates an encoded record.
#[derive(Default)]
pub struct ParcelWriter {
    buf: BytesMut,
}

impl ParcelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_string(&mut self, value: Option<&str>) {
        match value {
            None => self.buf.put_i32_le(NULL_LENGTH),
            Some(s) => {
                self.buf.put_i32_le(len_prefix(s.len()));
                self.buf.put_slice(s.as_bytes());
            }
        }
    }

    pub fn write_string_list(&mut self, values: &[String]) {
        self.buf.put_i32_le(len_prefix(values.len()));
        for value in values {
            self.write_string(Some(value));
        }
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn len_prefix(len: usize) -> i32 {
    // Frames are bounded far below i32::MAX by the transport.
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Reads fields back in the order they were written.
pub struct ParcelReader<'a> {
    buf: &'a [u8],
}

impl<'a> ParcelReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), ParcelError> {
        if self.buf.remaining() < needed {
            return Err(ParcelError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, ParcelError> {
        self.ensure(1)?;
        match self.buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ParcelError::InvalidFlag(other)),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, ParcelError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_string(&mut self) -> Result<Option<String>, ParcelError> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        let len = usize::try_from(len).map_err(|_| ParcelError::InvalidLength(len))?;
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        let value = std::str::from_utf8(head)
            .map_err(|_| ParcelError::InvalidUtf8)?
            .to_owned();
        self.buf = tail;
        Ok(Some(value))
    }

    pub fn read_string_list(&mut self) -> Result<Vec<String>, ParcelError> {
        let count = self.read_i32()?;
        let count = usize::try_from(count).map_err(|_| ParcelError::InvalidLength(count))?;
        // Each entry needs at least its length prefix.
        self.ensure(count.saturating_mul(4))?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_string()?.ok_or(ParcelError::NullListEntry)?);
        }
        Ok(values)
    }

    /// Fails if anything is left over.
    pub fn finish(self) -> Result<(), ParcelError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(ParcelError::TrailingBytes(n)),
        }
    }
}

/// A record with a fixed parcel layout.
pub trait Parcelable: Sized {
    fn write_to(&self, w: &mut ParcelWriter);

    fn read_from(r: &mut ParcelReader<'_>) -> Result<Self, ParcelError>;

    fn to_parcel(&self) -> Bytes {
        let mut w = ParcelWriter::new();
        self.write_to(&mut w);
        w.finish()
    }

    fn from_parcel(data: &[u8]) -> Result<Self, ParcelError> {
        let mut r = ParcelReader::new(data);
        let value = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}
