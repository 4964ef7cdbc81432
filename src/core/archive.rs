//! # Archive Reader and Writer
//!
//! Cursor-style access to master server packet payloads.
//!
//! All fixed-width integers are little-endian except the compact-format IPv4
//! address, which is in network order. Strings are length-prefixed with a
//! compact index whose sign selects the character width:
//!
//! ```text
//! N = 0   empty string, no payload
//! N > 0   N Latin-1 bytes, last one NUL
//! N < 0   |N| UTF-16LE units, NUL units skipped
//! ```
//!
//! Every read checks the remaining length first and reports
//! `ProtocolError::Truncated` instead of panicking.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::compact::{get_compact, put_compact};
use crate::core::text::{latin1_to_string, utf16_to_string};
use crate::error::{ProtocolError, Result};

/// Largest string length (in characters) accepted from the wire.
pub const MAX_STRING_UNITS: i32 = 10_000;

/// Reads typed fields from the front of a payload.
#[derive(Debug, Clone)]
pub struct ArchiveReader<'a> {
    buf: &'a [u8],
}

impl<'a> ArchiveReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    /// Four raw bytes in wire order, as used for IPv4 addresses.
    pub fn read_octets(&mut self) -> Result<[u8; 4]> {
        self.ensure(4)?;
        let mut octets = [0u8; 4];
        self.buf.copy_to_slice(&mut octets);
        Ok(octets)
    }

    pub fn read_compact(&mut self) -> Result<i32> {
        get_compact(&mut self.buf)
    }

    /// Read one length-prefixed string.
    ///
    /// # Errors
    /// `StringTooLong` when the declared length exceeds [`MAX_STRING_UNITS`],
    /// `Truncated` when the payload is shorter than declared.
    pub fn read_string(&mut self) -> Result<String> {
        let count = self.read_compact()?;
        if count == 0 {
            return Ok(String::new());
        }
        if count.unsigned_abs() > MAX_STRING_UNITS as u32 {
            return Err(ProtocolError::StringTooLong(count));
        }

        let units = count.unsigned_abs() as usize;
        if count > 0 {
            self.ensure(units)?;
            let (raw, rest) = self.buf.split_at(units);
            self.buf = rest;
            let raw = raw.strip_suffix(&[0u8]).unwrap_or(raw);
            Ok(latin1_to_string(raw))
        } else {
            self.ensure(units * 2)?;
            let (raw, rest) = self.buf.split_at(units * 2);
            self.buf = rest;
            Ok(utf16_to_string(
                raw.chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
            ))
        }
    }
}

/// Builds a payload field by field.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    buf: BytesMut,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn write_octets(&mut self, octets: [u8; 4]) -> &mut Self {
        self.buf.put_slice(&octets);
        self
    }

    pub fn write_compact(&mut self, value: i32) -> &mut Self {
        put_compact(&mut self.buf, value);
        self
    }

    /// Write a length-prefixed string.
    ///
    /// Text that fits Latin-1 goes out in the 8-bit form; anything else is
    /// written as UTF-16 with a negative count. Both forms count the
    /// terminator.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        if value.is_empty() {
            return self.write_compact(0);
        }

        if value.chars().all(|c| u32::from(c) <= 0xFF) {
            let count = value.chars().count() + 1;
            self.write_compact(count as i32);
            for c in value.chars() {
                self.buf.put_u8(u32::from(c) as u8);
            }
            self.buf.put_u8(0);
        } else {
            let units: Vec<u16> = value.encode_utf16().collect();
            self.write_compact(-((units.len() + 1) as i32));
            for unit in units {
                self.buf.put_u16_le(unit);
            }
            self.buf.put_u16_le(0);
        }
        self
    }

    /// Finish the payload.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
