//! Compact index encoding.
//!
//! A signed integer stored in 1 to 5 bytes:
//!
//! ```text
//! byte 0: [sign:1][more:1][value:6]
//! byte 1: [more:1][value:7]
//! byte 2: [more:1][value:7]
//! byte 3: [more:1][value:7]
//! byte 4: [value:8]
//! ```
//!
//! The magnitude is stored least significant chunk first.

use bytes::{Buf, BufMut};

use crate::error::{ProtocolError, Result};

const SIGN_BIT: u8 = 0x80;
const FIRST_MORE_BIT: u8 = 0x40;
const FIRST_VALUE_MASK: u8 = 0x3F;
const MORE_BIT: u8 = 0x80;
const VALUE_MASK: u8 = 0x7F;

/// Longest possible encoding in bytes.
pub const MAX_COMPACT_LEN: usize = 5;

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: i32) -> usize {
    let mut magnitude = value.unsigned_abs() >> 6;
    let mut len = 1;
    while magnitude != 0 && len < MAX_COMPACT_LEN {
        magnitude >>= 7;
        len += 1;
    }
    len
}

/// Append the minimal encoding of `value` to `buf`.
pub fn put_compact<B: BufMut>(buf: &mut B, value: i32) {
    let mut magnitude = value.unsigned_abs();

    let mut first = (magnitude as u8) & FIRST_VALUE_MASK;
    if value < 0 {
        first |= SIGN_BIT;
    }
    magnitude >>= 6;
    if magnitude != 0 {
        first |= FIRST_MORE_BIT;
    }
    buf.put_u8(first);

    for _ in 0..3 {
        if magnitude == 0 {
            return;
        }
        let mut byte = (magnitude as u8) & VALUE_MASK;
        magnitude >>= 7;
        if magnitude != 0 {
            byte |= MORE_BIT;
        }
        buf.put_u8(byte);
    }

    if magnitude != 0 {
        buf.put_u8(magnitude as u8);
    }
}

/// Read one compact index from the front of `buf`.
///
/// # Errors
/// `Truncated` if the buffer ends mid-value, `CompactIndexOverflow` if the
/// decoded magnitude does not fit an `i32`.
pub fn get_compact<B: Buf>(buf: &mut B) -> Result<i32> {
    let mut bytes = [0u8; MAX_COMPACT_LEN];
    let mut len = 0;

    loop {
        if !buf.has_remaining() {
            return Err(ProtocolError::Truncated {
                needed: len + 1,
                remaining: 0,
            });
        }
        let byte = buf.get_u8();
        bytes[len] = byte;
        len += 1;

        let more = match len {
            1 => byte & FIRST_MORE_BIT != 0,
            MAX_COMPACT_LEN => false,
            _ => byte & MORE_BIT != 0,
        };
        if !more {
            break;
        }
    }

    let mut magnitude: u64 = 0;
    for index in (1..len).rev() {
        let chunk = if index == MAX_COMPACT_LEN - 1 {
            bytes[index]
        } else {
            bytes[index] & VALUE_MASK
        };
        magnitude = (magnitude << 7) | u64::from(chunk);
    }
    magnitude = (magnitude << 6) | u64::from(bytes[0] & FIRST_VALUE_MASK);

    let signed = if bytes[0] & SIGN_BIT != 0 {
        -(magnitude as i64)
    } else {
        magnitude as i64
    };

    i32::try_from(signed).map_err(|_| ProtocolError::CompactIndexOverflow)
}
