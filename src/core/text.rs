//! Text conversion helpers for the legacy 8-bit and 16-bit string forms.
//!
//! Game servers send Latin-1 text, so every byte maps directly to the
//! Unicode code point of the same value. Color codes are an escape byte
//! (0x1B) followed by three raw R, G, B bytes; they survive cleaning as four
//! characters so that presentation code can pick them apart again.

/// Escape byte that introduces an inline color code.
pub const COLOR_ESCAPE: u8 = 0x1B;

/// Decode Latin-1 bytes into a `String`.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode little-endian UTF-16 units, skipping NUL units.
///
/// Unpaired surrogates become U+FFFD.
pub fn utf16_to_string<I>(units: I) -> String
where
    I: IntoIterator<Item = u16>,
{
    char::decode_utf16(units.into_iter().filter(|&unit| unit != 0))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Drop the 1-byte length prefix the query protocol puts on string fields.
///
/// A field of one byte or less is returned untouched.
pub fn skip_length_prefix(raw: &[u8]) -> &[u8] {
    if raw.len() > 1 {
        &raw[1..]
    } else {
        raw
    }
}

/// Clean a raw text field from a query reply.
///
/// Control characters and DEL are dropped, color codes are kept intact
/// and high Latin-1 bytes are mapped to their code points.
pub fn clean_text(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let byte = raw[i];
        if byte == COLOR_ESCAPE && i + 3 < raw.len() {
            out.extend(raw[i..i + 4].iter().map(|&b| char::from(b)));
            i += 4;
            continue;
        }
        if byte >= 0x20 && byte != 0x7F {
            out.push(char::from(byte));
        }
        i += 1;
    }
    out
}

/// Split a datagram on NUL bytes.
///
/// A trailing fragment without a terminator is kept as the last field.
pub fn split_nul(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut fields: Vec<&[u8]> = data.split(|&b| b == 0).collect();
    // `split` yields an empty tail after a final terminator
    if data.last() == Some(&0) {
        fields.pop();
    }
    fields
}
