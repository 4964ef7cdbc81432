//! Credential hashing for the master server handshake.
//!
//! The master server checks two MD5 digests of the CD key: one of the key
//! alone and one of the key followed by the session challenge. Both are sent
//! as 32-character lowercase hex strings.

/// Lowercase hex MD5 digest of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Digest identifying the CD key.
pub fn cdkey_hash(cdkey: &str) -> String {
    md5_hex(cdkey.as_bytes())
}

/// Digest proving knowledge of the CD key for this challenge.
pub fn cdkey_response(cdkey: &str, challenge: &str) -> String {
    let mut input = Vec::with_capacity(cdkey.len() + challenge.len());
    input.extend_from_slice(cdkey.as_bytes());
    input.extend_from_slice(challenge.as_bytes());
    md5_hex(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_answers() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            md5_hex(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn test_multi_block_input() {
        // 80 bytes spans two 64-byte blocks
        let input = b"12345678901234567890123456789012345678901234567890123456789012345678901234567890";
        assert_eq!(md5_hex(input), "57edf4a22be3c955ac49da2e2107b67a");
    }

    #[test]
    fn test_response_is_digest_of_concatenation() {
        let key = "ABCDE-FGHIJ-KLMNO-PQRST";
        let challenge = "x7Fq2";
        assert_eq!(
            cdkey_response(key, challenge),
            md5_hex(format!("{key}{challenge}").as_bytes())
        );
        assert_eq!(cdkey_hash(key).len(), 32);
        assert!(cdkey_hash(key)
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
