//! CD key normalization.
//!
//! Keys are typed by hand or copied from install media in many shapes. The
//! master server expects the canonical `XXXXX-XXXXX-XXXXX-XXXXX` form in
//! uppercase.

/// Longest normalized key.
pub const CDKEY_MAX_LEN: usize = 23;

const GROUP_LEN: usize = 5;
const BARE_KEY_LEN: usize = 20;

/// Normalize a raw CD key.
///
/// Keeps ASCII alphanumerics and dashes, turns spaces and underscores into
/// dashes and stops at the first other character. A bare 20 character key
/// is grouped in fives. The result is uppercase and at most
/// [`CDKEY_MAX_LEN`] characters long.
pub fn normalize_cdkey(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            c if c.is_ascii_alphanumeric() || c == '-' => key.push(c.to_ascii_uppercase()),
            ' ' | '_' => key.push('-'),
            _ => break,
        }
    }

    if !key.contains('-') && key.len() == BARE_KEY_LEN {
        let groups: Vec<&str> = (0..BARE_KEY_LEN)
            .step_by(GROUP_LEN)
            .map(|start| &key[start..start + GROUP_LEN])
            .collect();
        key = groups.join("-");
    }

    key.truncate(CDKEY_MAX_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_key_is_grouped() {
        assert_eq!(
            normalize_cdkey("abcde12345fghij67890"),
            "ABCDE-12345-FGHIJ-67890"
        );
    }

    #[test]
    fn test_separators_become_dashes() {
        assert_eq!(
            normalize_cdkey("abcde 12345_fghij-67890"),
            "ABCDE-12345-FGHIJ-67890"
        );
    }

    #[test]
    fn test_stops_at_first_invalid_character() {
        // A trailing newline from a key file ends the key
        assert_eq!(
            normalize_cdkey("ABCDE-12345-FGHIJ-67890\nrest"),
            "ABCDE-12345-FGHIJ-67890"
        );
        assert_eq!(normalize_cdkey("AB#CD"), "AB");
    }

    #[test]
    fn test_long_input_is_truncated() {
        let key = normalize_cdkey("ABCDE-12345-FGHIJ-67890-EXTRA");
        assert_eq!(key.len(), CDKEY_MAX_LEN);
        assert_eq!(key, "ABCDE-12345-FGHIJ-67890");
    }
}
