//! Inline color codes in player and server names.
//!
//! A color code is the escape character U+001B followed by three characters
//! carrying the red, green and blue components as Latin-1 code points.
//! Presentation code can either strip them or split a name into runs.

use serde::{Deserialize, Serialize};

const ESCAPE: char = '\u{1B}';

/// Text drawn before any color code appears.
pub const DEFAULT_COLOR: [u8; 3] = [255, 255, 255];

/// A run of text sharing one color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSegment {
    pub rgb: [u8; 3],
    pub text: String,
}

/// Reads a full color code starting at `chars[i]`, if there is one.
fn color_at(chars: &[char], i: usize) -> Option<[u8; 3]> {
    if chars[i] != ESCAPE || i + 3 >= chars.len() {
        return None;
    }
    let mut rgb = [0u8; 3];
    for (slot, c) in rgb.iter_mut().zip(&chars[i + 1..i + 4]) {
        *slot = u8::try_from(u32::from(*c)).ok()?;
    }
    Some(rgb)
}

/// Remove every color code from `s`.
pub fn strip_colors(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if color_at(&chars, i).is_some() {
            i += 4;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Split `s` into colored runs.
///
/// Components of zero are raised to one, matching how the game renders them.
pub fn color_segments(s: &str) -> Vec<ColorSegment> {
    let chars: Vec<char> = s.chars().collect();
    let mut segments = Vec::new();
    let mut rgb = DEFAULT_COLOR;
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if let Some(next) = color_at(&chars, i) {
            if !text.is_empty() {
                segments.push(ColorSegment {
                    rgb,
                    text: std::mem::take(&mut text),
                });
            }
            rgb = next.map(|component| component.max(1));
            i += 4;
        } else {
            text.push(chars[i]);
            i += 1;
        }
    }

    if !text.is_empty() {
        segments.push(ColorSegment { rgb, text });
    }
    segments
}
