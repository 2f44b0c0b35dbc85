//! Custom-token → codebook index mapping.
//!
//! The language model speaks audio as `<custom_token_N>` tokens.  The same
//! vocabulary slots are reused by all three SNAC codebooks: the value for the
//! `i`-th accepted audio token carries an offset of `(i mod 7) * 4096` on top
//! of a fixed base of 10, so subtracting both recovers the codebook-local
//! index:
//!
//! ```text
//! index = N - 10 - (i mod 7) * 4096
//! ```
//!
//! Range checks are deliberately left to the codec bridge; this module only
//! answers "is this a custom token, and what does it map to".

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening text of every custom token.
pub const CUSTOM_TOKEN_PREFIX: &str = "<custom_token_";

/// Raw vocabulary id of `<custom_token_0>`.
pub const CUSTOM_TOKEN_BASE_ID: u32 = 128_256;

/// Fixed offset between the custom-token number and codebook index space.
pub const TOKEN_VALUE_OFFSET: i64 = 10;

/// Entries per codebook.
pub const CODEBOOK_SIZE: i64 = 4096;

/// Codebook indices per frame (1 + 2 + 4).
pub const FRAME_LEN: usize = 7;

/// Matches a complete trailing custom token, e.g. `<custom_token_4321>`.
/// Surrounding whitespace and an explicit sign are tolerated inside the
/// brackets, the same leniency an integer parse of the slot would give.
static RE_CUSTOM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<custom_token_\s*([+-]?\d+)\s*>$").expect("valid regex"));

/// Extract `N` from the last `<custom_token_N>` in `text`.
///
/// Returns `None` when the marker is absent, when anything follows the
/// closing `>`, or when `N` does not parse.
pub fn custom_token_value(text: &str) -> Option<i64> {
    let text = text.trim();
    let start = text.rfind(CUSTOM_TOKEN_PREFIX)?;
    let caps = RE_CUSTOM_TOKEN.captures(&text[start..])?;
    caps[1].parse().ok()
}

/// Map a token's text to a codebook index given its position among the audio
/// tokens accepted so far.
///
/// The result may be negative or out of range; callers decide what to keep.
pub fn map_token(text: &str, position: usize) -> Option<i64> {
    let value = custom_token_value(text)?;
    let slot = (position % FRAME_LEN) as i64;
    value.checked_sub(TOKEN_VALUE_OFFSET + slot * CODEBOOK_SIZE)
}

/// Default text rendering of a raw vocabulary id.
///
/// Ids at or above [`CUSTOM_TOKEN_BASE_ID`] render as `<custom_token_N>`;
/// everything else renders empty, which the mapper ignores.
pub fn render_token(id: u32) -> String {
    match id.checked_sub(CUSTOM_TOKEN_BASE_ID) {
        Some(n) => format!("{CUSTOM_TOKEN_PREFIX}{n}>"),
        None => String::new(),
    }
}

/// Raw id that renders as `<custom_token_N>`.
pub fn custom_token_id(n: u32) -> u32 {
    CUSTOM_TOKEN_BASE_ID + n
}

/// Raw id that maps to codebook `index` when it is the `position`-th audio
/// token.  Inverse of [`map_token`] ∘ [`render_token`].
pub fn audio_token_id(index: u32, position: usize) -> u32 {
    let slot = (position % FRAME_LEN) as u32;
    custom_token_id(index + TOKEN_VALUE_OFFSET as u32 + slot * CODEBOOK_SIZE as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_is_never_an_index() {
        for text in ["", "hello", "<|eot_id|>", "custom_token_12>", "<custom_token>"] {
            for i in 0..14 {
                assert_eq!(map_token(text, i), None, "text {text:?} at {i}");
            }
        }
    }

    #[test]
    fn test_offset_cycles_every_seven() {
        let v = 30_000i64;
        let text = format!("<custom_token_{v}>");
        for i in 0..14usize {
            let expected = v - 10 - (i as i64 % 7) * 4096;
            assert_eq!(map_token(&text, i), Some(expected), "position {i}");
        }
    }

    #[test]
    fn test_last_marker_wins() {
        assert_eq!(map_token("<custom_token_11><custom_token_15>", 0), Some(5));
        assert_eq!(map_token("  <custom_token_20>\n", 0), Some(10));
    }

    #[test]
    fn test_malformed_marker() {
        assert_eq!(custom_token_value("<custom_token_12"), None);
        assert_eq!(custom_token_value("<custom_token_abc>"), None);
        assert_eq!(custom_token_value("<custom_token_12>x"), None);
        assert_eq!(custom_token_value("<custom_token_99999999999999999999>"), None);
    }

    #[test]
    fn test_small_values_go_negative() {
        assert_eq!(map_token("<custom_token_3>", 0), Some(-7));
        assert_eq!(map_token("<custom_token_10>", 1), Some(-4096));
    }

    #[test]
    fn test_render_token() {
        assert_eq!(render_token(128_266), "<custom_token_10>");
        assert_eq!(render_token(128_009), "");
    }

    #[test]
    fn test_audio_token_id_inverts_mapping() {
        for position in 0..14 {
            let id = audio_token_id(1234, position);
            assert_eq!(map_token(&render_token(id), position), Some(1234));
        }
    }
}
