//! Label text normalization shared by every matching tier.

use unicode_normalization::UnicodeNormalization;

/// Normalize label or OCR text for comparison.
///
/// NFC, bidi controls removed, geresh/gershayim and typographic quotes folded
/// to ASCII, whitespace collapsed, lowercased, trailing colons and quotes
/// stripped.
pub fn normalize_label(text: &str) -> String {
    let folded: String = text
        .nfc()
        .filter(|c| !is_bidi_control(*c))
        .map(|c| match c {
            '\u{05F3}' | '\u{2018}' | '\u{2019}' | '\u{00B4}' | '`' => '\'',
            '\u{05F4}' | '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{FF1A}' => ':',
            c => c,
        })
        .collect();

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed
        .trim_end_matches(|c: char| matches!(c, ':' | '"' | '\'') || c.is_whitespace())
        .to_lowercase()
}

/// Normalized text with all whitespace removed.
pub fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Edit distance relative to the label length, in characters.
pub fn relative_distance(label: &str, candidate: &str) -> f64 {
    let len = label.chars().count().max(1);
    strsim::levenshtein(label, candidate) as f64 / len as f64
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{061C}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}
