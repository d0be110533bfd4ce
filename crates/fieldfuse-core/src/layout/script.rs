//! Script detection for reading direction.

use crate::models::Direction;

/// Check if a character belongs to a right-to-left script block (Hebrew, Arabic).
pub fn is_rtl_char(c: char) -> bool {
    matches!(
        c as u32,
        0x0590..=0x05FF     // Hebrew
            | 0x0600..=0x06FF // Arabic
            | 0x0750..=0x077F // Arabic Supplement
            | 0x08A0..=0x08FF // Arabic Extended-A
            | 0xFB1D..=0xFB4F // Hebrew presentation forms
            | 0xFB50..=0xFDFF // Arabic presentation forms A
            | 0xFE70..=0xFEFF // Arabic presentation forms B
    )
}

/// Direction of the majority script among the letters of `text`.
///
/// Digits, punctuation and whitespace do not vote. Ties and letterless text are LTR.
pub fn dominant_direction(text: &str) -> Direction {
    let (rtl, ltr) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(rtl, ltr), c| {
            if is_rtl_char(c) {
                (rtl + 1, ltr)
            } else {
                (rtl, ltr + 1)
            }
        });

    if rtl > ltr {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}
