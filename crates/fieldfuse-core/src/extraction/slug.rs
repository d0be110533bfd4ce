//! Field name slugs.

use std::collections::HashSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name used when a label has no transliterable characters.
const FALLBACK_NAME: &str = "field";

/// ASCII transliteration of a Hebrew letter.
fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'א' => "a",
        'ב' => "b",
        'ג' => "g",
        'ד' => "d",
        'ה' => "h",
        'ו' => "v",
        'ז' => "z",
        'ח' => "ch",
        'ט' => "t",
        'י' => "y",
        'כ' | 'ך' => "k",
        'ל' => "l",
        'מ' | 'ם' => "m",
        'נ' | 'ן' => "n",
        'ס' => "s",
        'ע' => "a",
        'פ' | 'ף' => "p",
        'צ' | 'ץ' => "ts",
        'ק' => "k",
        'ר' => "r",
        'ש' => "sh",
        'ת' => "t",
        _ => return None,
    };
    Some(latin)
}

/// Quote-like marks dropped without leaving a separator.
fn is_elided(c: char) -> bool {
    matches!(c, '\'' | '"' | '׳' | '״' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}')
}

/// Lowercase ASCII slug of a label: accents stripped, Hebrew transliterated,
/// every other run of characters replaced with `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if is_elided(c) {
            continue;
        }
        if let Some(latin) = transliterate(c) {
            slug.push_str(latin);
        } else if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug.to_string()
    }
}

/// Hands out page-unique names, suffixing `_2`, `_3`, ... on collision.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base`, or the first free suffixed variant of it.
    pub fn register(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
