//! Text normalization for report rendering.
//!
//! The report is typeset with the standard Type1 fonts, which only cover the
//! Latin-1 range. Scraped and extracted text routinely carries typographic
//! punctuation and symbols outside that range; fold the common cases to
//! ASCII and turn the rest into spaces so every rendered string encodes
//! cleanly.

/// Fold a string into Latin-1-safe text.
///
/// - typographic quotes, dashes, and ellipses fold to their ASCII forms
/// - characters already representable in Latin-1 pass through unchanged
/// - control characters and anything unrepresentable become spaces (runs
///   collapse at layout time, where text is re-split on whitespace)
pub fn latin1_fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{25CF}' | '\u{25AA}' | '\u{00B7}' => out.push('*'),
            '\u{20AC}' => out.push_str("EUR"),
            '\u{00A0}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                out.push(' ')
            }
            _ if ch.is_control() => out.push(' '),
            _ if (ch as u32) < 0x100 => out.push(ch),
            _ => out.push(' '),
        }
    }
    out
}

/// Truncate to at most `max_chars` characters (not bytes), so multi-byte
/// input never splits mid-character.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn folds_typographic_punctuation_to_ascii() {
        let s = latin1_fold("\u{201C}quoted\u{201D} \u{2013} it\u{2019}s fine\u{2026}");
        assert_eq!(s, "\"quoted\" - it's fine...");
    }

    #[test]
    fn keeps_latin1_accents() {
        assert_eq!(latin1_fold("café à côté"), "café à côté");
    }

    #[test]
    fn unrepresentable_symbols_become_spaces() {
        assert_eq!(latin1_fold("x\u{2260}y"), "x y");
        assert_eq!(latin1_fold("a\u{6F22}b"), "a b");
    }

    #[test]
    fn control_characters_become_spaces() {
        assert_eq!(latin1_fold("a\u{0007}b\u{000C}c"), "a b c");
    }

    #[test]
    fn truncate_chars_respects_character_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    proptest! {
        #[test]
        fn folded_output_is_always_latin1(s in any::<String>()) {
            let out = latin1_fold(&s);
            prop_assert!(out.chars().all(|c| (c as u32) < 0x100));
        }

        #[test]
        fn truncate_chars_never_exceeds_the_cap(s in any::<String>(), cap in 0usize..64) {
            prop_assert!(truncate_chars(&s, cap).chars().count() <= cap);
        }
    }
}
