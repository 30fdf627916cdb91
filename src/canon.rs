//! Canonicalizer (spec §4.1).
//!
//! Folds text into a comparison form used only for matching decisions: NFC
//! normalization, combining marks stripped (via NFD decomposition first),
//! and C0/C1 control characters dropped except tab/newline/CR. Replacement
//! bytes written back to disk are always the literal `replace` text, never
//! the canonical form — canonicalization exists purely so the Matcher can
//! find `naive` inside `naïve`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// U+DC80..=U+DCFF is the surrogate-escape range some decoders use to
/// round-trip invalid bytes through `char`. These are passed through
/// canonicalization unchanged; Rust's `char` cannot actually represent
/// surrogates, so in practice this crate never constructs one, but the
/// predicate is kept so intent is explicit wherever canonicalization logic
/// is read.
#[inline]
fn is_surrogate_escape(c: char) -> bool {
    (0xDC80..=0xDCFF).contains(&(c as u32))
}

#[inline]
fn is_stripped_control(c: char) -> bool {
    if c == '\t' || c == '\n' || c == '\r' {
        return false;
    }
    if is_surrogate_escape(c) {
        return false;
    }
    matches!(c, '\u{0}'..='\u{1F}' | '\u{7F}')
}

/// Canonicalize a string per spec §4.1: NFD decompose, drop combining
/// marks, drop stripped control characters, then NFC recompose.
///
/// Idempotent and deterministic: `canonicalize(canonicalize(s)) ==
/// canonicalize(s)` for all `s` (tested below, including the `proptest`
/// property test at the bottom of this module).
pub fn canonicalize(s: &str) -> String {
    s.nfd()
        .filter(|&c| !is_combining_mark(c) && !is_stripped_control(c))
        .collect::<String>()
        .nfc()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let s = "Café naïve\u{0007}\tX\r\n";
        let once = canonicalize(s);
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn folds_diacritics() {
        assert_eq!(canonicalize("café"), canonicalize("cafe\u{301}"));
        assert_eq!(canonicalize("cafe\u{301}"), "cafe");
    }

    #[test]
    fn strips_control_chars_but_keeps_whitespace_structure() {
        let s = "a\u{0}b\u{7F}c\td\ne\rf";
        assert_eq!(canonicalize(s), "abc\td\ne\rf");
    }

    #[test]
    fn passes_through_surrogate_escape_marker() {
        // We can't literally construct a lone surrogate `char` in Rust, so
        // this documents that the predicate excludes the range rather than
        // asserting on an unconstructable input.
        assert!(!is_surrogate_escape('a'));
    }

    #[test]
    fn nfc_normalizes_decomposed_forms() {
        let decomposed = "e\u{301}"; // e + combining acute
        let composed = "\u{e9}"; // é
        assert_eq!(canonicalize(decomposed), canonicalize(composed));
    }

    proptest::proptest! {
        #[test]
        fn idempotence_holds_for_arbitrary_strings(s in ".*") {
            let once = canonicalize(&s);
            let twice = canonicalize(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
