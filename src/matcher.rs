//! Matcher (spec §4.3).
//!
//! Scans canonicalized text for literal rule keys, longest-match-first, and
//! maps each canonical match back to a byte range in the original text so
//! the Executor can splice in the literal `replace` bytes without disturbing
//! anything outside the matched span.
//!
//! Canonicalization can change both the number and the byte length of
//! characters (combining marks vanish, NFD/NFC can re-shape a cluster), so a
//! naive "canonicalize the whole string, then diff positions" approach loses
//! the mapping. Instead we canonicalize one grapheme-like cluster at a time
//! -- a base character plus any combining marks that trail it in the source
//! text -- and record which original byte range produced each canonical
//! character. Combining marks never jump across a base character during
//! normalization, so clustering this way and concatenating gives the same
//! canonical text as canonicalizing the whole string at once.

use crate::canon::canonicalize;
use crate::model::ReplacementRule;
use unicode_normalization::char::is_combining_mark;

/// One canonical output character plus the original byte range its source
/// cluster occupied.
struct CanonChar {
    /// Byte offset of this char within `CanonicalIndex::canonical`.
    canonical_byte_offset: usize,
    orig_start: usize,
    orig_end: usize,
}

/// Canonical text paired with a position map back to the original string.
pub struct CanonicalIndex {
    canonical: String,
    chars: Vec<CanonChar>,
    orig_len: usize,
}

impl CanonicalIndex {
    /// Build the canonical index for `original`.
    pub fn build(original: &str) -> Self {
        let mut canonical = String::new();
        let mut chars = Vec::new();

        let char_indices: Vec<(usize, char)> = original.char_indices().collect();
        let mut cluster_start_idx = 0;
        while cluster_start_idx < char_indices.len() {
            let mut cluster_end_idx = cluster_start_idx + 1;
            while cluster_end_idx < char_indices.len() && is_combining_mark(char_indices[cluster_end_idx].1) {
                cluster_end_idx += 1;
            }
            let byte_start = char_indices[cluster_start_idx].0;
            let byte_end = if cluster_end_idx < char_indices.len() {
                char_indices[cluster_end_idx].0
            } else {
                original.len()
            };

            let piece = canonicalize(&original[byte_start..byte_end]);
            for c in piece.chars() {
                chars.push(CanonChar {
                    canonical_byte_offset: canonical.len(),
                    orig_start: byte_start,
                    orig_end: byte_end,
                });
                canonical.push(c);
            }

            cluster_start_idx = cluster_end_idx;
        }

        CanonicalIndex {
            canonical,
            chars,
            orig_len: original.len(),
        }
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Map a `[start, end)` byte range of `self.canonical()` back to the
    /// original byte range it was produced from. `start` and `end` must fall
    /// on canonical char boundaries; `end` may equal `self.canonical.len()`.
    fn map_to_original(&self, start: usize, end: usize) -> (usize, usize) {
        if self.chars.is_empty() {
            return (0, self.orig_len);
        }
        let start_idx = self
            .chars
            .binary_search_by(|c| c.canonical_byte_offset.cmp(&start))
            .unwrap_or_else(|i| i.min(self.chars.len() - 1));
        let orig_start = self.chars[start_idx].orig_start;

        let orig_end = if end >= self.canonical.len() {
            self.orig_len
        } else {
            let end_idx = self
                .chars
                .binary_search_by(|c| c.canonical_byte_offset.cmp(&end))
                .unwrap_or_else(|i| i.min(self.chars.len() - 1));
            // `end` is exclusive and sits on a char boundary, so the byte
            // range that owns it ends where the previous char's cluster
            // ends.
            if end_idx == 0 {
                self.chars[0].orig_start
            } else {
                self.chars[end_idx - 1].orig_end
            }
        };

        (orig_start, orig_end)
    }
}

/// A single resolved match: the rule that fired and the byte span in the
/// *original* text it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub orig_start: usize,
    pub orig_end: usize,
    pub replace: String,
}

/// Scan `original` for non-overlapping, longest-match-first occurrences of
/// any rule's canonical key, and return the spans in left-to-right order.
///
/// `rules` must already be sorted longest-canonical-key-first (spec §4.2
/// step 3, enforced by [`crate::replacement_map::ReplacementMap`]).
pub fn find_matches(original: &str, rules: &[ReplacementRule]) -> Vec<MatchSpan> {
    if rules.is_empty() || original.is_empty() {
        return Vec::new();
    }

    let index = CanonicalIndex::build(original);
    let canonical = index.canonical();
    let mut spans = Vec::new();
    let mut pos = 0usize;

    while pos < canonical.len() {
        let rest = &canonical[pos..];
        let mut matched = false;
        for rule in rules {
            if rule.find_canonical.is_empty() {
                continue;
            }
            if rest.starts_with(rule.find_canonical.as_str()) {
                let match_end = pos + rule.find_canonical.len();
                let (orig_start, orig_end) = index.map_to_original(pos, match_end);
                spans.push(MatchSpan {
                    orig_start,
                    orig_end,
                    replace: rule.replace.clone(),
                });
                pos = match_end;
                matched = true;
                break;
            }
        }
        if !matched {
            let advance = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            pos += advance;
        }
    }

    spans
}

/// Apply the spans returned by [`find_matches`] to `original`, splicing in
/// `replace` text and leaving every other byte untouched.
pub fn apply_matches(original: &str, spans: &[MatchSpan]) -> String {
    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&original[cursor..span.orig_start]);
        out.push_str(&span.replace);
        cursor = span.orig_end;
    }
    out.push_str(&original[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(find: &str, replace: &str) -> ReplacementRule {
        ReplacementRule {
            find: find.to_string(),
            find_canonical: canonicalize(find),
            replace: replace.to_string(),
        }
    }

    #[test]
    fn matches_plain_literal() {
        let rules = vec![rule("foo", "bar")];
        let spans = find_matches("a foo b", &rules);
        assert_eq!(spans.len(), 1);
        assert_eq!(&"a foo b"[spans[0].orig_start..spans[0].orig_end], "foo");
        assert_eq!(apply_matches("a foo b", &spans), "a bar b");
    }

    #[test]
    fn matches_across_diacritic_folding() {
        let rules = vec![rule("naive", "simple")];
        let text = "a naïve approach";
        let spans = find_matches(text, &rules);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].orig_start..spans[0].orig_end], "naïve");
        assert_eq!(apply_matches(text, &spans), "a simple approach");
    }

    #[test]
    fn matches_across_decomposed_diacritic_forms() {
        let rules = vec![rule("cafe", "coffee")];
        let text = "cafe\u{301} bar"; // e + combining acute, i.e. "café"
        let spans = find_matches(text, &rules);
        assert_eq!(spans.len(), 1);
        assert_eq!(apply_matches(text, &spans), "coffee bar");
    }

    #[test]
    fn longest_match_wins_over_shorter_prefix() {
        let rules = vec![rule("foobar", "X"), rule("foo", "Y")];
        let spans = find_matches("foobar", &rules);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].replace, "X");
    }

    #[test]
    fn matches_are_non_overlapping_and_left_to_right() {
        let rules = vec![rule("ab", "X")];
        let spans = find_matches("ababab", &rules);
        assert_eq!(spans.len(), 3);
        assert_eq!(apply_matches("ababab", &spans), "XXX");
    }

    #[test]
    fn no_match_returns_empty() {
        let rules = vec![rule("zzz", "X")];
        assert!(find_matches("nothing here", &rules).is_empty());
    }

    #[test]
    fn bytes_outside_matches_are_untouched() {
        let rules = vec![rule("bar", "BAZ")];
        let text = "prefix bar suffix with unicode café";
        let spans = find_matches(text, &rules);
        let applied = apply_matches(text, &spans);
        assert!(applied.starts_with("prefix BAZ suffix"));
        assert!(applied.ends_with("café"));
    }
}
