//! Replacement Map (spec §4.2).
//!
//! Loads the mapping document (§6.1), builds the canonical rule table, and
//! validates the invariants in §3.1: no two rules share a canonical `find`,
//! no rule's `replace` can reintroduce any rule's canonical `find` (cycle
//! prevention), and no `find` canonicalizes to the empty string.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::canon::canonicalize;
use crate::error::{Error, Result};
use crate::model::ReplacementRule;

/// On-disk shape of the mapping document (spec §6.1). Unknown top-level
/// members are ignored via `serde`'s default "unknown fields are dropped on
/// deserialize" behavior — no `deny_unknown_fields` is set.
#[derive(Debug, Deserialize, Serialize)]
struct MappingDocument {
    #[serde(rename = "REPLACEMENT_MAPPING")]
    replacement_mapping: HashMap<String, String>,
}

/// The validated, ordered rule table the Matcher scans against.
///
/// Ordering is longest-canonical-key-first, ties broken by original
/// insertion order (spec §4.2 step 3), which is what makes the Matcher's
/// left-to-right scan longest-match-first without per-position search.
#[derive(Debug, Clone)]
pub struct ReplacementMap {
    rules: Vec<ReplacementRule>,
}

impl ReplacementMap {
    /// Load and validate a mapping document from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a mapping document already in memory (used by
    /// tests and by any embedder that doesn't want to touch the
    /// filesystem).
    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: MappingDocument = serde_json::from_str(text)
            .map_err(|e| Error::InvalidMapping(format!("failed to parse mapping document: {e}")))?;
        Self::from_pairs(doc.replacement_mapping.into_iter())
    }

    /// Build from an arbitrary iterator of (find, replace) pairs, applying
    /// every validation step in spec §4.2.
    pub fn from_pairs(pairs: impl Iterator<Item = (String, String)>) -> Result<Self> {
        // Step 1: canonicalize keys, rejecting empty canonical forms.
        // Step insertion order is preserved so that ties at step 3 resolve
        // to "first declared wins".
        let mut rules: Vec<ReplacementRule> = Vec::new();
        let mut seen_canonical: HashMap<String, String> = HashMap::new();

        for (find, replace) in pairs {
            let find_canonical = canonicalize(&find);
            if find_canonical.is_empty() {
                return Err(Error::EmptyKey { find });
            }

            // Step 2: duplicate detection on canon_k.
            if let Some(existing_find) = seen_canonical.get(&find_canonical) {
                return Err(Error::DuplicateKey {
                    canonical: find_canonical,
                    find_a: existing_find.clone(),
                    find_b: find,
                });
            }
            seen_canonical.insert(find_canonical.clone(), find.clone());

            rules.push(ReplacementRule {
                find,
                find_canonical,
                replace,
            });
        }

        // Step 3: sort by canonical length descending, stable so ties keep
        // insertion order.
        rules.sort_by(|a, b| b.find_canonical.len().cmp(&a.find_canonical.len()));

        // Step 4: cycle check. For each rule, the canonicalized replacement
        // must not contain any rule's canonical find as a substring.
        let mut offenders = Vec::new();
        for rule in &rules {
            let canonical_replace = canonicalize(&rule.replace);
            for other in &rules {
                if canonical_replace.contains(&other.find_canonical) {
                    offenders.push(rule.find.clone());
                    break;
                }
            }
        }
        if !offenders.is_empty() {
            return Err(Error::CyclicMapping { offenders });
        }

        Ok(ReplacementMap { rules })
    }

    /// Ordered view of the rule table (longest canonical `find` first).
    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    /// True if `canonical_text` contains any rule's canonical `find`
    /// anywhere as a substring. Used by the Scanner's name/content
    /// pre-filter before running the full Matcher scan.
    pub fn contains_any(&self, canonical_text: &str) -> bool {
        self.rules
            .iter()
            .any(|r| canonical_text.contains(&r.find_canonical))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs<'a>(items: &'a [(&'a str, &'a str)]) -> impl Iterator<Item = (String, String)> + 'a {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string()))
    }

    #[test]
    fn sorts_longest_first() {
        let map = ReplacementMap::from_pairs(pairs(&[("ab", "Y"), ("abc", "X")])).unwrap();
        let keys: Vec<_> = map.rules().iter().map(|r| r.find_canonical.as_str()).collect();
        assert_eq!(keys, vec!["abc", "ab"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let map = ReplacementMap::from_pairs(pairs(&[("ab", "1"), ("cd", "2")])).unwrap();
        let keys: Vec<_> = map.rules().iter().map(|r| r.find.as_str()).collect();
        assert_eq!(keys, vec!["ab", "cd"]);
    }

    #[test]
    fn rejects_empty_canonical_key() {
        // A control character alone canonicalizes to the empty string.
        let err = ReplacementMap::from_pairs(pairs(&[("\u{0007}", "x")])).unwrap_err();
        assert!(matches!(err, Error::EmptyKey { .. }));
    }

    #[test]
    fn rejects_duplicate_canonical_keys() {
        let err = ReplacementMap::from_pairs(pairs(&[("cafe", "a"), ("café", "b")])).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn rejects_self_reintroducing_cycle() {
        let err = ReplacementMap::from_pairs(pairs(&[("foo", "xfoox")])).unwrap_err();
        assert!(matches!(err, Error::CyclicMapping { .. }));
    }

    #[test]
    fn rejects_cross_rule_cycle() {
        // replace of "A" reintroduces the canonical find of "B".
        let err = ReplacementMap::from_pairs(pairs(&[("A", "B"), ("B", "A")]))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::CyclicMapping { .. }));
    }

    #[test]
    fn allows_a_simple_swap_via_distinct_names() {
        // Not every two-rule set is cyclic: "X" -> "Y-marker" and
        // "Z" -> "other" do not reintroduce each other's keys.
        let map = ReplacementMap::from_pairs(pairs(&[("X", "Y-marker"), ("Z", "other")])).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn contains_any_checks_canonical_form() {
        let map = ReplacementMap::from_pairs(pairs(&[("naive", "simple")])).unwrap();
        assert!(map.contains_any(&canonicalize("naïve")));
        assert!(!map.contains_any(&canonicalize("something else")));
    }

    #[test]
    fn loads_from_json_ignoring_unknown_members() {
        let json = r#"{"REPLACEMENT_MAPPING": {"OldName": "NewName"}, "extra": 1}"#;
        let map = ReplacementMap::from_json_str(json).unwrap();
        assert_eq!(map.len(), 1);
    }
}
