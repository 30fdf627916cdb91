//! Scanner (spec §4.6).
//!
//! Generalizes the teacher's `engine::process_file` name/content dispatch:
//! for every walked entry, run a name scan and, for eligible files, a
//! content scan, emitting planned [`Transaction`]s. Binary files that still
//! contain a rule's literal bytes get an informational
//! `FILE_CONTENT_BINARY_MATCH` transaction, grounded in the
//! `find_replace_handler` reference file's `memmem::find` literal-bytes
//! check.

use memchr::memmem;
use std::collections::HashSet;
use std::path::Path;

use crate::encoding::{self, DETECTION_PREFIX_BYTES};
use crate::error::Result;
use crate::matcher;
use crate::model::{Transaction, TransactionKind};
use crate::replacement_map::ReplacementMap;
use crate::walker::{EntryType, WalkedEntry};

/// Extensions scanned for content matches when `extensions` is empty
/// (spec §6.3 "empty means default text set").
const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "rs", "toml", "json", "yaml", "yml", "py", "js", "ts", "tsx", "jsx", "c",
    "h", "cpp", "hpp", "cc", "java", "go", "rb", "sh", "bash", "html", "htm", "css", "xml", "ini",
    "cfg", "conf", "env", "rtf",
];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub skip_file_renaming: bool,
    pub skip_folder_renaming: bool,
    pub skip_content: bool,
    pub process_symlink_names: bool,
    pub extensions: HashSet<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            skip_file_renaming: false,
            skip_folder_renaming: false,
            skip_content: false,
            process_symlink_names: true,
            extensions: HashSet::new(),
        }
    }
}

/// Scan every walked entry and emit the planned transactions (unordered;
/// the Planner imposes topological order).
///
/// With the `parallel` feature, entries are scanned concurrently via
/// `rayon` (spec §5: "a reader pool MAY be used during the scan phase").
/// Each entry's transactions are computed independently, so the per-entry
/// work is embarrassingly parallel; the Planner, not scan order, fixes the
/// deterministic journal order downstream.
pub fn scan(entries: &[WalkedEntry], rules: &ReplacementMap, config: &ScanConfig) -> Result<Vec<Transaction>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        entries
            .par_iter()
            .map(|entry| scan_one(entry, rules, config))
            .collect::<Result<Vec<Vec<Transaction>>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut out = Vec::new();
        for entry in entries {
            out.extend(scan_one(entry, rules, config)?);
        }
        Ok(out)
    }
}

fn scan_one(entry: &WalkedEntry, rules: &ReplacementMap, config: &ScanConfig) -> Result<Vec<Transaction>> {
    let mut out = Vec::new();
    if let Some(tx) = scan_name(entry, rules, config) {
        out.push(tx);
    }
    if entry.entry_type == EntryType::File && !config.skip_content {
        scan_content(entry, rules, config, &mut out)?;
    }
    Ok(out)
}

fn scan_name(entry: &WalkedEntry, rules: &ReplacementMap, config: &ScanConfig) -> Option<Transaction> {
    let kind = match entry.entry_type {
        EntryType::File => {
            if config.skip_file_renaming {
                return None;
            }
            TransactionKind::FileName
        }
        EntryType::Dir => {
            if config.skip_folder_renaming {
                return None;
            }
            TransactionKind::FolderName
        }
        EntryType::Symlink => {
            if !config.process_symlink_names {
                return None;
            }
            TransactionKind::SymlinkName
        }
    };

    let basename = entry.path.file_name()?.to_str()?;
    let canonical = crate::canon::canonicalize(basename);
    if !rules.contains_any(&canonical) {
        return None;
    }

    let spans = matcher::find_matches(basename, rules.rules());
    if spans.is_empty() {
        return None;
    }
    let new_basename = matcher::apply_matches(basename, &spans);
    let new_path = entry.path.with_file_name(new_basename);

    Some(Transaction::new_rename(kind, entry.path.clone(), new_path))
}

fn scan_content(
    entry: &WalkedEntry,
    rules: &ReplacementMap,
    config: &ScanConfig,
    out: &mut Vec<Transaction>,
) -> Result<()> {
    if entry.too_large_for_content {
        return Ok(());
    }
    if !extension_allowed(&entry.path, &config.extensions) {
        return Ok(());
    }

    let bytes = std::fs::read(&entry.path)?;
    let prefix_len = bytes.len().min(DETECTION_PREFIX_BYTES);
    let descriptor = encoding::detect(&bytes[..prefix_len]);

    if descriptor.is_binary {
        scan_binary_matches(entry, rules, &bytes, out);
        return Ok(());
    }

    let is_rtf = entry
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("rtf"));

    let body = &bytes[descriptor.bom_bytes.len()..];
    let lines = split_lines_keep_terminator(body);

    let mut line_number = 0usize;
    for raw_line in lines {
        line_number += 1;

        let (matched_text, spans) = if let Ok(s) = std::str::from_utf8(raw_line) {
            let spans = matcher::find_matches(s, rules.rules());
            (s.to_string(), spans)
        } else {
            let decoded = encoding::decode(raw_line, &descriptor);
            let spans = matcher::find_matches(&decoded, rules.rules());
            (decoded, spans)
        };

        if spans.is_empty() {
            // RTF control words can split a literal match across raw bytes
            // (spec §4.4: "unwrapped ... for match detection only"). A match
            // found only once control words are stripped can't be rewritten
            // byte-exactly, so it's surfaced informationally instead.
            if is_rtf {
                let plain = encoding::extract_rtf_text(raw_line);
                for extracted in matcher::find_matches(&plain, rules.rules()) {
                    out.push(Transaction::new_binary_match(
                        entry.path.clone(),
                        line_number,
                        plain[extracted.orig_start..extracted.orig_end].as_bytes(),
                    ));
                }
            }
            continue;
        }

        let new_text = matcher::apply_matches(&matched_text, &spans);
        let new_bytes = if std::str::from_utf8(raw_line).is_ok() {
            new_text.into_bytes()
        } else {
            encoding::encode(&new_text, &descriptor)
        };

        out.push(Transaction::new_content_line(
            entry.path.clone(),
            line_number,
            raw_line.to_vec(),
            new_bytes,
            descriptor.label.clone(),
            descriptor.newline_style,
        ));
    }

    Ok(())
}

fn scan_binary_matches(entry: &WalkedEntry, rules: &ReplacementMap, bytes: &[u8], out: &mut Vec<Transaction>) {
    for rule in rules.rules() {
        if rule.find.is_empty() {
            continue;
        }
        let pattern = rule.find.as_bytes();
        for offset in memmem::find_iter(bytes, pattern) {
            out.push(Transaction::new_binary_match(entry.path.clone(), offset, pattern));
        }
    }
}

fn extension_allowed(path: &Path, allow_list: &HashSet<String>) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match (ext, allow_list.is_empty()) {
        (None, _) => false,
        (Some(ext), true) => DEFAULT_TEXT_EXTENSIONS.contains(&ext.as_str()),
        (Some(ext), false) => allow_list.contains(&ext),
    }
}

/// Split `body` into lines, each slice including its own terminator bytes
/// (`\n` or `\r\n` or a lone trailing `\r`), so line bytes round-trip
/// byte-exactly when no edit applies.
pub(crate) fn split_lines_keep_terminator(body: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'\n' {
            lines.push(&body[start..=i]);
            i += 1;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < body.len() {
        lines.push(&body[start..]);
    }
    lines
}

#[allow(dead_code)]
pub fn default_text_extensions() -> &'static [&'static str] {
    DEFAULT_TEXT_EXTENSIONS
}
