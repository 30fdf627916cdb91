use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A single literal find/replace rule, as loaded from the mapping document
/// (spec §6.1) and expanded by the replacement map loader.
///
/// `find_canonical` is computed once at load time (§4.2) and is what the
/// matcher actually scans for; `find` is kept for error messages and for
/// re-serializing the mapping document unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub find: String,
    pub find_canonical: String,
    pub replace: String,
}

/// The kind of mutation a transaction performs.
///
/// Wire label is UPPERCASE (§6.2: "Field naming is UPPERCASE for TYPE,
/// PATH, STATUS").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    FileName,
    FolderName,
    FileContentLine,
    /// Informational only; never executed. See spec §4.6 "Binary match log".
    FileContentBinaryMatch,
    SymlinkName,
}

impl TransactionKind {
    pub fn is_rename(self) -> bool {
        matches!(
            self,
            TransactionKind::FileName | TransactionKind::FolderName | TransactionKind::SymlinkName
        )
    }

    pub fn is_content(self) -> bool {
        matches!(self, TransactionKind::FileContentLine)
    }
}

/// Lifecycle state of a transaction (spec §4.9 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
    RetryLater,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Skipped
        )
    }
}

/// Dominant newline convention observed in a file (spec §3.1, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum NewlineStyle {
    Lf,
    Crlf,
    Cr,
    Mixed,
    /// No line terminators found at all (single-line or empty file).
    None,
}

/// Lossless byte payload for a content transaction.
///
/// Resolves the Journal's surrogate-escape Open Question (spec §9): bytes
/// that decode as valid UTF-8 are stored as a plain JSON string (`Raw`) so
/// the common case stays human-readable in the journal file; anything else
/// (invalid UTF-8, lone surrogate-escape sentinels folded back to bytes) is
/// base64-wrapped (`Base64`) so the round trip is exact regardless of
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum LineBytes {
    Raw(String),
    Base64(String),
}

impl LineBytes {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => LineBytes::Raw(s.to_string()),
            Err(_) => LineBytes::Base64(BASE64.encode(bytes)),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            LineBytes::Raw(s) => Ok(s.as_bytes().to_vec()),
            LineBytes::Base64(s) => BASE64
                .decode(s)
                .map_err(|e| Error::InvalidMapping(format!("bad base64 in journal: {e}"))),
        }
    }

    pub fn as_bytes_cow(&self) -> Result<std::borrow::Cow<'_, [u8]>> {
        match self {
            LineBytes::Raw(s) => Ok(std::borrow::Cow::Borrowed(s.as_bytes())),
            LineBytes::Base64(s) => Ok(std::borrow::Cow::Owned(BASE64.decode(s).map_err(
                |e| Error::InvalidMapping(format!("bad base64 in journal: {e}")),
            )?)),
        }
    }
}

/// A single planned, tracked mutation (spec §3.1).
///
/// Only `status`, `retry_count`, and `error` are mutable after creation
/// (spec §3.2's field-immutability invariant). That is enforced here by
/// convention: every other field is set once by the Scanner/Planner and
/// all later code paths go through [`Transaction::transition_in_progress`]
/// and friends rather than writing the fields directly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "TYPE")]
    pub kind: TransactionKind,
    #[serde(rename = "PATH")]
    pub path: PathBuf,
    /// Populated for rename kinds: the full new path the rename targets.
    pub new_path: Option<PathBuf>,
    /// 1-based line number; content transactions only.
    pub line_number: Option<usize>,
    pub original_line_bytes: Option<LineBytes>,
    pub new_line_bytes: Option<LineBytes>,
    pub encoding: Option<String>,
    pub newline_style: Option<NewlineStyle>,
    #[serde(rename = "STATUS")]
    pub status: TransactionStatus,
    pub retry_count: u32,
    pub error: Option<String>,
    pub collision_with: Option<PathBuf>,
    /// Planner scratch state for rename-cycle breaking (spec §4.8): all
    /// transactions sharing a `cycle_group` id must execute in ascending
    /// `cycle_index` order regardless of how their paths sort, since each
    /// step only vacates the path the next one needs. Not part of the wire
    /// format; recomputed on every plan.
    #[serde(skip)]
    pub cycle_group: Option<String>,
    #[serde(skip)]
    pub cycle_index: u32,
}

impl Transaction {
    /// Deterministic stable ID: FNV-1a over kind + original path + a
    /// disambiguating span, hex-encoded. Two runs over identical inputs
    /// must produce identical IDs (spec §4.6 "Scanner determinism").
    pub fn make_id(kind: TransactionKind, path: &std::path::Path, span: &str) -> String {
        let mut hasher = Fnv1a::new();
        hasher.write(format!("{kind:?}").as_bytes());
        hasher.write(b"\0");
        hasher.write(path.to_string_lossy().as_bytes());
        hasher.write(b"\0");
        hasher.write(span.as_bytes());
        format!("{:016x}", hasher.finish())
    }

    pub fn new_rename(
        kind: TransactionKind,
        path: PathBuf,
        new_path: PathBuf,
    ) -> Self {
        let id = Self::make_id(kind, &path, new_path.to_string_lossy().as_ref());
        Transaction {
            id,
            kind,
            path,
            new_path: Some(new_path),
            line_number: None,
            original_line_bytes: None,
            new_line_bytes: None,
            encoding: None,
            newline_style: None,
            status: TransactionStatus::Pending,
            retry_count: 0,
            error: None,
            collision_with: None,
            cycle_group: None,
            cycle_index: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_content_line(
        path: PathBuf,
        line_number: usize,
        original_line_bytes: Vec<u8>,
        new_line_bytes: Vec<u8>,
        encoding: String,
        newline_style: NewlineStyle,
    ) -> Self {
        let id = Transaction::make_id(
            TransactionKind::FileContentLine,
            &path,
            &line_number.to_string(),
        );
        Transaction {
            id,
            kind: TransactionKind::FileContentLine,
            path,
            new_path: None,
            line_number: Some(line_number),
            original_line_bytes: Some(LineBytes::from_bytes(&original_line_bytes)),
            new_line_bytes: Some(LineBytes::from_bytes(&new_line_bytes)),
            encoding: Some(encoding),
            newline_style: Some(newline_style),
            status: TransactionStatus::Pending,
            retry_count: 0,
            error: None,
            collision_with: None,
            cycle_group: None,
            cycle_index: 0,
        }
    }

    pub fn new_binary_match(path: PathBuf, offset: usize, literal: &[u8]) -> Self {
        let id = Transaction::make_id(
            TransactionKind::FileContentBinaryMatch,
            &path,
            &offset.to_string(),
        );
        Transaction {
            id,
            kind: TransactionKind::FileContentBinaryMatch,
            path,
            new_path: None,
            line_number: Some(offset),
            original_line_bytes: Some(LineBytes::from_bytes(literal)),
            new_line_bytes: None,
            encoding: None,
            newline_style: None,
            status: TransactionStatus::Completed,
            retry_count: 0,
            error: None,
            collision_with: None,
            cycle_group: None,
            cycle_index: 0,
        }
    }

    pub fn transition_in_progress(&mut self) {
        self.status = TransactionStatus::InProgress;
    }

    pub fn transition_completed(&mut self) {
        self.status = TransactionStatus::Completed;
        self.error = None;
    }

    pub fn transition_failed(&mut self, error: impl Into<String>) {
        self.status = TransactionStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn transition_retry_later(&mut self, error: impl Into<String>) {
        self.status = TransactionStatus::RetryLater;
        self.retry_count += 1;
        self.error = Some(error.into());
    }

    pub fn transition_skipped(&mut self, reason: impl Into<String>) {
        self.status = TransactionStatus::Skipped;
        self.error = Some(reason.into());
    }

    pub fn transition_pending(&mut self) {
        self.status = TransactionStatus::Pending;
    }

    pub fn mark_collision(&mut self, with: PathBuf) {
        self.collision_with = Some(with);
    }
}

/// Durable, ordered transaction store (spec §3.1, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Journal {
    pub version: u32,
    pub last_checkpoint_seq: u64,
    pub transactions: Vec<Transaction>,
}

/// Current on-disk schema version this binary writes and reads.
pub const JOURNAL_VERSION: u32 = 1;

impl Journal {
    pub fn new() -> Self {
        Journal {
            version: JOURNAL_VERSION,
            last_checkpoint_seq: 0,
            transactions: Vec::new(),
        }
    }

    pub fn counts_by_status(&self) -> std::collections::BTreeMap<&'static str, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for tx in &self.transactions {
            let key = match tx.status {
                TransactionStatus::Pending => "PENDING",
                TransactionStatus::InProgress => "IN_PROGRESS",
                TransactionStatus::Completed => "COMPLETED",
                TransactionStatus::Failed => "FAILED",
                TransactionStatus::Skipped => "SKIPPED",
                TransactionStatus::RetryLater => "RETRY_LATER",
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-file classification produced by the Encoding Detector (spec §3.1,
/// §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDescriptor {
    pub label: String,
    pub has_bom: bool,
    pub bom_bytes: Vec<u8>,
    pub newline_style: NewlineStyle,
    pub is_binary: bool,
}

/// Execution mode (spec §6.3 `mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Force,
    Interactive,
    Resume,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::DryRun
    }
}

/// Symlink traversal/rename policy (spec §4.5, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct SymlinkPolicy {
    pub ignore_symlinks: bool,
    pub process_symlink_names: bool,
}

impl Default for SymlinkPolicy {
    fn default() -> Self {
        SymlinkPolicy {
            ignore_symlinks: false,
            process_symlink_names: true,
        }
    }
}

/// Minimal deterministic, dependency-free FNV-1a 64-bit hash used for
/// stable transaction IDs. Not cryptographic; only needs to be stable
/// across platforms and process runs, which `std`'s `DefaultHasher`
/// explicitly does not guarantee.
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    fn new() -> Self {
        Fnv1a(Self::OFFSET_BASIS)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
