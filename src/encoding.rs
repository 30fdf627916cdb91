//! Encoding Detector (spec §4.4).
//!
//! BOM sniffing and decode/encode are handled by `encoding_rs`; the no-BOM
//! statistical pass is `chardetng`, accepted only above a confidence
//! threshold. Newline-style scanning is a single forward byte pass, in the
//! same style as the teacher's `build_line_offsets` in `replacer/mod.rs`.
//!
//! Content transactions operate on the *decoded* line as a `String`: the
//! Matcher runs against decoded text, and the edited text is re-encoded with
//! the original label before being written back. `encoding_rs`'s decode
//! replaces malformed sequences with U+FFFD rather than the spec's
//! surrogate-sentinel scheme (Rust's `char`/`String` cannot hold a lone
//! surrogate); lines containing replacement characters still round-trip
//! correctly whenever no rule matches them, since nothing in an unmatched
//! line is rewritten. See DESIGN.md for the full note.

use encoding_rs::Encoding;

use crate::model::{EncodingDescriptor, NewlineStyle};

/// Bytes sniffed from the front of a file; the spec asks for "≥ 64 KiB or
/// whole file if smaller".
pub const DETECTION_PREFIX_BYTES: usize = 64 * 1024;

/// Below this confidence (0-100, `chardetng`'s native scale), fall back to
/// UTF-8 rather than trust the statistical guess.
const CHARDETNG_CONFIDENCE_THRESHOLD: i32 = 50;

const UTF32_LE_BOM: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];

/// Detect the encoding of `prefix` (the first `DETECTION_PREFIX_BYTES` of a
/// file, or the whole file if shorter) and classify binary vs text.
///
/// `looks_like_text_extension` lets the Scanner pass along whether the
/// file's extension is in the configured content allow-list; a NUL byte in
/// the prefix always forces binary regardless.
pub fn detect(prefix: &[u8]) -> EncodingDescriptor {
    if prefix.is_empty() {
        return EncodingDescriptor {
            label: "UTF-8".to_string(),
            has_bom: false,
            bom_bytes: Vec::new(),
            newline_style: NewlineStyle::None,
            is_binary: false,
        };
    }

    // UTF-32 BOM must be checked before UTF-16: FF FE is a strict prefix of
    // the UTF-32LE BOM.
    if prefix.starts_with(&UTF32_LE_BOM) {
        return EncodingDescriptor {
            label: "UTF-32LE".to_string(),
            has_bom: true,
            bom_bytes: UTF32_LE_BOM.to_vec(),
            newline_style: scan_newlines(&prefix[4..]),
            // encoding_rs has no UTF-32 codec; content edits on UTF-32 files
            // are refused rather than risk corrupting a format this binary
            // cannot re-encode.
            is_binary: true,
        };
    }
    if prefix.starts_with(&UTF32_BE_BOM) {
        return EncodingDescriptor {
            label: "UTF-32BE".to_string(),
            has_bom: true,
            bom_bytes: UTF32_BE_BOM.to_vec(),
            newline_style: scan_newlines(&prefix[4..]),
            is_binary: true,
        };
    }

    if let Some((encoding, bom_len)) = Encoding::for_bom(prefix) {
        let body = &prefix[bom_len..];
        return EncodingDescriptor {
            label: encoding.name().to_string(),
            has_bom: true,
            bom_bytes: prefix[..bom_len].to_vec(),
            newline_style: scan_newlines(body),
            is_binary: is_binary_content(body),
        };
    }

    if contains_nul(prefix) {
        return EncodingDescriptor {
            label: "UTF-8".to_string(),
            has_bom: false,
            bom_bytes: Vec::new(),
            newline_style: scan_newlines(prefix),
            is_binary: true,
        };
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(prefix, true);
    let guess = detector.guess(None, true);
    let encoding: &'static Encoding = if decode_confidence(guess, prefix) >= CHARDETNG_CONFIDENCE_THRESHOLD {
        guess
    } else {
        encoding_rs::UTF_8
    };

    EncodingDescriptor {
        label: encoding.name().to_string(),
        has_bom: false,
        bom_bytes: Vec::new(),
        newline_style: scan_newlines(prefix),
        is_binary: is_binary_content(prefix),
    }
}

/// `chardetng` returns a single best guess with no numeric score, so
/// confidence is approximated by decoding the prefix with the guessed
/// encoding and measuring how much of it came back as the replacement
/// character: a correct guess decodes cleanly, a wrong one doesn't.
fn decode_confidence(encoding: &'static Encoding, prefix: &[u8]) -> i32 {
    if prefix.is_empty() {
        return 100;
    }
    let (text, _, _) = encoding.decode(prefix);
    let replacement_count = text.matches('\u{FFFD}').count();
    let ratio = (replacement_count * 100) / text.chars().count().max(1);
    100 - ratio as i32
}

fn contains_nul(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// Cheap binary classifier: a NUL byte anywhere, or a high proportion of
/// non-printable/non-whitespace control bytes, marks content binary.
fn is_binary_content(bytes: &[u8]) -> bool {
    if contains_nul(bytes) {
        return true;
    }
    if bytes.is_empty() {
        return false;
    }
    let suspicious = bytes
        .iter()
        .filter(|&&b| b < 0x09 || (b > 0x0D && b < 0x20 && b != 0x1B))
        .count();
    (suspicious * 100) / bytes.len() > 5
}

/// Single forward pass over `bytes`, classifying the dominant newline
/// convention. MIXED when two or more styles appear.
fn scan_newlines(bytes: &[u8]) -> NewlineStyle {
    let mut saw_lf = false;
    let mut saw_crlf = false;
    let mut saw_cr = false;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    saw_crlf = true;
                    i += 2;
                    continue;
                }
                saw_cr = true;
            }
            b'\n' => saw_lf = true,
            _ => {}
        }
        i += 1;
    }

    match (saw_lf, saw_crlf, saw_cr) {
        (false, false, false) => NewlineStyle::None,
        (true, false, false) => NewlineStyle::Lf,
        (false, true, false) => NewlineStyle::Crlf,
        (false, false, true) => NewlineStyle::Cr,
        _ => NewlineStyle::Mixed,
    }
}

/// Decode `bytes` (already stripped of any BOM) per `descriptor.label`,
/// using `encoding_rs`'s replacement-character error policy.
pub fn decode(bytes: &[u8], descriptor: &EncodingDescriptor) -> String {
    let encoding = Encoding::for_label(descriptor.label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Re-encode `text` per `descriptor.label`, re-prefixing the original BOM
/// bytes if the file had one. Never translates newlines.
pub fn encode(text: &str, descriptor: &EncodingDescriptor) -> Vec<u8> {
    let encoding = Encoding::for_label(descriptor.label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (body, _, _) = encoding.encode(text);
    let mut out = Vec::with_capacity(descriptor.bom_bytes.len() + body.len());
    out.extend_from_slice(&descriptor.bom_bytes);
    out.extend_from_slice(&body);
    out
}

/// Strip RTF control words/groups for match-detection purposes only (spec
/// §4.4 "RTF is unwrapped ... for match detection only"). Renames and
/// content writes for RTF files still operate on the raw bytes; this exists
/// solely so the Scanner can decide whether an RTF file needs a content
/// transaction.
pub fn extract_rtf_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut depth: i32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
            }
            b'\\' => {
                // Skip the control word/symbol and its optional numeric
                // parameter; a trailing space is the word's own
                // terminator and is consumed, not emitted.
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'-') {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b' ' {
                    i += 1;
                }
            }
            b if depth <= 1 => {
                out.push(b as char);
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        let d = detect(&bytes);
        assert!(d.has_bom);
        assert_eq!(d.label, "UTF-8");
        assert!(!d.is_binary);
    }

    #[test]
    fn detects_utf16le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend_from_slice(b"h\0e\0l\0l\0o\0");
        let d = detect(&bytes);
        assert!(d.has_bom);
        assert_eq!(d.label, "UTF-16LE");
    }

    #[test]
    fn nul_byte_forces_binary() {
        let bytes = vec![b'a', 0x00, b'b'];
        let d = detect(&bytes);
        assert!(d.is_binary);
    }

    #[test]
    fn defaults_to_utf8_without_bom() {
        let d = detect(b"plain ascii text");
        assert_eq!(d.label, "UTF-8");
        assert!(!d.has_bom);
    }

    #[test]
    fn classifies_newline_styles() {
        assert_eq!(scan_newlines(b"a\nb\nc"), NewlineStyle::Lf);
        assert_eq!(scan_newlines(b"a\r\nb\r\nc"), NewlineStyle::Crlf);
        assert_eq!(scan_newlines(b"a\rb\rc"), NewlineStyle::Cr);
        assert_eq!(scan_newlines(b"a\nb\r\nc"), NewlineStyle::Mixed);
        assert_eq!(scan_newlines(b"no newlines here"), NewlineStyle::None);
    }

    #[test]
    fn round_trips_utf8_text_without_bom() {
        let descriptor = EncodingDescriptor {
            label: "UTF-8".to_string(),
            has_bom: false,
            bom_bytes: Vec::new(),
            newline_style: NewlineStyle::Lf,
            is_binary: false,
        };
        let text = decode(b"hello world\n", &descriptor);
        assert_eq!(encode(&text, &descriptor), b"hello world\n".to_vec());
    }

    #[test]
    fn round_trips_with_bom_preserved() {
        let descriptor = EncodingDescriptor {
            label: "UTF-8".to_string(),
            has_bom: true,
            bom_bytes: vec![0xEF, 0xBB, 0xBF],
            newline_style: NewlineStyle::Lf,
            is_binary: false,
        };
        let text = decode(b"hi\n", &descriptor);
        let encoded = encode(&text, &descriptor);
        assert_eq!(&encoded[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&encoded[3..], b"hi\n");
    }

    #[test]
    fn rtf_extraction_drops_control_words() {
        let rtf = br"{\rtf1\ansi Hello \b World\b0 !}";
        let text = extract_rtf_text(rtf);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("\\rtf1"));
    }
}
