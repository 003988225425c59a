use std::fmt;

use serde_json::Value as JsonValue;
use serde_json::error::Category;

/// Repair attempts made on a corrupted value before it is discarded.
pub const MAX_REPAIR_ROUNDS: usize = 3;

/// Why a persisted value failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorruptionKind {
    /// The backend holds bytes that are not UTF-8 text.
    InvalidUtf8,
    /// Raw NUL bytes somewhere in the text.
    NullBytes,
    /// Input ends mid-value (interrupted write).
    Truncated,
    /// A character the parser did not expect, at `offset` bytes into the text.
    UnexpectedCharacter { ch: char, offset: usize },
    /// Anything else; not repairable.
    Malformed(String),
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => f.write_str("invalid UTF-8"),
            Self::NullBytes => f.write_str("contains null bytes"),
            Self::Truncated => f.write_str("truncated input"),
            Self::UnexpectedCharacter { ch, offset } => {
                write!(f, "unexpected character {ch:?} at byte {offset}")
            }
            Self::Malformed(msg) => write!(f, "malformed: {msg}"),
        }
    }
}

pub(crate) enum ParseOutcome {
    Clean(JsonValue),
    Repaired {
        value: JsonValue,
        text: String,
        kind: CorruptionKind,
    },
    Unrecoverable(CorruptionKind),
}

/// Parse without attempting any repair.
pub(crate) fn parse_strict(raw: &str) -> Result<JsonValue, CorruptionKind> {
    serde_json::from_str(raw).map_err(|e| classify(raw, &e))
}

/// Parse, falling back to the repair matching each failure's kind.
///
/// Each round classifies the current text and applies one repair; a repair can
/// expose a different kind of damage, which the next round handles.
pub(crate) fn parse_or_repair(raw: &str) -> ParseOutcome {
    let first = match parse_strict(raw) {
        Ok(value) => return ParseOutcome::Clean(value),
        Err(kind) => kind,
    };

    let mut text = raw.to_owned();
    let mut kind = first.clone();
    for _ in 0..MAX_REPAIR_ROUNDS {
        let Some(candidate) = repair(&text, &kind) else {
            break;
        };
        match parse_strict(&candidate) {
            Ok(value) => {
                return ParseOutcome::Repaired {
                    value,
                    text: candidate,
                    kind: first,
                };
            }
            Err(next) => {
                text = candidate;
                kind = next;
            }
        }
    }
    ParseOutcome::Unrecoverable(first)
}

fn classify(raw: &str, err: &serde_json::Error) -> CorruptionKind {
    if raw.contains('\0') {
        return CorruptionKind::NullBytes;
    }
    match err.classify() {
        Category::Eof => CorruptionKind::Truncated,
        Category::Syntax => {
            let offset = byte_offset(raw, err.line(), err.column());
            match raw[offset..].chars().next() {
                Some(ch) => CorruptionKind::UnexpectedCharacter { ch, offset },
                None => CorruptionKind::Truncated,
            }
        }
        Category::Io | Category::Data => CorruptionKind::Malformed(err.to_string()),
    }
}

// serde_json reports 1-based line and byte column.
fn byte_offset(raw: &str, line: usize, column: usize) -> usize {
    let line_start: usize = raw
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let mut offset = (line_start + column.saturating_sub(1)).min(raw.len());
    while !raw.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn repair(text: &str, kind: &CorruptionKind) -> Option<String> {
    match kind {
        CorruptionKind::NullBytes => Some(text.replace('\0', "")),
        CorruptionKind::Truncated => close_truncated(text),
        CorruptionKind::UnexpectedCharacter { ch, offset } => {
            let mut out = String::with_capacity(text.len());
            out.push_str(text.get(..*offset)?);
            out.push_str(text.get(offset + ch.len_utf8()..)?);
            Some(out)
        }
        CorruptionKind::InvalidUtf8 | CorruptionKind::Malformed(_) => None,
    }
}

/// Close whatever string and brackets are still open at the end of `text`.
fn close_truncated(text: &str) -> Option<String> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(ch) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if closers.is_empty() && !in_string {
        return None;
    }

    let mut out = text.to_owned();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    } else {
        out.truncate(out.trim_end().len());
        if out.ends_with(',') {
            out.pop();
        }
    }
    out.extend(closers.iter().rev());
    Some(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn repaired(raw: &str) -> (JsonValue, String) {
        match parse_or_repair(raw) {
            ParseOutcome::Repaired { value, text, .. } => (value, text),
            ParseOutcome::Clean(_) => panic!("expected repair, parsed clean: {raw:?}"),
            ParseOutcome::Unrecoverable(kind) => panic!("expected repair, got {kind}: {raw:?}"),
        }
    }

    #[test]
    fn clean_json_is_untouched() {
        assert!(matches!(
            parse_or_repair(r#"{"a":[1,2]}"#),
            ParseOutcome::Clean(_)
        ));
    }

    #[test]
    fn classifies_truncation() {
        assert_eq!(parse_strict(r#"{"a":1"#), Err(CorruptionKind::Truncated));
        assert_eq!(parse_strict("[1,2"), Err(CorruptionKind::Truncated));
    }

    #[test]
    fn classifies_null_bytes_first() {
        assert_eq!(parse_strict("{\"a\":\u{0}1}"), Err(CorruptionKind::NullBytes));
    }

    #[test]
    fn classifies_unexpected_character_with_offset() {
        assert_eq!(
            parse_strict(r#"{"a":1}}"#),
            Err(CorruptionKind::UnexpectedCharacter { ch: '}', offset: 7 })
        );
        assert_eq!(
            parse_strict("x[1]"),
            Err(CorruptionKind::UnexpectedCharacter { ch: 'x', offset: 0 })
        );
    }

    #[test]
    fn offset_accounts_for_previous_lines() {
        let raw = "{\n  \"a\": 1\n}}";
        assert_eq!(
            parse_strict(raw),
            Err(CorruptionKind::UnexpectedCharacter { ch: '}', offset: 12 })
        );
    }

    #[test]
    fn strips_null_bytes() {
        let (value, text) = repaired("{\"a\":\u{0}1}\u{0}");
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[test]
    fn closes_truncated_object_and_array() {
        let (value, _) = repaired(r#"{"items":[1,2"#);
        assert_eq!(value, json!({"items": [1, 2]}));
    }

    #[test]
    fn closes_truncated_string() {
        let (value, text) = repaired(r#"{"name":"Jo"#);
        assert_eq!(value, json!({"name": "Jo"}));
        assert_eq!(text, r#"{"name":"Jo"}"#);
    }

    #[test]
    fn drops_trailing_comma_before_closing() {
        let (value, _) = repaired(r#"[1,2,"#);
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn removes_leading_garbage_character() {
        let (value, _) = repaired(r#"x{"a":true}"#);
        assert_eq!(value, json!({"a": true}));
    }

    #[test]
    fn removes_trailing_garbage_character() {
        let (value, _) = repaired(r#"{"a":1}}"#);
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn repairs_chain_across_kinds() {
        // NUL strip exposes a truncation
        let (value, _) = repaired("\u{0}{\"a\":[1");
        assert_eq!(value, json!({"a": [1]}));
    }

    #[test]
    fn object_object_is_unrecoverable() {
        match parse_or_repair("[object Object]") {
            ParseOutcome::Unrecoverable(CorruptionKind::UnexpectedCharacter { ch, offset }) => {
                assert_eq!((ch, offset), ('o', 1));
            }
            _ => panic!("expected unrecoverable"),
        }
    }

    #[test]
    fn mismatched_brackets_are_not_closed() {
        assert_eq!(close_truncated("[1}"), None);
        assert_eq!(close_truncated("123"), None);
    }
}
