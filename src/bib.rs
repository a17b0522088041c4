//! BibTeX entry extraction and citation filtering.
//!
//! Entries are found by scanning for `@type{` or `@type(` at the top level
//! and following balanced braces to the matching closer, because field
//! values nest braces freely. Text between entries is dropped.
//!
//! | Block | Treatment |
//! |-------|-----------|
//! | regular entry | kept iff its key is cited (or pulled in by `crossref`) |
//! | `@string`, `@preamble` | always kept, cited entries may use them |
//! | `@comment` | dropped |
//!
//! Retained entries are copied byte-for-byte.

use regex_lite::Regex;
use std::collections::BTreeSet;

use crate::types::CitationSet;

/// Error type for bibliography parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BibError {
    /// An entry could not be delimited.
    #[error("Malformed entry '{key}' at line {line}: {reason}")]
    Malformed {
        /// 1-based line of the `@`.
        line: usize,
        /// Entry key, or the entry type when no key could be read.
        key: String,
        /// What went wrong.
        reason: String,
    },
}

/// Kind of top-level block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A citable entry (`@article`, `@misc`, ...).
    Entry,
    /// `@string` macro definition.
    String,
    /// `@preamble`.
    Preamble,
    /// `@comment`.
    Comment,
}

/// One top-level block of a `.bib` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry<'a> {
    /// Block kind.
    pub kind: BlockKind,
    /// Entry type as written (`article`, `STRING`, ...).
    pub entry_type: &'a str,
    /// Citation key, for regular entries.
    pub key: Option<&'a str>,
    /// Full text from `@` to the closing delimiter.
    pub text: &'a str,
    /// 1-based line of the `@`.
    pub line: usize,
}

fn malformed(line: usize, key: &str, reason: &str) -> BibError {
    BibError::Malformed { line, key: key.to_string(), reason: reason.to_string() }
}

/// Split `.bib` content into top-level blocks.
pub fn parse_entries(content: &str) -> Result<Vec<BibEntry<'_>>, BibError> {
    let bytes = content.as_bytes();
    let mut entries = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < bytes.len() {
        if bytes[pos] != b'@' {
            if bytes[pos] == b'\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let start = pos;
        let start_line = line;

        let type_start = pos + 1;
        let mut cursor = type_start;
        while cursor < bytes.len() && bytes[cursor].is_ascii_alphabetic() {
            cursor += 1;
        }
        let entry_type = &content[type_start..cursor];
        while cursor < bytes.len() && (bytes[cursor] == b' ' || bytes[cursor] == b'\t') {
            cursor += 1;
        }
        let opener = bytes.get(cursor).copied();
        if entry_type.is_empty() || !matches!(opener, Some(b'{') | Some(b'(')) {
            // A stray `@` outside any entry is plain text.
            pos += 1;
            continue;
        }

        let kind = match entry_type.to_ascii_lowercase().as_str() {
            "string" => BlockKind::String,
            "preamble" => BlockKind::Preamble,
            "comment" => BlockKind::Comment,
            _ => BlockKind::Entry,
        };

        let body_start = cursor + 1;
        let key = if kind == BlockKind::Entry {
            let rest = &content[body_start..];
            let key_end = rest.find([',', '}', ')', '\n']).unwrap_or(rest.len());
            let key = rest[..key_end].trim();
            let dangling = rest[key_end..].starts_with('\n') && !rest[key_end..].trim_start().starts_with(',');
            if key.is_empty() || dangling {
                return Err(malformed(start_line, entry_type, "missing citation key"));
            }
            Some(key)
        } else {
            None
        };
        let label = key.unwrap_or(entry_type);

        let end = find_block_end(bytes, cursor, kind, start_line, label)?;
        let text = &content[start..end];
        line += text.bytes().filter(|b| *b == b'\n').count();

        entries.push(BibEntry { kind, entry_type, key, text, line: start_line });
        pos = end;
    }

    Ok(entries)
}

/// Offset just past the delimiter closing the block opened at `open`.
fn find_block_end(
    bytes: &[u8],
    open: usize,
    kind: BlockKind,
    line: usize,
    label: &str,
) -> Result<usize, BibError> {
    let paren = bytes[open] == b'(';
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut at_line_start = false;

    for (idx, &b) in bytes.iter().enumerate().skip(open + 1) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    if paren {
                        return Err(malformed(line, label, "unbalanced '}'"));
                    }
                    return Ok(idx + 1);
                }
                depth -= 1;
            }
            b')' if paren && depth == 0 && !in_quotes => return Ok(idx + 1),
            b'"' if depth == 0 && kind != BlockKind::Comment => in_quotes = !in_quotes,
            b'@' if at_line_start && depth == 0 && !in_quotes && kind == BlockKind::Entry => {
                return Err(malformed(line, label, "entry not closed before the next entry"));
            }
            _ => {}
        }
        if b == b'\n' {
            at_line_start = true;
        } else if !b.is_ascii_whitespace() {
            at_line_start = false;
        }
    }

    Err(malformed(line, label, "unbalanced braces"))
}

/// Result of filtering one bibliography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredBib {
    /// Retained blocks joined by blank lines.
    pub text: String,
    /// Regular entries kept.
    pub kept: usize,
    /// Regular entries dropped.
    pub dropped: usize,
    /// Keys of kept regular entries.
    pub kept_keys: BTreeSet<String>,
}

/// Filters bibliographies down to cited entries.
#[derive(Debug, Clone)]
pub struct BibFilter {
    crossref: Regex,
}

impl Default for BibFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BibFilter {
    /// Create a filter.
    pub fn new() -> Self {
        Self {
            crossref: Regex::new(r#"(?i)\bcrossref\s*=\s*[{"]\s*([^{}"]+?)\s*[}"]"#)
                .expect("crossref pattern is a valid constant"),
        }
    }

    fn crossref_of<'a>(&self, entry: &BibEntry<'a>) -> Option<&'a str> {
        let text = entry.text;
        self.crossref.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    /// Keep the entries cited in `citations`.
    ///
    /// `\nocite{*}` keeps every entry. Entries named by a retained entry's
    /// `crossref` field are kept too, transitively.
    pub fn filter(&self, content: &str, citations: &CitationSet) -> Result<FilteredBib, BibError> {
        let entries = parse_entries(content)?;
        let keep_all = citations.cites_everything();

        let mut wanted: BTreeSet<&str> = BTreeSet::new();
        if !keep_all {
            let mut frontier: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.key)
                .filter(|k| citations.contains(k))
                .collect();
            while let Some(key) = frontier.pop() {
                if !wanted.insert(key) {
                    continue;
                }
                for entry in entries.iter().filter(|e| e.key == Some(key)) {
                    if let Some(parent) = self.crossref_of(entry) {
                        if let Some(found) = entries.iter().filter_map(|e| e.key).find(|k| *k == parent) {
                            frontier.push(found);
                        }
                    }
                }
            }
        }

        let mut blocks: Vec<&str> = Vec::new();
        let mut kept_keys = BTreeSet::new();
        let mut kept = 0;
        let mut dropped = 0;

        for entry in &entries {
            match entry.kind {
                BlockKind::Comment => {}
                BlockKind::String | BlockKind::Preamble => blocks.push(entry.text),
                BlockKind::Entry => {
                    let key = entry.key.unwrap_or_default();
                    if keep_all || wanted.contains(key) {
                        blocks.push(entry.text);
                        kept_keys.insert(key.to_string());
                        kept += 1;
                    } else {
                        dropped += 1;
                    }
                }
            }
        }

        let mut text = blocks.join("\n\n");
        if !text.is_empty() {
            text.push('\n');
        }

        Ok(FilteredBib { text, kept, dropped, kept_keys })
    }
}
