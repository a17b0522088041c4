//! Comment handling for TeX sources.
//!
//! ## Comment Rule
//!
//! A `%` starts a comment when it is preceded by an even number of
//! backslashes (zero included). `\%` is a literal percent sign; `\\%` is a
//! line break followed by a comment. Everything from the comment start to the
//! end of the line, terminator excluded, is comment text.
//!
//! ## Line Structure
//!
//! Stripping works line by line and never reflows:
//!
//! ```text
//! 100\% done % note      →  100\% done
//!     % only a comment   →  (empty line)
//! \verb-free text        →  \verb-free text
//! ```
//!
//! Line terminators (`\n`, `\r\n`) are kept exactly, so line numbers in the
//! reduced tree match the source. Bodies of verbatim-like environments are
//! copied untouched because `%` is literal there.
//!
//! The same classifier drives dependency scanning, so a directive is a
//! dependency exactly when it survives stripping.

use std::ops::Range;

use crate::policy::CleanPolicy;

const COMMENT_ENV_BEGIN: &str = r"\begin{comment}";
const COMMENT_ENV_END: &str = r"\end{comment}";

/// Byte offset of the first `%` that starts a comment.
pub fn comment_start(line: &str) -> Option<usize> {
    comment_start_from(line, 0)
}

/// Like [`comment_start`], scanning from `from`.
///
/// `from` must not directly follow a backslash.
fn comment_start_from(line: &str, from: usize) -> Option<usize> {
    let mut run = 0usize;
    for (idx, &b) in line.as_bytes().iter().enumerate().skip(from) {
        if b == b'%' && run % 2 == 0 {
            return Some(idx);
        }
        if b == b'\\' {
            run += 1;
        } else {
            run = 0;
        }
    }
    None
}

/// Remove the comment from a single line without terminator.
pub fn strip_line(line: &str) -> &str {
    match comment_start(line) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// A classified source line.
#[derive(Debug, Clone)]
pub struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Line content without terminator.
    pub body: &'a str,
    /// `"\n"`, `"\r\n"` or `""` on the last line.
    pub terminator: &'a str,
    /// Content that survives stripping (a prefix of `body`).
    pub kept: &'a str,
    /// Whether comment text was found.
    pub comment_removed: bool,
    /// Whether the line held nothing but whitespace and a comment.
    pub comment_only: bool,
    /// Whether the line is part of a `comment` environment.
    pub commented_out: bool,
    code: Vec<Range<usize>>,
}

impl<'a> SourceLine<'a> {
    /// Spans of TeX code on this line: comment text and verbatim bodies excluded.
    pub fn code_segments(&self) -> impl Iterator<Item = &'a str> + '_ {
        let body = self.body;
        self.code.iter().map(move |r| &body[r.clone()])
    }
}

/// Iterator over classified lines of a TeX source.
pub struct SourceLines<'a> {
    rest: &'a str,
    number: usize,
    verbatim_envs: &'a [String],
    open_verbatim: Option<&'a str>,
    in_comment_env: bool,
}

impl<'a> SourceLines<'a> {
    /// Classify `text`, treating `verbatim_envs` as verbatim-like environments.
    pub fn new(text: &'a str, verbatim_envs: &'a [String]) -> Self {
        Self {
            rest: text,
            number: 0,
            verbatim_envs,
            open_verbatim: None,
            in_comment_env: false,
        }
    }

    /// Earliest `\begin{env}` of a verbatim environment in `segment`.
    ///
    /// Returns the offset just past the marker and the environment name.
    fn find_verbatim_begin(&self, segment: &str) -> Option<(usize, &'a str)> {
        self.verbatim_envs
            .iter()
            .filter_map(|env| {
                let marker = format!("\\begin{{{}}}", env);
                segment.find(&marker).map(|idx| (idx, idx + marker.len(), env.as_str()))
            })
            .min_by_key(|(idx, _, _)| *idx)
            .map(|(_, end, env)| (end, env))
    }
}

impl<'a> Iterator for SourceLines<'a> {
    type Item = SourceLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let split = self.rest.find('\n').map(|i| i + 1).unwrap_or(self.rest.len());
        let (line, rest) = self.rest.split_at(split);
        self.rest = rest;
        self.number += 1;

        let body_len = if line.ends_with("\r\n") {
            line.len() - 2
        } else if line.ends_with('\n') {
            line.len() - 1
        } else {
            line.len()
        };
        let (body, terminator) = line.split_at(body_len);

        let mut code = Vec::new();
        let mut comment = None;
        let mut pos = 0;
        loop {
            if let Some(env) = self.open_verbatim {
                let marker = format!("\\end{{{}}}", env);
                match body[pos..].find(&marker) {
                    Some(idx) => {
                        pos += idx + marker.len();
                        self.open_verbatim = None;
                    }
                    None => break,
                }
            } else {
                let end = comment_start_from(body, pos).unwrap_or(body.len());
                match self.find_verbatim_begin(&body[pos..end]) {
                    Some((marker_end, env)) => {
                        code.push(pos..pos + marker_end);
                        pos += marker_end;
                        self.open_verbatim = Some(env);
                    }
                    None => {
                        code.push(pos..end);
                        if end < body.len() {
                            comment = Some(end);
                        }
                        break;
                    }
                }
            }
        }

        let was_in_comment_env = self.in_comment_env;
        let mut touches_comment_env = false;
        for range in &code {
            let segment = &body[range.clone()];
            if segment.contains(COMMENT_ENV_BEGIN) {
                self.in_comment_env = true;
                touches_comment_env = true;
            }
            if segment.contains(COMMENT_ENV_END) {
                self.in_comment_env = false;
                touches_comment_env = true;
            }
        }

        let kept = &body[..comment.unwrap_or(body.len())];
        Some(SourceLine {
            number: self.number,
            body,
            terminator,
            kept,
            comment_removed: comment.is_some(),
            comment_only: comment.is_some() && kept.trim().is_empty(),
            commented_out: was_in_comment_env || touches_comment_env,
            code,
        })
    }
}

/// Result of stripping a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedText {
    /// Text with comments removed.
    pub text: String,
    /// Number of lines that lost comment text.
    pub lines_changed: usize,
}

/// Removes comments according to a policy.
#[derive(Debug, Clone, Copy)]
pub struct CommentStripper<'p> {
    verbatim_envs: &'p [String],
    drop_comment_only_lines: bool,
}

impl<'p> CommentStripper<'p> {
    /// Create a stripper for a policy.
    pub fn new(policy: &'p CleanPolicy) -> Self {
        Self {
            verbatim_envs: &policy.verbatim_environments,
            drop_comment_only_lines: policy.drop_comment_only_lines,
        }
    }

    /// Strip comments from a whole document.
    pub fn strip(&self, text: &str) -> StrippedText {
        let mut out = String::with_capacity(text.len());
        let mut lines_changed = 0;

        for line in SourceLines::new(text, self.verbatim_envs) {
            if line.comment_removed {
                lines_changed += 1;
            }
            if line.comment_only {
                if !self.drop_comment_only_lines {
                    out.push_str(line.terminator);
                }
                continue;
            }
            out.push_str(line.kept);
            out.push_str(line.terminator);
        }

        StrippedText { text: out, lines_changed }
    }
}

/// Strip comments with the default policy.
pub fn strip_comments(text: &str) -> String {
    let policy = CleanPolicy::default();
    CommentStripper::new(&policy).strip(text).text
}
