//! Comparison verdicts produced by the equivalence verifier.
//!
//! ## Aggregation
//!
//! Each comparator that runs contributes one [`MethodVerdict`]. The report
//! never collapses them into a boolean: a hash mismatch next to identical
//! text is an expected outcome for PDFs that embed timestamps, and callers
//! get to see both.
//!
//! | Method | Decisive when |
//! |--------|---------------|
//! | hash   | Identical only |
//! | text   | Identical or Different |
//! | visual | Identical or Different |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one comparison method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The method found no difference.
    Identical,
    /// The method found a difference.
    Different,
    /// The method could not decide (e.g. no extractable text).
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identical => write!(f, "Identical"),
            Self::Different => write!(f, "Different"),
            Self::Inconclusive => write!(f, "Inconclusive"),
        }
    }
}

/// Comparison method, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Content digest of the PDF bytes.
    Hash,
    /// Extracted page text.
    Text,
    /// Rasterized page pixels.
    Visual,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => write!(f, "hash"),
            Self::Text => write!(f, "text"),
            Self::Visual => write!(f, "visual"),
        }
    }
}

/// Side of a line diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    /// Present only in the original PDF.
    Removed,
    /// Present only in the cleaned PDF.
    Added,
}

/// One changed line of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Which side the line belongs to.
    pub op: DiffOp,
    /// 1-based page number on that side.
    pub page: usize,
    /// Normalized line text.
    pub text: String,
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.op {
            DiffOp::Removed => '-',
            DiffOp::Added => '+',
        };
        write!(f, "{}[p{}] {}", sign, self.page, self.text)
    }
}

/// Rectangle of changed pixels on a page, in pixels at the raster DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// A page whose difference score exceeded the tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDifference {
    /// 1-based page number.
    pub page: usize,
    /// Fraction of differing pixels (1.0 when sizes differ).
    pub score: f64,
    /// Bounding box of differing pixels, absent when sizes differ.
    pub region: Option<Region>,
}

/// Method-specific evidence attached to a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffPayload {
    /// Digests differ.
    Bytes {
        /// SHA-256 of the original PDF.
        original_digest: String,
        /// SHA-256 of the cleaned PDF.
        cleaned_digest: String,
        /// Offset of the first differing byte.
        first_difference: u64,
        /// Size of the original PDF.
        original_len: u64,
        /// Size of the cleaned PDF.
        cleaned_len: u64,
    },
    /// Extracted text differs.
    Text {
        /// Changed lines, in order.
        lines: Vec<DiffLine>,
        /// Whether the diff was cut short.
        truncated: bool,
    },
    /// Rasters have different page counts.
    PageCount {
        /// Pages in the original PDF.
        original: usize,
        /// Pages in the cleaned PDF.
        cleaned: usize,
    },
    /// Pages exceeding the pixel tolerance.
    Pixels {
        /// Differing pages.
        pages: Vec<PageDifference>,
    },
}

/// Verdict of one method with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodVerdict {
    /// Method that ran.
    pub method: Method,
    /// Its verdict.
    pub verdict: Verdict,
    /// Evidence for a `Different` verdict.
    pub diff: Option<DiffPayload>,
    /// Why the method was inconclusive, if it was.
    pub note: Option<String>,
}

impl MethodVerdict {
    /// Identical verdict without evidence.
    pub fn identical(method: Method) -> Self {
        Self { method, verdict: Verdict::Identical, diff: None, note: None }
    }

    /// Different verdict with evidence.
    pub fn different(method: Method, diff: DiffPayload) -> Self {
        Self { method, verdict: Verdict::Different, diff: Some(diff), note: None }
    }

    /// Inconclusive verdict with a reason.
    pub fn inconclusive(method: Method, note: impl Into<String>) -> Self {
        Self { method, verdict: Verdict::Inconclusive, diff: None, note: Some(note.into()) }
    }

    /// Whether this verdict settles the comparison.
    ///
    /// Hash mismatches are never decisive: PDF producers embed timestamps
    /// and document IDs.
    pub fn is_decisive(&self) -> bool {
        match (self.method, self.verdict) {
            (_, Verdict::Inconclusive) => false,
            (Method::Hash, Verdict::Different) => false,
            _ => true,
        }
    }
}

/// Every verdict produced by one verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Main file that was compiled.
    pub main_file: String,
    /// Method verdicts in run order.
    pub verdicts: Vec<MethodVerdict>,
}

impl VerificationReport {
    /// Create an empty report.
    pub fn new(main_file: impl Into<String>) -> Self {
        Self { main_file: main_file.into(), verdicts: Vec::new() }
    }

    pub(crate) fn push(&mut self, verdict: MethodVerdict) {
        self.verdicts.push(verdict);
    }

    /// Verdict of a specific method, if it ran.
    pub fn verdict_for(&self, method: Method) -> Option<&MethodVerdict> {
        self.verdicts.iter().find(|v| v.method == method)
    }

    /// Methods that ran, in order.
    pub fn methods_run(&self) -> Vec<Method> {
        self.verdicts.iter().map(|v| v.method).collect()
    }

    /// First decisive verdict, or `Inconclusive` if none decided.
    pub fn decisive(&self) -> Verdict {
        self.verdicts
            .iter()
            .find(|v| v.is_decisive())
            .map(|v| v.verdict)
            .unwrap_or(Verdict::Inconclusive)
    }

    /// Whether decisive methods reached different verdicts.
    pub fn is_disputed(&self) -> bool {
        let mut decisive = self.verdicts.iter().filter(|v| v.is_decisive()).map(|v| v.verdict);
        match decisive.next() {
            Some(first) => decisive.any(|v| v != first),
            None => false,
        }
    }

    /// One-line rendering of every method verdict, e.g.
    /// `Different (hash) / Identical (text)`.
    pub fn summary(&self) -> String {
        self.verdicts
            .iter()
            .map(|v| format!("{} ({})", v.verdict, v.method))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
