//! Equivalence comparators: bytes, extracted text, page rasters.
//!
//! Each comparator is a pure function from the two sides' artifacts to a
//! [`MethodVerdict`]; the verifier decides which of them run.

use crate::canonical::{content_digest, first_difference};
use crate::types::{DiffLine, DiffOp, DiffPayload, Method, MethodVerdict, PageDifference, Region};

use super::backends::GrayImage;
use super::diff::line_diff;

/// Compare PDF bytes by SHA-256 digest.
pub fn compare_bytes(original: &[u8], cleaned: &[u8]) -> MethodVerdict {
    let original_digest = content_digest(original);
    let cleaned_digest = content_digest(cleaned);
    if original_digest == cleaned_digest {
        return MethodVerdict::identical(Method::Hash);
    }
    MethodVerdict::different(
        Method::Hash,
        DiffPayload::Bytes {
            original_digest,
            cleaned_digest,
            first_difference: first_difference(original, cleaned).unwrap_or(0),
            original_len: original.len() as u64,
            cleaned_len: cleaned.len() as u64,
        },
    )
}

/// Collapse whitespace runs within each line and drop blank lines.
pub fn normalize_page(page: &str) -> Vec<String> {
    page.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Compare extracted page text.
///
/// Pages are compared as sequences of normalized lines, so layout spacing
/// does not matter but pagination does. At most `max_lines` diff lines are
/// kept.
pub fn compare_text(original: &[String], cleaned: &[String], max_lines: usize) -> MethodVerdict {
    let flatten = |pages: &[String]| -> Vec<(usize, String)> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(idx, page)| normalize_page(page).into_iter().map(move |line| (idx + 1, line)))
            .collect()
    };
    let old = flatten(original);
    let new = flatten(cleaned);

    if old.is_empty() && new.is_empty() {
        return MethodVerdict::inconclusive(Method::Text, "no extractable text on either side");
    }
    if old == new {
        return MethodVerdict::identical(Method::Text);
    }

    let changes = line_diff(&old, &new);
    let truncated = changes.len() > max_lines;
    let lines = changes
        .into_iter()
        .take(max_lines)
        .map(|change| {
            let (page, text) = match change.op {
                DiffOp::Removed => &old[change.index],
                DiffOp::Added => &new[change.index],
            };
            DiffLine { op: change.op, page: *page, text: text.clone() }
        })
        .collect();

    MethodVerdict::different(Method::Text, DiffPayload::Text { lines, truncated })
}

/// Fraction of differing pixels and their bounding box, for equal-sized pages.
fn score_page(a: &GrayImage, b: &GrayImage) -> (f64, Option<Region>) {
    let mut differing = 0u64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);

    for y in 0..a.height {
        for x in 0..a.width {
            if a.get(x, y) != b.get(x, y) {
                differing += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    let total = a.width as u64 * a.height as u64;
    if differing == 0 || total == 0 {
        return (0.0, None);
    }
    let region = Region { x: min_x, y: min_y, width: max_x - min_x + 1, height: max_y - min_y + 1 };
    (differing as f64 / total as f64, Some(region))
}

/// Compare rasterized pages.
///
/// A page count mismatch is Different without page scoring. Pages of
/// different size score 1.0. A page differs when its score exceeds
/// `tolerance`.
pub fn compare_pages(original: &[GrayImage], cleaned: &[GrayImage], tolerance: f64) -> MethodVerdict {
    if original.len() != cleaned.len() {
        return MethodVerdict::different(
            Method::Visual,
            DiffPayload::PageCount { original: original.len(), cleaned: cleaned.len() },
        );
    }
    if original.is_empty() {
        return MethodVerdict::inconclusive(Method::Visual, "no pages rendered");
    }

    let mut pages = Vec::new();
    for (idx, (a, b)) in original.iter().zip(cleaned).enumerate() {
        let page = idx + 1;
        if (a.width, a.height) != (b.width, b.height) {
            tracing::debug!(page, original = ?(a.width, a.height), cleaned = ?(b.width, b.height), "page size differs");
            pages.push(PageDifference { page, score: 1.0, region: None });
            continue;
        }
        let (score, region) = score_page(a, b);
        if score > tolerance {
            tracing::debug!(page, score, "page exceeds pixel tolerance");
            pages.push(PageDifference { page, score, region });
        }
    }

    if pages.is_empty() {
        MethodVerdict::identical(Method::Visual)
    } else {
        MethodVerdict::different(Method::Visual, DiffPayload::Pixels { pages })
    }
}
