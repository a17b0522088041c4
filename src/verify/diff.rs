//! Line-level diff.
//!
//! Longest-common-subsequence over the lines left after trimming the common
//! prefix and suffix. Inputs whose middle part would need more than
//! [`MAX_TABLE_CELLS`] table cells are reported as a full replacement of
//! that part instead.

use crate::types::DiffOp;

/// Largest LCS table built before falling back to replace-all.
pub const MAX_TABLE_CELLS: usize = 4_000_000;

/// One changed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// Removed from the old side or added on the new side.
    pub op: DiffOp,
    /// Index into the side named by `op`.
    pub index: usize,
}

/// Changed lines between `old` and `new`, in output order (removals before
/// the additions that replace them).
pub fn line_diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Change> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    let removed = |i: usize| Change { op: DiffOp::Removed, index: prefix + i };
    let added = |j: usize| Change { op: DiffOp::Added, index: prefix + j };

    if a.is_empty() || b.is_empty() || (a.len() + 1) * (b.len() + 1) > MAX_TABLE_CELLS {
        return (0..a.len()).map(removed).chain((0..b.len()).map(added)).collect();
    }

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut changes = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            changes.push(removed(i));
            i += 1;
        } else {
            changes.push(added(j));
            j += 1;
        }
    }
    changes.extend((i..a.len()).map(removed));
    changes.extend((j..b.len()).map(added));
    changes
}
