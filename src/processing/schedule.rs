//! Adaptive visit order for per-frame review.
//!
//! When a review stops early, the frames already looked at should span the whole clip
//! rather than its first few seconds. [`reorder`] gives a breadth-first midpoint
//! bisection of `0..n`: middle first, then the quarter points, then the eighths, ...

use std::collections::VecDeque;

/// Permutation of `0..n` in bisection order.
///
/// ```
/// use clip_review::processing::reorder;
///
/// assert_eq!(reorder(8), vec![4, 2, 6, 1, 3, 5, 7, 0]);
/// ```
pub fn reorder(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let mut order = Vec::with_capacity(n);
    let mut seen = vec![false; n];
    let mut ranges = VecDeque::from([(0usize, n - 1)]);

    while let Some((lo, hi)) = ranges.pop_front() {
        // upper median: n = 8 starts at 4, not 3
        let mid = (lo + hi + 1) / 2;
        if !seen[mid] {
            seen[mid] = true;
            order.push(mid);
        }
        if mid > lo {
            ranges.push_back((lo, mid - 1));
        }
        if mid < hi {
            ranges.push_back((mid + 1, hi));
        }
    }

    order.extend((0..n).filter(|&i| !seen[i]));
    order
}
