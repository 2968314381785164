//! Implicit augmented interval tree over a sorted slice.
//!
//! The slice itself is the tree: with intervals sorted by `start`, node `i`
//! sits at level `L` (the number of trailing one bits of `i`) and its
//! children are at `i - 2^(L-1)` and `i + 2^(L-1)`. Leaves are the even
//! indices. [`index`] stores each subtree's largest `end` in the node, and
//! [`find_overlapping`] uses that to prune whole subtrees.
//!
//! Sorting is the caller's job. Any insertion, removal, or change of
//! `start`/`end` needs a re-sort followed by a fresh [`index`] before the
//! next query; a stale index gives wrong answers, not an error.

use arrayvec::ArrayVec;

use crate::note::Tick;

/// Capacity of the query's explicit stack. Two entries per tree level
/// covers any slice addressable by `usize`.
pub const MAX_QUERY_DEPTH: usize = 128;

/// Subtrees at or below this level are scanned linearly.
const SCAN_LEVEL: u32 = 3;

/// An interval stored in the implicit tree.
pub trait Interval {
    fn start(&self) -> Tick;
    fn end(&self) -> Tick;
    fn max_end(&self) -> Tick;
    fn set_max_end(&mut self, max_end: Tick);
}

/// Augment a slice sorted ascending by `start` in place.
///
/// Returns the tree height, which every later [`find_overlapping`] call on
/// this slice needs, or `None` for an empty slice. O(n).
pub fn index<T: Interval>(intervals: &mut [T]) -> Option<u32> {
    let n = intervals.len();
    if n == 0 {
        return None;
    }

    // Leaves.
    let mut last_i = 0;
    let mut last = 0;
    for i in (0..n).step_by(2) {
        let end = intervals[i].end();
        intervals[i].set_max_end(end);
        last_i = i;
        last = end;
    }

    // Internal nodes, one level at a time. `last` tracks the max of the
    // rightmost complete subtree so nodes whose right child falls past the
    // end of the slice still see it.
    let mut k = 1;
    while 1usize << k <= n {
        let x = 1usize << (k - 1);
        let first = (x << 1) - 1;
        let step = x << 2;
        for i in (first..n).step_by(step) {
            let left = intervals[i - x].max_end();
            let right = if i + x < n { intervals[i + x].max_end() } else { last };
            let max_end = intervals[i].end().max(left).max(right);
            intervals[i].set_max_end(max_end);
        }
        last_i = if (last_i >> k) & 1 != 0 { last_i - x } else { last_i + x };
        if last_i < n && intervals[last_i].max_end() > last {
            last = intervals[last_i].max_end();
        }
        k += 1;
    }

    Some(k - 1)
}

#[derive(Clone, Copy)]
struct StackCell {
    /// Node index (may lie past the end of the slice).
    x: usize,
    /// Node level.
    k: u32,
    /// Left subtree already pushed.
    visited: bool,
}

/// Call `visit(interval, index)` for every interval with
/// `interval.start < end && start < interval.end`.
///
/// `max_level` must be the value [`index`] returned for this exact slice.
/// Visiting order is unspecified. O(log n + k) for k matches; does not
/// allocate or recurse.
pub fn find_overlapping<T, F>(intervals: &[T], max_level: Option<u32>, start: Tick, end: Tick, mut visit: F)
where
    T: Interval,
    F: FnMut(&T, usize),
{
    let Some(max_level) = max_level else {
        return;
    };
    let n = intervals.len();
    if n == 0 || start >= end {
        return;
    }

    let mut stack: ArrayVec<StackCell, MAX_QUERY_DEPTH> = ArrayVec::new();
    stack.push(StackCell {
        x: (1usize << max_level) - 1,
        k: max_level,
        visited: false,
    });

    while let Some(cell) = stack.pop() {
        if cell.k <= SCAN_LEVEL {
            // Small subtree: scan its whole index range in start order.
            let first = cell.x >> cell.k << cell.k;
            let last = (first + (1usize << (cell.k + 1)) - 1).min(n);
            for i in first..last {
                let interval = &intervals[i];
                if interval.start() >= end {
                    break;
                }
                if start < interval.end() {
                    visit(interval, i);
                }
            }
        } else if !cell.visited {
            let left = cell.x - (1usize << (cell.k - 1));
            stack.push(StackCell {
                visited: true,
                ..cell
            });
            if left >= n || intervals[left].max_end() > start {
                stack.push(StackCell {
                    x: left,
                    k: cell.k - 1,
                    visited: false,
                });
            }
        } else if cell.x < n && intervals[cell.x].start() < end {
            let interval = &intervals[cell.x];
            if start < interval.end() {
                visit(interval, cell.x);
            }
            stack.push(StackCell {
                x: cell.x + (1usize << (cell.k - 1)),
                k: cell.k - 1,
                visited: false,
            });
        }
    }
}
