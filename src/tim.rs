use std::cmp;
use std::mem::MaybeUninit;

use crate::gallop::gallop;
use crate::merge::{merge_hi, merge_lo, MergeState};
use crate::smallsort::binary_insertion_sort;

/// Inputs shorter than this skip the minrun shift entirely; above it the minrun rule
/// lands in the 32..=64 band.
const MIN_MERGE: usize = 64;

/// A pending already-sorted run, the window `v[start..start + len]`.
#[derive(Copy, Clone)]
struct TimSortRun {
    start: usize,
    len: usize,
}

/// Sorts `v` with one left-to-right scan: detect the natural run at the frontier,
/// normalize its orientation, top it up to minrun, push it on the pending stack and
/// collapse until the run-length invariant holds again. A forced collapse at the end
/// reduces the stack to the single fully sorted run.
pub fn sort<T, F: FnMut(&T, &T) -> bool>(
    v: &mut [T],
    scratch: &mut [MaybeUninit<T>],
    is_less: &mut F,
) {
    let len = v.len();
    if len < 2 {
        return;
    }
    debug_assert!(scratch.len() >= len / 2);

    let scratch_base = scratch.as_mut_ptr() as *mut T;
    let min_run = min_run_length(len);
    let mut state = MergeState::new();
    let mut runs: Vec<TimSortRun> = Vec::new();

    let mut start = 0;
    while start < len {
        let (mut run_len, was_reversed) = find_existing_run(&v[start..], is_less);
        if was_reversed {
            v[start..start + run_len].reverse();
        }

        // Natural runs below minrun are topped up by binary insertion, so every merge
        // input has a healthy size except possibly the final run.
        if run_len < min_run {
            let forced = cmp::min(min_run, len - start);
            binary_insertion_sort(&mut v[start..start + forced], run_len, is_less);
            run_len = forced;
        }

        runs.push(TimSortRun {
            start,
            len: run_len,
        });
        start += run_len;

        merge_collapse(v, &mut runs, scratch_base, &mut state, is_less);
    }

    merge_force_collapse(v, &mut runs, scratch_base, &mut state, is_less);
    debug_assert!(runs.len() == 1 && runs[0].start == 0 && runs[0].len == len);
}

/// Computes the minimum run length for an input of length `n`: `n` shifted right until
/// below 64, with a sticky bit recording whether any 1-bits were shifted out. Keeps the
/// run count at or just below a power of two, which balances the merge tree.
fn min_run_length(mut n: usize) -> usize {
    let mut r = 0;
    while n >= MIN_MERGE {
        r |= n & 1;
        n >>= 1;
    }
    n + r
}

/// Finds a run of sorted elements starting at the beginning of the slice.
///
/// Returns the length of the run, and a bool that is false when the run is ascending,
/// and true if the run is strictly descending. The descending case is strict so that
/// reversing it cannot reorder equal elements.
fn find_existing_run<T, F: FnMut(&T, &T) -> bool>(v: &[T], is_less: &mut F) -> (usize, bool) {
    let len = v.len();
    if len < 2 {
        return (len, false);
    }

    unsafe {
        // SAFETY: We checked that len >= 2, so 0 and 1 are valid indices.
        // This also means that run_len < len implies run_len and
        // run_len - 1 are valid indices as well.
        let mut run_len = 2;
        let strictly_descending = is_less(v.get_unchecked(1), v.get_unchecked(0));
        if strictly_descending {
            while run_len < len && is_less(v.get_unchecked(run_len), v.get_unchecked(run_len - 1)) {
                run_len += 1;
            }
        } else {
            while run_len < len && !is_less(v.get_unchecked(run_len), v.get_unchecked(run_len - 1))
            {
                run_len += 1;
            }
        }
        (run_len, strictly_descending)
    }
}

/// Restores the run-length invariant after each push: with the top three run lengths
/// C, B, A (A topmost), C must exceed B + A and B must exceed A. When C fails its bound,
/// merging C with B or B with A — whichever keeps the shorter neighbor on top — is the
/// classical greedy rule that keeps total merge work near optimal for partially sorted
/// input.
fn merge_collapse<T, F: FnMut(&T, &T) -> bool>(
    v: &mut [T],
    runs: &mut Vec<TimSortRun>,
    scratch_base: *mut T,
    state: &mut MergeState,
    is_less: &mut F,
) {
    while runs.len() > 1 {
        let n = runs.len();
        if n >= 3 && runs[n - 3].len <= runs[n - 2].len + runs[n - 1].len {
            let at = if runs[n - 3].len < runs[n - 1].len {
                n - 3
            } else {
                n - 2
            };
            merge_at(v, runs, at, scratch_base, state, is_less);
        } else if runs[n - 2].len <= runs[n - 1].len {
            merge_at(v, runs, n - 2, scratch_base, state, is_less);
        } else {
            break;
        }
    }
}

/// Collapses the pending stack down to a single run once the input is exhausted.
fn merge_force_collapse<T, F: FnMut(&T, &T) -> bool>(
    v: &mut [T],
    runs: &mut Vec<TimSortRun>,
    scratch_base: *mut T,
    state: &mut MergeState,
    is_less: &mut F,
) {
    while runs.len() > 1 {
        let n = runs.len();
        let at = if n >= 3 && runs[n - 3].len < runs[n - 1].len {
            n - 3
        } else {
            n - 2
        };
        merge_at(v, runs, at, scratch_base, state, is_less);
    }
}

/// Merges the adjacent runs `runs[r]` and `runs[r + 1]`. Gallops first to trim a's
/// prefix already at or below b's first element and b's suffix already above a's last,
/// so runs that are globally ordered against each other cost only two searches.
fn merge_at<T, F: FnMut(&T, &T) -> bool>(
    v: &mut [T],
    runs: &mut Vec<TimSortRun>,
    r: usize,
    scratch_base: *mut T,
    state: &mut MergeState,
    is_less: &mut F,
) {
    let a = runs[r];
    let b = runs[r + 1];
    debug_assert!(a.len > 0 && b.len > 0 && a.start + a.len == b.start);

    // The stack entry becomes the combined run before any element moves; the merge
    // machinery below only sees the trimmed windows.
    runs[r] = TimSortRun {
        start: a.start,
        len: a.len + b.len,
    };
    runs.remove(r + 1);

    let k = gallop(
        &v[b.start],
        &v[a.start..a.start + a.len],
        0,
        true,
        is_less,
    );
    let a_start = a.start + k;
    let a_len = a.len - k;
    if a_len == 0 {
        return;
    }

    let b_len = gallop(
        &v[a_start + a_len - 1],
        &v[b.start..b.start + b.len],
        b.len - 1,
        false,
        is_less,
    );
    if b_len == 0 {
        return;
    }

    // SAFETY: the trimmed runs are adjacent, non-empty and individually sorted, with
    // b[0] < a[0] and a[last] > b[last] by the searches above; scratch has room for
    // len / 2 elements and the snapshotted side is at most half the merge window; T was
    // checked to be non-zero-sized at the entry point.
    let merged = &mut v[a_start..b.start + b_len];
    unsafe {
        if a_len <= b_len {
            merge_lo(merged, a_len, scratch_base, state, is_less);
        } else {
            merge_hi(merged, a_len, scratch_base, state, is_less);
        }
    }
}
