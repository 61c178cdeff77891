use std::cmp::Ordering;
use std::mem::MaybeUninit;

mod gallop;
mod merge;
mod smallsort;
mod tim;

/// Sorts `v` in place. The sort is stable: elements that compare equal keep their
/// relative input order.
#[inline(always)]
pub fn sort<T: Ord>(v: &mut [T]) {
    timsort(v, |a, b| a.lt(b));
}

/// Sorts `v` in place with a caller-supplied comparison function. Stable, like `sort`.
///
/// `compare` must be a total order over the elements present; if it is not, the
/// resulting order is unspecified, but `v` still holds every element exactly once.
#[inline(always)]
pub fn sort_by<T, F: FnMut(&T, &T) -> Ordering>(v: &mut [T], mut compare: F) {
    timsort(v, |a, b| compare(a, b) == Ordering::Less);
}

#[inline(always)]
fn timsort<T, F: FnMut(&T, &T) -> bool>(v: &mut [T], mut is_less: F) {
    // Sorting has no meaningful behavior on zero-sized types.
    if v.len() < 2 || std::mem::size_of::<T>() == 0 {
        return;
    }

    slow_path_sort(v, &mut is_less);
}

#[inline(never)]
#[cold]
fn slow_path_sort<T, F: FnMut(&T, &T) -> bool>(v: &mut [T], is_less: &mut F) {
    // Every merge snapshots only its shorter side, which is never longer than half the
    // input, so this is the most scratch any single merge can need.
    let mut scratch: Vec<T> = Vec::with_capacity(v.len() / 2);
    let scratch_slice = unsafe {
        std::slice::from_raw_parts_mut(
            scratch.as_mut_ptr().cast::<MaybeUninit<T>>(),
            scratch.capacity(),
        )
    };
    tim::sort(v, scratch_slice, is_less);
}
