use std::mem::ManuallyDrop;
use std::ptr;

/// Sorts `v` by binary insertion, assuming `v[..offset]` is already sorted.
///
/// The insertion point is found with strict less-than, so an element equal to already
/// sorted ones lands after them and stability is preserved. Move cost is quadratic in
/// the worst case, which is fine because callers bound the window by minrun.
pub fn binary_insertion_sort<T, F>(v: &mut [T], offset: usize, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    // This would be a logic bug.
    assert!(offset != 0 && offset <= len);

    for i in offset..len {
        // Find where v[i] belongs in the sorted prefix v[..i].
        let mut lo = 0;
        let mut hi = i;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if is_less(&v[i], &v[mid]) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        // Shift v[lo..i] up one slot and drop the element into the gap. All comparator
        // calls happened above, so no user code can panic while the element in flight is
        // duplicated.
        // SAFETY: lo <= i < len, so both ranges are in bounds; tmp is a bitwise copy
        // that is written back exactly once and never dropped.
        unsafe {
            let v_base = v.as_mut_ptr();
            let tmp = ManuallyDrop::new(ptr::read(v_base.add(i)));
            ptr::copy(v_base.add(lo), v_base.add(lo + 1), i - lo);
            ptr::copy_nonoverlapping(&*tmp, v_base.add(lo), 1);
        }
    }
}
