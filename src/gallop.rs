/// Base number of consecutive single-element wins one side needs before a merge switches
/// into galloping mode, and the block size a galloping round must reach to stay in it.
pub const MIN_GALLOP: usize = 7;

/// Locates the boundary `k` in `[0, v.len()]` of the sorted window `v` such that every
/// element of `v[..k]` orders before `key` and no element of `v[k..]` does.
///
/// `rightmost` selects the ordering test: `is_less(x, key)` finds the leftmost position
/// `key` could take, `!is_less(key, x)` the rightmost. Merges search the run whose equal
/// elements must stay in front with the rightmost form, which keeps the sort stable.
///
/// Starting from `hint`, probes at doubling offsets 1, 2, 4, 8, ... in the direction the
/// test at the hint points, clamps at the window edge, then bisects the final bracket.
/// Cost is O(log d) comparisons for a boundary at distance `d` from the hint, which is
/// what makes block transfers in galloping mode pay off.
pub fn gallop<T, F>(key: &T, v: &[T], hint: usize, rightmost: bool, is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();
    debug_assert!(hint < len);

    let mut below = |x: &T| {
        if rightmost {
            !is_less(key, x)
        } else {
            is_less(x, key)
        }
    };

    let mut lo;
    let mut hi;
    if below(&v[hint]) {
        // The boundary lies above the hint.
        let max_ofs = len - hint;
        let mut last_ofs = 0;
        let mut ofs = 1;
        while ofs < max_ofs && below(&v[hint + ofs]) {
            last_ofs = ofs;
            ofs *= 2;
        }
        if ofs > max_ofs {
            ofs = max_ofs;
        }
        lo = hint + last_ofs + 1;
        hi = hint + ofs;
    } else {
        // The boundary lies at or below the hint.
        let max_ofs = hint + 1;
        let mut last_ofs = 0;
        let mut ofs = 1;
        while ofs < max_ofs && !below(&v[hint - ofs]) {
            last_ofs = ofs;
            ofs *= 2;
        }
        if ofs > max_ofs {
            ofs = max_ofs;
        }
        lo = (hint + 1) - ofs;
        hi = hint - last_ofs;
    }

    // Bisect the bracket: everything before lo is known below, everything from hi on is
    // known not below.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if below(&v[mid]) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    hi
}
