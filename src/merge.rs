use std::ptr;

use crate::gallop::{gallop, MIN_GALLOP};

/// Adaptive threshold state shared by every merge of one sort invocation.
///
/// `min_gallop` is the number of consecutive wins one side must string together before a
/// merge switches into galloping mode. It shrinks (floored at 1) while galloping pays off
/// and grows again when it does not, so the threshold tracks how block-structured the
/// input actually is.
pub struct MergeState {
    pub min_gallop: usize,
}

impl MergeState {
    pub fn new() -> Self {
        Self {
            min_gallop: MIN_GALLOP,
        }
    }
}

/// The two states of the merge loop: element-at-a-time comparison until one side strings
/// together `min_gallop` wins, then galloping block transfer until a full round finds
/// only short blocks on both sides.
enum MergeMode {
    OneAtATime,
    Galloping,
}

/// Merges the adjacent non-decreasing runs `v[..mid]` and `v[mid..]` when the left run is
/// the shorter side, writing the destination front-to-back. The left run is snapshotted
/// into `buf` so the destination writes cannot clobber unread source elements.
///
/// # Safety
///
/// `buf` must be valid for `mid` writes and must not alias `v`. The caller must ensure
/// `0 < mid` and `mid <= v.len() - mid`, that `v[mid]` orders strictly before `v[0]` and
/// `v[mid - 1]` strictly after `v[v.len() - 1]` (both hold after the gallop trim in
/// `merge_at`), and that `T` is not a zero-sized type.
pub unsafe fn merge_lo<T, F>(
    v: &mut [T],
    mid: usize,
    buf: *mut T,
    state: &mut MergeState,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();
    let v_base = v.as_mut_ptr();
    debug_assert!(mid > 0 && mid <= len - mid);

    // Snapshot the left run. From here on `hole` tracks it: start..end is the unconsumed
    // part of the run inside `buf`, dst the output cursor in `v`. The region dst..b_cur
    // of `v` holds only stale copies, and its length always equals end - start, so if
    // `is_less` panics, dropping `hole` refills it and `v` again holds every element
    // exactly once. The same drop doubles as the comparison-free tail copy on the normal
    // exit paths below.
    let mut hole;
    let v_end;
    let mut b_cur;
    unsafe {
        ptr::copy_nonoverlapping(v_base, buf, mid);
        hole = MergeHole {
            start: buf,
            end: buf.add(mid),
            dst: v_base,
        };
        v_end = v_base.add(len);
        b_cur = v_base.add(mid);

        // The trim in merge_at guarantees b's first element precedes all of a.
        ptr::copy_nonoverlapping(get_and_increment(&mut b_cur), get_and_increment(&mut hole.dst), 1);
    }
    if mid == 1 || b_cur == v_end {
        // SAFETY: cursors are in bounds and describe the remaining elements.
        return unsafe { finish_lo(hole, b_cur, v_end) };
    }

    let mut mode = MergeMode::OneAtATime;
    loop {
        match mode {
            MergeMode::OneAtATime => {
                let min_gallop = state.min_gallop;
                let mut a_wins = 0;
                let mut b_wins = 0;
                loop {
                    // SAFETY: both sides are non-empty here; every copy below re-checks
                    // exhaustion before the next comparison, so the cursors stay in
                    // bounds even if `is_less` is inconsistent.
                    unsafe {
                        // Take the smaller front element; ties go to a, keeping the sort
                        // stable.
                        if is_less(&*b_cur, &*hole.start) {
                            ptr::copy_nonoverlapping(
                                get_and_increment(&mut b_cur),
                                get_and_increment(&mut hole.dst),
                                1,
                            );
                            if b_cur == v_end {
                                return finish_lo(hole, b_cur, v_end);
                            }
                            b_wins += 1;
                            a_wins = 0;
                        } else {
                            ptr::copy_nonoverlapping(
                                get_and_increment(&mut hole.start),
                                get_and_increment(&mut hole.dst),
                                1,
                            );
                            if hole.rem() == 1 {
                                return finish_lo(hole, b_cur, v_end);
                            }
                            a_wins += 1;
                            b_wins = 0;
                        }
                    }
                    if a_wins >= min_gallop || b_wins >= min_gallop {
                        mode = MergeMode::Galloping;
                        break;
                    }
                }
            }
            MergeMode::Galloping => {
                state.min_gallop += 1;
                loop {
                    state.min_gallop -= (state.min_gallop > 1) as usize;

                    // SAFETY: entering a round both sides hold at least one element (a at
                    // least two), and each block size comes from gallop(), which is
                    // clamped to the window it searched.
                    unsafe {
                        // Every leading element of a below b's front moves as one block.
                        let a_rem = hole.rem();
                        let a_slice = std::slice::from_raw_parts(hole.start, a_rem);
                        let a_count = gallop(&*b_cur, a_slice, 0, true, is_less);
                        ptr::copy_nonoverlapping(hole.start, hole.dst, a_count);
                        hole.start = hole.start.add(a_count);
                        hole.dst = hole.dst.add(a_count);
                        if a_rem - a_count < 2 {
                            return finish_lo(hole, b_cur, v_end);
                        }

                        ptr::copy_nonoverlapping(
                            get_and_increment(&mut b_cur),
                            get_and_increment(&mut hole.dst),
                            1,
                        );
                        if b_cur == v_end {
                            return finish_lo(hole, b_cur, v_end);
                        }

                        // And symmetrically for b against a's new front.
                        let b_rem = v_end.offset_from(b_cur) as usize;
                        let b_slice = std::slice::from_raw_parts(b_cur, b_rem);
                        let b_count = gallop(&*hole.start, b_slice, 0, false, is_less);
                        // b's block may outgrow the hole and overlap its own old
                        // position, so this copy must be a move.
                        ptr::copy(b_cur, hole.dst, b_count);
                        b_cur = b_cur.add(b_count);
                        hole.dst = hole.dst.add(b_count);
                        if b_cur == v_end {
                            return finish_lo(hole, b_cur, v_end);
                        }

                        ptr::copy_nonoverlapping(
                            get_and_increment(&mut hole.start),
                            get_and_increment(&mut hole.dst),
                            1,
                        );
                        if hole.rem() == 1 {
                            return finish_lo(hole, b_cur, v_end);
                        }

                        if a_count < MIN_GALLOP && b_count < MIN_GALLOP {
                            state.min_gallop += 1;
                            mode = MergeMode::OneAtATime;
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Terminal step of `merge_lo`: one side is exhausted (or a is down to its last element,
/// which the trim proved orders after all of b), so the rest moves without comparisons.
///
/// # Safety
///
/// Cursors must describe the remaining elements as maintained by `merge_lo`.
unsafe fn finish_lo<T>(mut hole: MergeHole<T>, b_cur: *mut T, v_end: *mut T) {
    unsafe {
        let b_rem = v_end.offset_from(b_cur) as usize;
        ptr::copy(b_cur, hole.dst, b_rem);
        hole.dst = hole.dst.add(b_rem);
    }
    // `hole` drops here and copies a's remainder after b's.
}

/// Mirror of `merge_lo` for when the right run `v[mid..]` is the shorter side: the right
/// run is snapshotted and the destination is written back-to-front, so ties go to b,
/// whose equal elements must land behind a's.
///
/// # Safety
///
/// `buf` must be valid for `v.len() - mid` writes and must not alias `v`. The caller must
/// ensure `0 < v.len() - mid < mid`, the same trim guarantees as `merge_lo`, and that `T`
/// is not a zero-sized type.
pub unsafe fn merge_hi<T, F>(
    v: &mut [T],
    mid: usize,
    buf: *mut T,
    state: &mut MergeState,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();
    let v_base = v.as_mut_ptr();
    let b_len = len - mid;
    debug_assert!(b_len > 0 && b_len < mid);

    // Snapshot the right run. Here start..end is b's unconsumed part inside `buf` and dst
    // doubles as a's end cursor: the hole in `v` is exactly dst..out, whose length always
    // equals end - start, so dropping `hole` after a comparator panic again leaves `v` a
    // permutation of its input.
    let mut hole;
    let mut out;
    unsafe {
        ptr::copy_nonoverlapping(v_base.add(mid), buf, b_len);
        hole = MergeHole {
            start: buf,
            end: buf.add(b_len),
            dst: v_base.add(mid),
        };
        out = v_base.add(len);

        // The trim in merge_at guarantees a's last element follows all of b.
        ptr::copy_nonoverlapping(decrement_and_get(&mut hole.dst), decrement_and_get(&mut out), 1);
    }
    if hole.dst == v_base || b_len == 1 {
        // SAFETY: cursors are in bounds and describe the remaining elements.
        return unsafe { finish_hi(hole, v_base, out) };
    }

    let mut mode = MergeMode::OneAtATime;
    loop {
        match mode {
            MergeMode::OneAtATime => {
                let min_gallop = state.min_gallop;
                let mut a_wins = 0;
                let mut b_wins = 0;
                loop {
                    // SAFETY: both sides are non-empty here (b holds at least two); every
                    // copy re-checks exhaustion before the next comparison.
                    unsafe {
                        // Take the larger back element; ties go to b.
                        if is_less(&*hole.end.sub(1), &*hole.dst.sub(1)) {
                            ptr::copy_nonoverlapping(
                                decrement_and_get(&mut hole.dst),
                                decrement_and_get(&mut out),
                                1,
                            );
                            if hole.dst == v_base {
                                return finish_hi(hole, v_base, out);
                            }
                            a_wins += 1;
                            b_wins = 0;
                        } else {
                            ptr::copy_nonoverlapping(
                                decrement_and_get(&mut hole.end),
                                decrement_and_get(&mut out),
                                1,
                            );
                            if hole.rem() == 1 {
                                return finish_hi(hole, v_base, out);
                            }
                            b_wins += 1;
                            a_wins = 0;
                        }
                    }
                    if a_wins >= min_gallop || b_wins >= min_gallop {
                        mode = MergeMode::Galloping;
                        break;
                    }
                }
            }
            MergeMode::Galloping => {
                state.min_gallop += 1;
                loop {
                    state.min_gallop -= (state.min_gallop > 1) as usize;

                    // SAFETY: entering a round a is non-empty and b holds at least two
                    // elements; block sizes come from gallop() and are clamped to the
                    // windows searched.
                    unsafe {
                        // Every trailing element of a above b's back moves as one block.
                        let a_len = hole.dst.offset_from(v_base) as usize;
                        let a_slice = std::slice::from_raw_parts(v_base, a_len);
                        let k = gallop(&*hole.end.sub(1), a_slice, a_len - 1, true, is_less);
                        let a_count = a_len - k;
                        // a's block may overlap its own old position inside v, so this
                        // copy must be a move.
                        ptr::copy(v_base.add(k), out.sub(a_count), a_count);
                        out = out.sub(a_count);
                        hole.dst = v_base.add(k);
                        if k == 0 {
                            return finish_hi(hole, v_base, out);
                        }

                        ptr::copy_nonoverlapping(
                            decrement_and_get(&mut hole.end),
                            decrement_and_get(&mut out),
                            1,
                        );
                        if hole.rem() == 1 {
                            return finish_hi(hole, v_base, out);
                        }

                        // And symmetrically for b against a's new back.
                        let b_rem = hole.rem();
                        let b_slice = std::slice::from_raw_parts(hole.start, b_rem);
                        let kb = gallop(&*hole.dst.sub(1), b_slice, b_rem - 1, false, is_less);
                        let b_count = b_rem - kb;
                        ptr::copy_nonoverlapping(hole.start.add(kb), out.sub(b_count), b_count);
                        out = out.sub(b_count);
                        hole.end = hole.start.add(kb);
                        if kb < 2 {
                            return finish_hi(hole, v_base, out);
                        }

                        ptr::copy_nonoverlapping(
                            decrement_and_get(&mut hole.dst),
                            decrement_and_get(&mut out),
                            1,
                        );
                        if hole.dst == v_base {
                            return finish_hi(hole, v_base, out);
                        }

                        if a_count < MIN_GALLOP && b_count < MIN_GALLOP {
                            state.min_gallop += 1;
                            mode = MergeMode::OneAtATime;
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Terminal step of `merge_hi`: a's remainder slides up against the written region and
/// the hole guard drops b's remainder into the slots below it, no comparisons needed.
///
/// # Safety
///
/// Cursors must describe the remaining elements as maintained by `merge_hi`.
unsafe fn finish_hi<T>(mut hole: MergeHole<T>, v_base: *mut T, out: *mut T) {
    unsafe {
        let a_rem = hole.dst.offset_from(v_base) as usize;
        ptr::copy(v_base, out.sub(a_rem), a_rem);
        hole.dst = v_base;
    }
    // `hole` drops here and copies b's remainder below a's.
}

unsafe fn get_and_increment<T>(ptr: &mut *mut T) -> *mut T {
    let old = *ptr;

    // SAFETY: ptr.add(1) must still be a valid pointer and part of `v`.
    *ptr = unsafe { ptr.add(1) };
    old
}

unsafe fn decrement_and_get<T>(ptr: &mut *mut T) -> *mut T {
    // SAFETY: ptr.sub(1) must still be a valid pointer and part of `v`.
    *ptr = unsafe { ptr.sub(1) };
    *ptr
}

// When dropped, copies the range `start..end` into `dst..`.
struct MergeHole<T> {
    start: *mut T,
    end: *mut T,
    dst: *mut T,
}

impl<T> MergeHole<T> {
    fn rem(&self) -> usize {
        // SAFETY: start and end always point into the same scratch allocation.
        unsafe { self.end.offset_from(self.start) as usize }
    }
}

impl<T> Drop for MergeHole<T> {
    fn drop(&mut self) {
        // SAFETY: `T` is not a zero-sized type, start..end is the unconsumed part of the
        // snapshotted run and dst.. is the hole of the same length it belongs in.
        unsafe {
            let len = self.end.offset_from(self.start) as usize;
            ptr::copy_nonoverlapping(self.start, self.dst, len);
        }
    }
}
