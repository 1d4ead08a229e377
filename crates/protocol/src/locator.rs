//! Single-buffer primitives for the store's record locator (spec.md
//! §4.2.4, §4.2.5).
//!
//! The locator itself walks the doubly linked buffer queue and so belongs
//! to `crates/store`, which owns that queue and stitches these primitives
//! together across buffer boundaries. This module only answers questions
//! about one buffer's bytes: how many separators it holds, and where the
//! k-th separator counting backward from the end sits.

use memchr::Memchr;

/// Counts occurrences of `separator` in `data` (spec.md §4.2.4's
/// `count(b.data, rs)`).
#[must_use]
pub fn count_separators(data: &[u8], separator: u8) -> usize {
    memchr::memchr_iter(separator, data).count()
}

/// The index of the `k`-th separator counting backward from the end of
/// `data` (`k = 1` is the last separator, `k = 2` the one before it, and
/// so on). `k` must be nonzero.
///
/// Returns `None` if `data` contains fewer than `k` occurrences of
/// `separator` — the caller must continue the search into the previous
/// buffer in the queue.
#[must_use]
pub fn separator_position_from_end(data: &[u8], separator: u8, k: usize) -> Option<usize> {
    debug_assert!(k > 0, "k is 1-indexed; 0 has no meaning");
    Memchr::new(separator, data).rev().nth(k - 1)
}

/// In fixed-length mode, the number of trailing bytes after the newest
/// complete `record_len`-byte record, given the cumulative byte count
/// (spec.md §4.2.5).
#[must_use]
pub const fn trailing_partial_bytes(byte_count: u64, record_len: u64) -> u64 {
    if record_len == 0 {
        0
    } else {
        byte_count % record_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = b"a\nbb\nccc\n";

    #[test]
    fn counts_separators_in_buffer() {
        assert_eq!(count_separators(DATA, b'\n'), 3);
    }

    #[test]
    fn finds_separators_counting_back_from_end() {
        assert_eq!(separator_position_from_end(DATA, b'\n', 1), Some(8));
        assert_eq!(separator_position_from_end(DATA, b'\n', 2), Some(4));
        assert_eq!(separator_position_from_end(DATA, b'\n', 3), Some(1));
        assert_eq!(separator_position_from_end(DATA, b'\n', 4), None);
    }

    #[test]
    fn scenario_a_window_0_1_locates_ccc() {
        // rbegin = 0, rend = 1: end is the last separator, begin is one
        // past the separator before it.
        let end = separator_position_from_end(DATA, b'\n', 1).expect("end");
        let begin = separator_position_from_end(DATA, b'\n', 2).expect("begin") + 1;
        assert_eq!(&DATA[begin..end], b"ccc");
    }

    #[test]
    fn scenario_b_window_1_2_locates_bb() {
        let end = separator_position_from_end(DATA, b'\n', 2).expect("end");
        let begin = separator_position_from_end(DATA, b'\n', 3).expect("begin") + 1;
        assert_eq!(&DATA[begin..end], b"bb");
    }

    #[test]
    fn trailing_partial_bytes_matches_modulo() {
        assert_eq!(trailing_partial_bytes(10, 4), 2);
        assert_eq!(trailing_partial_bytes(8, 4), 0);
    }

    proptest::proptest! {
        #[test]
        fn locating_never_panics(data: Vec<u8>, k in 1usize..20) {
            let _ = separator_position_from_end(&data, b'\n', k);
        }
    }
}
