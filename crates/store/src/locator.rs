//! The record locator (spec.md §4.2.5): turning a response window into a
//! concrete `begin..end` byte range over the buffer queue.
//!
//! The byte-by-byte description in spec.md is the semantic contract, not
//! an efficiency target (spec.md §9's ambient note): the reverse scan
//! within one buffer is [`protocol::locator::separator_position_from_end`]
//! (itself `memchr`-backed), walked buffer by buffer backward through the
//! queue. The externally observable `begin..end` range is identical to
//! the naive byte-at-a-time walk.
//!
//! A record's own delimiter is never part of its content: `end` lands
//! *at* the separator closest to the tail (excluding it), `begin` lands
//! *just past* the separator `rend` records further back, so a one-record
//! window comes back as the bare record with no leading or trailing
//! separator, and a multi-record window keeps only the separators between
//! the records it spans.

use crate::buffer::{BufferQueue, Position};
use crate::config::{Framing, Window};

/// A located response: the byte range `begin..end` to serve for the
/// current window, expressed as stream-wide positions that may span
/// several buffers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResponseWindow {
    /// Start of the window (further back in the stream).
    pub begin: Position,
    /// End of the window (closer to the tail).
    pub end: Position,
}

impl ResponseWindow {
    /// Total payload length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.absolute - self.begin.absolute
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The absolute stream position of the `k`-th separator counting
/// backward from the tail (`k = 1` is the separator closest to the tail).
/// Returns `None` if the queue holds fewer than `k` separators.
fn separator_absolute_from_tail(queue: &BufferQueue, separator: u8, k: u64) -> Option<u64> {
    let mut remaining = k;
    for (_, buffer) in queue.iter_from_tail() {
        let available = protocol::locator::count_separators(&buffer.data, separator) as u64;
        if available < remaining {
            remaining -= available;
            continue;
        }
        let index = protocol::locator::separator_position_from_end(
            &buffer.data,
            separator,
            remaining as usize,
        )?;
        return Some(buffer.bytes_before() + index as u64);
    }
    None
}

/// The fixed-length-mode analogue: the position `k` record boundaries
/// back from the tail, after discarding any trailing partial record.
fn position_after_kth_record_from_tail(
    queue: &BufferQueue,
    record_len: u64,
    k: u64,
) -> Option<Position> {
    let tail = queue.tail_position()?;
    let total_bytes = tail.absolute;
    let trailing = protocol::locator::trailing_partial_bytes(total_bytes, record_len);
    let distance_from_tail = trailing + (k - 1) * record_len;
    if distance_from_tail > total_bytes {
        return None;
    }
    queue.position_at_absolute(total_bytes - distance_from_tail)
}

/// Locates the current response window, or `None` if fewer than
/// `window.rend` complete records have been seen yet (spec.md §4.2.5:
/// "record_locator returns without setting `have_record`").
#[must_use]
pub fn record_locator(
    queue: &BufferQueue,
    framing: Framing,
    window: Window,
) -> Option<ResponseWindow> {
    if queue.total_record_count() < window.rend {
        return None;
    }
    let (end, begin) = match framing {
        Framing::Separator(separator) => {
            let end_absolute = separator_absolute_from_tail(queue, separator, 1 + window.rbegin)?;
            let begin_absolute =
                separator_absolute_from_tail(queue, separator, 1 + window.rend)? + 1;
            (
                queue.position_at_absolute(end_absolute)?,
                queue.position_at_absolute(begin_absolute)?,
            )
        }
        Framing::FixedLength(len) => {
            let end = position_after_kth_record_from_tail(queue, len, 1 + window.rbegin)?;
            let begin = position_after_kth_record_from_tail(queue, len, 1 + window.rend)?;
            (end, begin)
        }
    };
    Some(ResponseWindow { begin, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_from(records: &[&[u8]]) -> BufferQueue {
        let mut queue = BufferQueue::new();
        for chunk in records {
            queue.push(chunk.to_vec(), Framing::Separator(b'\n'), None);
        }
        queue
    }

    fn read_window(queue: &BufferQueue, window: &ResponseWindow) -> Vec<u8> {
        let mut out = Vec::new();
        for (buffer_ref, buffer) in queue.iter_from_tail().collect::<Vec<_>>().into_iter().rev() {
            if buffer.bytes_before() >= window.end.absolute {
                continue;
            }
            if buffer.byte_count <= window.begin.absolute {
                continue;
            }
            let start = if buffer_ref == window.begin.buffer {
                window.begin.offset
            } else {
                0
            };
            let end = if buffer_ref == window.end.buffer {
                window.end.offset
            } else {
                buffer.data.len()
            };
            out.extend_from_slice(&buffer.data[start..end]);
        }
        out
    }

    #[test]
    fn scenario_a_window_0_1_locates_latest_record() {
        let queue = queue_from(&[b"a\nbb\nccc\n"]);
        let window = record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 0, rend: 1 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"ccc");
    }

    #[test]
    fn scenario_b_window_1_2_locates_previous_record() {
        let queue = queue_from(&[b"a\nbb\nccc\n"]);
        let window = record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 1, rend: 2 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"bb");
    }

    #[test]
    fn trailing_partial_bytes_are_never_served() {
        let queue = queue_from(&[b"a\nbb\npartial"]);
        let window = record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 0, rend: 1 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"bb");
    }

    #[test]
    fn window_spanning_multiple_buffers_keeps_internal_separators() {
        let queue = queue_from(&[b"a\nbb\n", b"ccc\nd\n"]);
        let window = record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 0, rend: 3 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"bb\nccc\nd");
    }

    #[test]
    fn not_enough_records_yet_returns_none() {
        let queue = queue_from(&[b"a\n"]);
        assert!(record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 1, rend: 2 }).is_none());
    }

    #[test]
    fn fixed_length_mode_returns_final_l_bytes() {
        let mut queue = BufferQueue::new();
        queue.push(b"abcdefgh".to_vec(), Framing::FixedLength(4), None);
        let window = record_locator(&queue, Framing::FixedLength(4), Window { rbegin: 0, rend: 1 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"efgh");
    }

    #[test]
    fn fixed_length_mode_discards_trailing_partial_bytes() {
        let mut queue = BufferQueue::new();
        queue.push(b"abcdefghi".to_vec(), Framing::FixedLength(4), None);
        let window = record_locator(&queue, Framing::FixedLength(4), Window { rbegin: 0, rend: 1 })
            .expect("window");
        assert_eq!(read_window(&queue, &window), b"efgh");
    }

    proptest::proptest! {
        #[test]
        fn matches_naive_split_on_separator(chunks: Vec<Vec<u8>>) {
            let mut queue = BufferQueue::new();
            let mut whole = Vec::new();
            for chunk in &chunks {
                queue.push(chunk.clone(), Framing::Separator(b'\n'), None);
                whole.extend_from_slice(chunk);
            }
            let records: Vec<&[u8]> = whole.split(|&b| b == b'\n').collect();
            if records.len() < 2 {
                return Ok(());
            }
            let complete = &records[..records.len() - 1];
            let window = record_locator(&queue, Framing::Separator(b'\n'), Window { rbegin: 0, rend: 1 });
            if let Some(window) = window {
                let expected = complete.last().unwrap();
                assert_eq!(&read_window(&queue, &window), expected);
            }
        }
    }
}
