//! The client state machine and the 64-slot client table (spec.md
//! §4.2.3, §5's "64 concurrent clients" resource cap).

use std::os::unix::net::UnixStream;
use std::time::Instant;

use protocol::RESPONSE_HEADER_LEN;

use crate::buffer::Position;

/// Upper bound on concurrently connected clients (spec.md §5).
pub const MAX_CLIENTS: usize = 64;

/// In-flight state of one response currently being written to a client.
#[derive(Debug)]
pub struct SendCursor {
    /// The 10-digit content-length header.
    pub header: [u8; RESPONSE_HEADER_LEN],
    /// Whether the header (and, per the single-write framing contract,
    /// at least its full length) has gone out yet.
    pub header_sent: bool,
    /// Where in the buffer queue the next unsent payload byte lives.
    pub cursor: Position,
    /// The stream-wide absolute offset one past the last payload byte.
    pub end_absolute: u64,
}

impl SendCursor {
    /// Whether every payload byte has been written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.header_sent && self.cursor.absolute >= self.end_absolute
    }
}

/// A client's progress through the protocol (spec.md §4.2.3).
#[derive(Debug)]
pub enum ClientState {
    /// Waiting for a command byte.
    ReadCommand,
    /// Got `C`; will start sending as soon as a record is available.
    SendCurrent,
    /// Got `L`; will start sending only once standard input hits EOF.
    SendLast,
    /// Emitting the framed response.
    SendingResponse(SendCursor),
    /// Response fully written; waiting for the client to close.
    WaitClose,
}

/// One occupied client-table slot.
pub struct ClientSlot {
    /// The accepted connection.
    pub stream: UnixStream,
    /// This client's state-machine position.
    pub state: ClientState,
    /// When this client last made protocol progress, for
    /// `--idle-timeout` (spec.md §5's ambient addition). Only consulted
    /// while `state` is [`ClientState::ReadCommand`].
    pub last_active: Instant,
}

/// The fixed-size table of connected clients.
#[derive(Default)]
pub struct ClientTable {
    slots: Vec<Option<ClientSlot>>,
}

impl ClientTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_CLIENTS).map(|_| None).collect(),
        }
    }

    /// Inserts a newly accepted connection into the first free slot.
    ///
    /// Returns `None` if every slot is occupied (spec.md §4.2.2: "If all
    /// slots are taken, the process aborts with a clear error" — the
    /// caller maps that absence to a fatal error).
    pub fn insert(&mut self, stream: UnixStream) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(ClientSlot {
            stream,
            state: ClientState::ReadCommand,
            last_active: Instant::now(),
        });
        Some(index)
    }

    /// Frees a slot (client reached EOF, finished `wait_close`, or was
    /// evicted by an idle timeout or a fatal per-client error).
    pub fn remove(&mut self, index: usize) {
        self.slots[index] = None;
    }

    /// Iterates occupied slots by index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ClientSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s)))
    }

    /// Iterates occupied slots mutably by index.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut ClientSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|s| (i, s)))
    }

    /// Borrows one slot by index.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ClientSlot> {
        self.slots[index].as_mut()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether the table has no occupied slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_fills_first_free_slot_and_remove_frees_it() {
        let mut table = ClientTable::new();
        let (a, _b) = UnixStream::pair().expect("pair");
        let index = table.insert(a).expect("insert");
        assert_eq!(table.len(), 1);
        table.remove(index);
        assert!(table.is_empty());
    }

    #[test]
    fn insert_fails_once_all_slots_are_taken() {
        let mut table = ClientTable::new();
        for _ in 0..MAX_CLIENTS {
            let (a, _b) = UnixStream::pair().expect("pair");
            assert!(table.insert(a).is_some());
        }
        let (a, _b) = UnixStream::pair().expect("pair");
        assert!(table.insert(a).is_none());
    }
}
