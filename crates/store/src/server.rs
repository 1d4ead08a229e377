//! The store's single-threaded event loop (spec.md §4.2.2).
//!
//! Each wakeup rebuilds the descriptor set from scratch: standard input (if
//! not yet at EOF), the listener (if the client table has room), and every
//! connected client registered for whichever direction its current state
//! needs. This matches spec.md §9's note that readiness here is re-checked
//! every wakeup rather than tracked incrementally across ticks.

use std::io::{ErrorKind, IoSlice, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixListener;
use std::time::{Duration, Instant};

use platform::nonblocking::set_nonblocking;
use platform::poll::{Interest, PollSet};
use protocol::RESPONSE_HEADER_LEN;

use crate::buffer::BufferQueue;
use crate::client::{ClientSlot, ClientState, ClientTable, MAX_CLIENTS};
use crate::config::RuntimeOptions;
use crate::error::StoreError;
use crate::locator::{record_locator, ResponseWindow};

const READ_CHUNK: usize = 64 * 1024;
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The running store process: its configuration, control socket, input
/// buffer queue, and connected clients.
pub struct Server {
    options: RuntimeOptions,
    listener: UnixListener,
    stdin: std::io::Stdin,
    stdin_eof: bool,
    queue: BufferQueue,
    clients: ClientTable,
    quit_requested: bool,
}

impl Server {
    /// Unlinks any stale socket at `options.socket_path`, binds a fresh
    /// control socket, and switches it and standard input to non-blocking
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SocketSetup`] if the stale path cannot be
    /// removed or the new socket cannot be bound, or
    /// [`StoreError::Platform`] if standard input cannot be switched to
    /// non-blocking mode.
    pub fn new(options: RuntimeOptions) -> Result<Self, StoreError> {
        if options.socket_path.exists() {
            std::fs::remove_file(&options.socket_path).map_err(|source| StoreError::SocketSetup {
                path: options.socket_path.clone(),
                source,
            })?;
        }
        let listener = UnixListener::bind(&options.socket_path).map_err(|source| StoreError::SocketSetup {
            path: options.socket_path.clone(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| StoreError::SocketSetup {
                path: options.socket_path.clone(),
                source,
            })?;

        let stdin = std::io::stdin();
        set_nonblocking(stdin.as_fd())?;

        Ok(Self {
            options,
            listener,
            stdin,
            stdin_eof: false,
            queue: BufferQueue::new(),
            clients: ClientTable::new(),
            quit_requested: false,
        })
    }

    /// Runs the event loop until a client sends `Q`, unlinking the control
    /// socket before returning.
    ///
    /// # Errors
    ///
    /// Returns any [`StoreError`] the loop hits along the way: a fatal I/O
    /// error on stdin, the listener, or a client socket, an unknown client
    /// command byte, or the client table filling up.
    pub fn run(&mut self) -> Result<(), StoreError> {
        loop {
            self.evict_idle_clients();

            let mut set = PollSet::new();
            let stdin_index =
                (!self.stdin_eof).then(|| set.register(self.stdin.as_fd().as_raw_fd(), Interest::Readable));
            let listener_index =
                (self.clients.len() < MAX_CLIENTS).then(|| set.register(self.listener.as_raw_fd(), Interest::Readable));
            let client_indices: Vec<(usize, usize)> = self
                .clients
                .iter()
                .map(|(slot_index, slot)| {
                    let interest = match slot.state {
                        ClientState::ReadCommand | ClientState::WaitClose => Interest::Readable,
                        ClientState::SendCurrent
                        | ClientState::SendLast
                        | ClientState::SendingResponse(_) => Interest::Writable,
                    };
                    (set.register(slot.stream.as_raw_fd(), interest), slot_index)
                })
                .collect();

            if set.is_empty() {
                break;
            }

            let timeout = self.options.idle_timeout.map(|_| IDLE_POLL_INTERVAL);
            let readiness = set.wait(timeout)?;
            let ready: std::collections::HashSet<usize> =
                readiness.iter().filter(|r| r.ready).map(|r| r.index).collect();

            if stdin_index.is_some_and(|i| ready.contains(&i)) {
                self.service_stdin()?;
            }
            for (poll_index, slot_index) in client_indices {
                if ready.contains(&poll_index) {
                    self.service_client(slot_index)?;
                }
            }
            if listener_index.is_some_and(|i| ready.contains(&i)) {
                self.service_accept()?;
            }

            if self.quit_requested {
                break;
            }
        }

        let _ = std::fs::remove_file(&self.options.socket_path);
        Ok(())
    }

    fn evict_idle_clients(&mut self) {
        let Some(idle_timeout) = self.options.idle_timeout else {
            return;
        };
        let timeout = Duration::from_secs(idle_timeout);
        let expired: Vec<usize> = self
            .clients
            .iter()
            .filter(|(_, slot)| {
                matches!(slot.state, ClientState::ReadCommand) && slot.last_active.elapsed() >= timeout
            })
            .map(|(index, _)| index)
            .collect();
        for index in expired {
            self.clients.remove(index);
        }
    }

    fn service_stdin(&mut self) -> Result<(), StoreError> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match self.stdin.lock().read(&mut buf) {
                Ok(0) => {
                    self.stdin_eof = true;
                    break;
                }
                Ok(n) => {
                    self.queue.push(buf[..n].to_vec(), self.options.framing, None);
                    if n < buf.len() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(StoreError::SocketIo(e)),
            }
        }
        self.reclaim_buffers();
        Ok(())
    }

    fn service_accept(&mut self) -> Result<(), StoreError> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(true).map_err(StoreError::SocketIo)?;
                    if self.clients.insert(stream).is_none() {
                        return Err(StoreError::ClientTableFull);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(StoreError::Accept(e)),
            }
        }
        Ok(())
    }

    fn service_client(&mut self, index: usize) -> Result<(), StoreError> {
        let window = self.current_window();
        let stdin_eof = self.stdin_eof;
        let queue = &self.queue;
        let outcome = match self.clients.get_mut(index) {
            Some(slot) => {
                slot.last_active = Instant::now();
                step_client(slot, window, stdin_eof, queue)?
            }
            None => StepOutcome::Continue,
        };

        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Remove => self.clients.remove(index),
            StepOutcome::Quit => self.quit_requested = true,
        }
        self.reclaim_buffers();
        Ok(())
    }

    fn current_window(&self) -> Option<ResponseWindow> {
        record_locator(&self.queue, self.options.framing, self.options.window)
    }

    /// Drops every buffer no longer needed by the current response window
    /// or any client mid-send (spec.md §4.2.7).
    fn reclaim_buffers(&mut self) {
        let Some(mut oldest) = self.queue.tail_ref() else {
            return;
        };
        if let Some(window) = self.current_window() {
            if window.begin.buffer.generation < oldest.generation {
                oldest = window.begin.buffer;
            }
        }
        for (_, slot) in self.clients.iter() {
            if let ClientState::SendingResponse(cursor) = &slot.state {
                if cursor.cursor.buffer.generation < oldest.generation {
                    oldest = cursor.cursor.buffer;
                }
            }
        }
        self.queue.reclaim(oldest);
    }
}

enum StepOutcome {
    Continue,
    Remove,
    Quit,
}

enum StateKind {
    ReadCommand,
    WaitClose,
    SendCurrent,
    SendLast,
    Sending,
}

fn step_client(
    slot: &mut ClientSlot,
    window: Option<ResponseWindow>,
    stdin_eof: bool,
    queue: &BufferQueue,
) -> Result<StepOutcome, StoreError> {
    let kind = match &slot.state {
        ClientState::ReadCommand => StateKind::ReadCommand,
        ClientState::WaitClose => StateKind::WaitClose,
        ClientState::SendCurrent => StateKind::SendCurrent,
        ClientState::SendLast => StateKind::SendLast,
        ClientState::SendingResponse(_) => StateKind::Sending,
    };

    match kind {
        StateKind::ReadCommand => {
            let mut byte = [0u8; 1];
            match slot.stream.read(&mut byte) {
                Ok(0) => Ok(StepOutcome::Remove),
                Ok(_) => match byte[0] {
                    b'C' => {
                        slot.state = ClientState::SendCurrent;
                        Ok(StepOutcome::Continue)
                    }
                    b'L' => {
                        slot.state = ClientState::SendLast;
                        Ok(StepOutcome::Continue)
                    }
                    b'Q' => Ok(StepOutcome::Quit),
                    other => Err(StoreError::UnknownCommand(other)),
                },
                Err(e) if would_block_or_interrupted(&e) => Ok(StepOutcome::Continue),
                Err(e) => Err(StoreError::SocketIo(e)),
            }
        }
        StateKind::WaitClose => {
            let mut discard = [0u8; 256];
            match slot.stream.read(&mut discard) {
                Ok(0) => Ok(StepOutcome::Remove),
                Ok(_) => Ok(StepOutcome::Continue),
                Err(e) if would_block_or_interrupted(&e) => Ok(StepOutcome::Continue),
                Err(e) => Err(StoreError::SocketIo(e)),
            }
        }
        StateKind::SendCurrent => {
            if let Some(window) = window {
                slot.state = ClientState::SendingResponse(new_cursor(window)?);
                continue_sending(slot, queue)
            } else {
                Ok(StepOutcome::Continue)
            }
        }
        StateKind::SendLast => {
            if stdin_eof {
                if let Some(window) = window {
                    slot.state = ClientState::SendingResponse(new_cursor(window)?);
                    return continue_sending(slot, queue);
                }
            }
            Ok(StepOutcome::Continue)
        }
        StateKind::Sending => continue_sending(slot, queue),
    }
}

fn new_cursor(window: ResponseWindow) -> Result<crate::client::SendCursor, StoreError> {
    let header = protocol::framing::encode_header(window.len())?;
    Ok(crate::client::SendCursor {
        header,
        header_sent: false,
        cursor: window.begin,
        end_absolute: window.end.absolute,
    })
}

/// Writes as much of the current response as the socket accepts this tick.
/// Per spec.md §4.2.6, the header and first payload chunk go out as one
/// scattered write; a short write that doesn't even cover the header is
/// fatal, anything else is just resumed on a later writable tick.
fn continue_sending(slot: &mut ClientSlot, queue: &BufferQueue) -> Result<StepOutcome, StoreError> {
    let ClientState::SendingResponse(cursor) = &mut slot.state else {
        return Ok(StepOutcome::Continue);
    };

    if cursor.header_sent {
        if let Some(chunk) = queue
            .chunk_at(cursor.cursor, cursor.end_absolute)
            .filter(|chunk| !chunk.is_empty())
        {
            match slot.stream.write(chunk) {
                Ok(n) => {
                    if let Some(next) = queue.advance_position(cursor.cursor, n as u64) {
                        cursor.cursor = next;
                    }
                }
                Err(e) if would_block_or_interrupted(&e) => return Ok(StepOutcome::Continue),
                Err(e) => return Err(StoreError::SocketIo(e)),
            }
        }
    } else {
        let chunk = queue.chunk_at(cursor.cursor, cursor.end_absolute).unwrap_or(&[]);
        let slices = [IoSlice::new(&cursor.header), IoSlice::new(chunk)];
        match slot.stream.write_vectored(&slices) {
            Ok(n) if n < RESPONSE_HEADER_LEN => {
                return Err(StoreError::SocketIo(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "short write on response header",
                )));
            }
            Ok(n) => {
                cursor.header_sent = true;
                let payload_written = (n - RESPONSE_HEADER_LEN) as u64;
                if let Some(next) = queue.advance_position(cursor.cursor, payload_written) {
                    cursor.cursor = next;
                }
            }
            Err(e) if would_block_or_interrupted(&e) => return Ok(StepOutcome::Continue),
            Err(e) => return Err(StoreError::SocketIo(e)),
        }
    }

    if cursor.is_complete() {
        slot.state = ClientState::WaitClose;
    }
    Ok(StepOutcome::Continue)
}

fn would_block_or_interrupted(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
