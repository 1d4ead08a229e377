//! A `poll(2)`-based readiness set.
//!
//! Both the negotiator's ring wait (two descriptors: upstream in,
//! downstream out) and the store's event loop (stdin, the listener, and up
//! to 64 client sockets) wait on a handful of descriptors at a time.
//! `select(2)`'s `FD_SETSIZE` ceiling makes it the wrong primitive once the
//! client table is added to stdin and the listener, so this wraps
//! `poll(2)` instead.

use std::os::fd::RawFd;
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::PlatformError;

/// Which direction(s) of readiness a caller wants reported for a
/// descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interest {
    /// Wake when the descriptor has data to read (or, for a listener, a
    /// pending connection).
    Readable,
    /// Wake when a write would not block.
    Writable,
}

impl Interest {
    fn flags(self) -> PollFlags {
        match self {
            Self::Readable => PollFlags::POLLIN,
            Self::Writable => PollFlags::POLLOUT,
        }
    }
}

/// The readiness state observed for one registered descriptor after a
/// call to [`PollSet::wait`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Readiness {
    /// The descriptor's index within the set passed to [`PollSet::wait`],
    /// stable for the duration of that call (spec.md's open question on
    /// readiness-wait fd reporting is resolved by index, not raw fd, since
    /// slots are reused across rounds).
    pub index: usize,
    /// Whether the registered interest was satisfied.
    pub ready: bool,
    /// Whether the descriptor reported `POLLHUP`/`POLLERR`/`POLLNVAL`.
    pub hung_up: bool,
}

/// A fixed set of descriptors waited on together with `poll(2)`.
pub struct PollSet {
    fds: Vec<RawFd>,
    interests: Vec<Interest>,
}

impl PollSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fds: Vec::new(),
            interests: Vec::new(),
        }
    }

    /// Registers a descriptor, returning its stable index in the set.
    pub fn register(&mut self, fd: RawFd, interest: Interest) -> usize {
        self.fds.push(fd);
        self.interests.push(interest);
        self.fds.len() - 1
    }

    /// Removes the descriptor at `index`; later indices shift down by one,
    /// same as `Vec::remove`.
    pub fn remove(&mut self, index: usize) {
        self.fds.remove(index);
        self.interests.remove(index);
    }

    /// The number of descriptors currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Whether the set has no registered descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Blocks until at least one registered descriptor is ready, `timeout`
    /// elapses, or a signal interrupts the wait (retried transparently on
    /// `EINTR`).
    ///
    /// `timeout: None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Poll`] if the underlying `poll(2)` call
    /// fails for a reason other than `EINTR`.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Readiness>, PlatformError> {
        let mut entries: Vec<PollFd<'_>> = self
            .fds
            .iter()
            .zip(&self.interests)
            .map(|(fd, interest)| {
                let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(*fd) };
                PollFd::new(borrowed, interest.flags())
            })
            .collect();

        let poll_timeout = match timeout {
            Some(duration) => {
                let millis = u16::try_from(duration.as_millis().min(u128::from(u16::MAX)))
                    .unwrap_or(u16::MAX);
                PollTimeout::from(millis)
            }
            None => PollTimeout::NONE,
        };

        loop {
            match nix::poll::poll(&mut entries, poll_timeout) {
                Ok(_) => break,
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(PlatformError::Poll(err)),
            }
        }

        Ok(entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let revents = entry.revents().unwrap_or(PollFlags::empty());
                let hung_up = revents
                    .intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL);
                let ready = hung_up || revents.intersects(self.interests[index].flags());
                (ready || hung_up).then_some(Readiness {
                    index,
                    ready,
                    hung_up,
                })
            })
            .collect())
    }
}

impl Default for PollSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn reports_readable_pipe_by_index() {
        let (read, write) = nix::unistd::pipe().expect("pipe");
        let mut set = PollSet::new();
        let index = set.register(read.as_raw_fd(), Interest::Readable);

        nix::unistd::write(&write, b"x").expect("write");

        let readiness = set.wait(Some(Duration::from_secs(1))).expect("wait");
        assert_eq!(readiness.len(), 1);
        assert_eq!(readiness[0].index, index);
        assert!(readiness[0].ready);
        assert!(!readiness[0].hung_up);
    }

    #[test]
    fn reports_hang_up_after_writer_drops() {
        let (read, write) = nix::unistd::pipe().expect("pipe");
        let mut set = PollSet::new();
        set.register(read.as_raw_fd(), Interest::Readable);
        drop(write);

        let readiness = set.wait(Some(Duration::from_secs(1))).expect("wait");
        assert_eq!(readiness.len(), 1);
        assert!(readiness[0].hung_up);
    }

    #[test]
    fn times_out_with_nothing_ready() {
        let (read, _write) = nix::unistd::pipe().expect("pipe");
        let mut set = PollSet::new();
        set.register(read.as_raw_fd(), Interest::Readable);

        let readiness = set
            .wait(Some(Duration::from_millis(50)))
            .expect("wait");
        assert!(readiness.is_empty());
    }

    #[test]
    fn remove_shifts_later_indices_down() {
        let (read_a, write_a) = nix::unistd::pipe().expect("pipe");
        let (read_b, write_b) = nix::unistd::pipe().expect("pipe");
        let mut set = PollSet::new();
        set.register(read_a.as_raw_fd(), Interest::Readable);
        let index_b = set.register(read_b.as_raw_fd(), Interest::Readable);
        set.remove(0);
        assert_eq!(set.len(), 1);

        nix::unistd::write(&write_b, b"x").expect("write");
        let readiness = set.wait(Some(Duration::from_secs(1))).expect("wait");
        assert_eq!(readiness[0].index, index_b - 1);
        drop(write_a);
    }
}
