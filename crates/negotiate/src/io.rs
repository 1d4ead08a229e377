//! Ring I/O: reading and writing message blocks over the two negotiation
//! descriptors (spec.md §4.1's ring traversal).
//!
//! **[AMBIENT]** Per the Design Note in spec.md §9, this replaces the
//! source's busy-retry-on-`EAGAIN` loop with a real readiness wait:
//! [`platform::poll::PollSet`] blocks until one of the two descriptors has
//! bytes, retrying only on `EINTR`.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

use platform::nonblocking::set_nonblocking;
use platform::poll::{Interest, PollSet};
use protocol::mb::{peek_total_size, HEADER_LEN};
use protocol::MbWire;

use crate::block::Side;
use crate::NegotiateError;

/// The two descriptors a tool negotiates over.
pub struct RingIo {
    input: OwnedFd,
    output: OwnedFd,
}

impl RingIo {
    /// Wraps the tool's two negotiation descriptors, switching both to
    /// non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::Platform`] if either descriptor cannot be
    /// switched to non-blocking mode.
    pub fn new(input: OwnedFd, output: OwnedFd) -> Result<Self, NegotiateError> {
        set_nonblocking(input.as_fd())?;
        set_nonblocking(output.as_fd())?;
        Ok(Self { input, output })
    }

    /// Reclaims the two descriptors this ring was built from, once
    /// negotiation is over and they are about to become data channels.
    #[must_use]
    pub fn into_fds(self) -> (OwnedFd, OwnedFd) {
        (self.input, self.output)
    }

    fn fd(&self, side: Side) -> BorrowedFd<'_> {
        match side {
            Side::Input => self.input.as_fd(),
            Side::Output => self.output.as_fd(),
        }
    }

    /// Blocks until either descriptor is readable, returning which side
    /// produced bytes first (spec.md: "reads again from whichever side
    /// produces bytes first").
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::Platform`] if `poll(2)` fails, or
    /// [`NegotiateError::UnexpectedEof`] if a descriptor hung up.
    pub fn wait_readable(&self) -> Result<Side, NegotiateError> {
        let mut set = PollSet::new();
        let input_index = set.register(self.input.as_raw_fd(), Interest::Readable);
        let output_index = set.register(self.output.as_raw_fd(), Interest::Readable);

        loop {
            let readiness = set.wait(None)?;
            for entry in &readiness {
                if entry.hung_up && !entry.ready {
                    return Err(NegotiateError::UnexpectedEof);
                }
                if entry.ready {
                    if entry.index == input_index {
                        return Ok(Side::Input);
                    }
                    if entry.index == output_index {
                        return Ok(Side::Output);
                    }
                }
            }
        }
    }

    /// Reads one complete message block from `side`.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::UnexpectedEof`] on EOF mid-message,
    /// [`NegotiateError::Decode`] if the bytes fail to parse, and
    /// [`NegotiateError::Io`] / [`NegotiateError::Platform`] on I/O or
    /// poll failures.
    pub fn read_mb(&self, side: Side) -> Result<MbWire, NegotiateError> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact_blocking(side, &mut header)?;
        let total = peek_total_size(&header) as usize;
        if total < HEADER_LEN {
            return Err(NegotiateError::Decode(
                protocol::MbDecodeError::SizeMismatch {
                    declared: total as u32,
                    actual: HEADER_LEN,
                },
            ));
        }
        let mut rest = vec![0u8; total - HEADER_LEN];
        self.read_exact_blocking(side, &mut rest)?;

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&rest);
        Ok(MbWire::decode(&bytes)?)
    }

    /// Writes one complete message block to `side`.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::Io`] / [`NegotiateError::Platform`] on
    /// I/O or poll failures, or [`NegotiateError::UnexpectedEof`] if the
    /// peer closed its end mid-write.
    pub fn write_mb(&self, side: Side, mb: &MbWire) -> Result<(), NegotiateError> {
        let bytes = mb.encode();
        self.write_all_blocking(side, &bytes)
    }

    fn read_exact_blocking(&self, side: Side, buf: &mut [u8]) -> Result<(), NegotiateError> {
        let mut filled = 0;
        while filled < buf.len() {
            match nix::unistd::read(self.fd(side).as_raw_fd(), &mut buf[filled..]) {
                Ok(0) => return Err(NegotiateError::UnexpectedEof),
                Ok(n) => filled += n,
                Err(nix::Error::EAGAIN) => {
                    self.wait_one_readable(side)?;
                }
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(NegotiateError::Io(std::io::Error::from_raw_os_error(err as i32))),
            }
        }
        Ok(())
    }

    fn write_all_blocking(&self, side: Side, buf: &[u8]) -> Result<(), NegotiateError> {
        let mut written = 0;
        while written < buf.len() {
            match nix::unistd::write(self.fd(side), &buf[written..]) {
                Ok(0) => return Err(NegotiateError::UnexpectedEof),
                Ok(n) => written += n,
                Err(nix::Error::EAGAIN) => {
                    self.wait_one_writable(side)?;
                }
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(NegotiateError::Io(std::io::Error::from_raw_os_error(err as i32))),
            }
        }
        Ok(())
    }

    fn wait_one_readable(&self, side: Side) -> Result<(), NegotiateError> {
        let mut set = PollSet::new();
        set.register(self.fd(side).as_raw_fd(), Interest::Readable);
        loop {
            let readiness = set.wait(None)?;
            if !readiness.is_empty() {
                return Ok(());
            }
        }
    }

    fn wait_one_writable(&self, side: Side) -> Result<(), NegotiateError> {
        let mut set = PollSet::new();
        set.register(self.fd(side).as_raw_fd(), Interest::Writable);
        loop {
            let readiness = set.wait(None)?;
            if !readiness.is_empty() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::mb::State;

    #[test]
    fn writes_and_reads_a_message_block_round_trip() {
        let (read_a, write_a) = nix::unistd::pipe().expect("pipe");
        let (read_b, write_b) = nix::unistd::pipe().expect("pipe");
        let writer = RingIo::new(read_a, write_b).expect("writer ring");
        let reader = RingIo::new(read_b, write_a).expect("reader ring");

        let mb = MbWire {
            protocol_version: 1,
            initiator_pid: 17,
            state: State::Negotiating,
            serial_no: 0,
            origin: None,
            nodes: vec![],
            edges: vec![],
        };
        writer.write_mb(Side::Output, &mb).expect("write_mb");
        let decoded = reader.read_mb(Side::Input).expect("read_mb");
        assert_eq!(decoded, mb);
    }
}
