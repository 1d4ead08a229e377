//! Pipe allocation for negotiator connection edges.
//!
//! Each resolved [`crate::poll`]-free graph edge becomes one OS pipe: the
//! write end is handed to the edge's `from` tool, the read end to its `to`
//! tool. Both ends start close-on-exec, since the negotiator itself never
//! reads or writes the data plane; [`Pipe::into_inheritable_read`] and
//! [`Pipe::into_inheritable_write`] clear that flag on the one end a given
//! tool keeps, immediately before it execs the next stage of the pipeline.

use std::os::fd::OwnedFd;

use crate::nonblocking::set_close_on_exec;
use crate::PlatformError;

/// One allocated pipe, both ends owned until a caller claims one for
/// inheritance across `exec`.
pub struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    /// Creates a new pipe with both ends close-on-exec.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Pipe`] if `pipe(2)` fails.
    pub fn create() -> Result<Self, PlatformError> {
        use std::os::fd::AsFd;
        let (read, write) = nix::unistd::pipe().map_err(PlatformError::Pipe)?;
        set_close_on_exec(read.as_fd(), true)?;
        set_close_on_exec(write.as_fd(), true)?;
        Ok(Self { read, write })
    }

    /// Consumes the pipe, clearing close-on-exec on the read end and
    /// closing the write end (the read end is the only one this process
    /// will hand to a child across `exec`).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Fcntl`] if clearing close-on-exec fails.
    pub fn into_inheritable_read(self) -> Result<OwnedFd, PlatformError> {
        use std::os::fd::AsFd;
        set_close_on_exec(self.read.as_fd(), false)?;
        drop(self.write);
        Ok(self.read)
    }

    /// Consumes the pipe, clearing close-on-exec on the write end and
    /// closing the read end.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Fcntl`] if clearing close-on-exec fails.
    pub fn into_inheritable_write(self) -> Result<OwnedFd, PlatformError> {
        use std::os::fd::AsFd;
        set_close_on_exec(self.write.as_fd(), false)?;
        drop(self.read);
        Ok(self.write)
    }

    /// Consumes the pipe, returning both ends still close-on-exec.
    ///
    /// Used when the two ends are headed to two different *existing*
    /// processes rather than a child this process is about to `exec` —
    /// the negotiator's own connection allocation, where one end stays in
    /// this process and the other is handed to a peer tool through the
    /// host shell extension's side channel rather than descriptor
    /// inheritance.
    #[must_use]
    pub fn split(self) -> (OwnedFd, OwnedFd) {
        (self.read, self.write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use std::os::fd::AsFd;

    #[test]
    fn both_ends_start_close_on_exec() {
        let pipe = Pipe::create().expect("pipe");
        let read_flags = fcntl(pipe.read.as_fd(), FcntlArg::F_GETFD).expect("F_GETFD");
        let write_flags = fcntl(pipe.write.as_fd(), FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(FdFlag::from_bits_truncate(read_flags).contains(FdFlag::FD_CLOEXEC));
        assert!(FdFlag::from_bits_truncate(write_flags).contains(FdFlag::FD_CLOEXEC));
    }

    #[test]
    fn inheritable_read_clears_cloexec_and_drops_write() {
        let pipe = Pipe::create().expect("pipe");
        let read = pipe.into_inheritable_read().expect("into_inheritable_read");
        let flags = fcntl(read.as_fd(), FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(!FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
    }

    #[test]
    fn inheritable_write_clears_cloexec_and_drops_read() {
        let pipe = Pipe::create().expect("pipe");
        let write = pipe
            .into_inheritable_write()
            .expect("into_inheritable_write");
        let flags = fcntl(write.as_fd(), FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(!FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
    }
}
