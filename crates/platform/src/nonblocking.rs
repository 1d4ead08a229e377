//! Non-blocking mode for raw descriptors.

use std::os::fd::BorrowedFd;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};

/// Errors raised by the platform layer's raw descriptor operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// An `fcntl(2)` call failed.
    #[error("fcntl failed: {0}")]
    Fcntl(#[source] nix::Error),
    /// A `pipe2(2)` call failed.
    #[error("pipe creation failed: {0}")]
    Pipe(#[source] nix::Error),
    /// A `poll(2)` call failed.
    #[error("poll failed: {0}")]
    Poll(#[source] nix::Error),
}

/// Switches `fd` to non-blocking mode, leaving other flags untouched.
///
/// # Errors
///
/// Returns [`PlatformError::Fcntl`] if either the `F_GETFL` or `F_SETFL`
/// call fails.
pub fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<(), PlatformError> {
    let current = fcntl(fd, FcntlArg::F_GETFL).map_err(PlatformError::Fcntl)?;
    let flags = OFlag::from_bits_truncate(current) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(PlatformError::Fcntl)?;
    Ok(())
}

/// Sets or clears the close-on-exec flag on `fd`.
///
/// # Errors
///
/// Returns [`PlatformError::Fcntl`] if either the `F_GETFD` or `F_SETFD`
/// call fails.
pub fn set_close_on_exec(fd: BorrowedFd<'_>, close_on_exec: bool) -> Result<(), PlatformError> {
    let current = fcntl(fd, FcntlArg::F_GETFD).map_err(PlatformError::Fcntl)?;
    let mut flags = FdFlag::from_bits_truncate(current);
    flags.set(FdFlag::FD_CLOEXEC, close_on_exec);
    fcntl(fd, FcntlArg::F_SETFD(flags)).map_err(PlatformError::Fcntl)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsFd;

    #[test]
    fn marks_a_pipe_end_nonblocking() {
        let (read, write) = nix::unistd::pipe().expect("pipe");
        set_nonblocking(read.as_fd()).expect("set_nonblocking");
        let flags = fcntl(read.as_fd(), FcntlArg::F_GETFL).expect("F_GETFL");
        assert!(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK));
        drop(write);
    }

    #[test]
    fn toggles_close_on_exec() {
        let (read, write) = nix::unistd::pipe().expect("pipe");
        set_close_on_exec(read.as_fd(), false).expect("clear cloexec");
        let flags = fcntl(read.as_fd(), FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(!FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        drop(write);
    }
}
