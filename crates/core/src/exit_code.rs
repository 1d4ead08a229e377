//! Exit codes returned by the `store` binary.
//!
//! These mirror the five codes spec.md §6 assigns to the store CLI. The
//! negotiator has no process of its own — it returns `Result` to its host
//! tool — so only the store needs a numeric mapping.

use std::fmt;
use std::process::ExitCode as ProcessExitCode;

/// Exit codes for the `store` binary, per spec.md §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitCode {
    /// Clean shutdown triggered by a `Q` command (RERR_OK equivalent).
    Ok = 0,
    /// Bad CLI flags or a protocol violation (unknown command byte, short
    /// header write, etc).
    Usage = 1,
    /// The socket path could not be unlinked/bound.
    SocketSetup = 2,
    /// A read or write on the socket or standard input failed.
    SocketIo = 3,
    /// `listen(2)` on the control socket failed.
    Listen = 4,
    /// `accept(2)` on the control socket failed.
    Accept = 5,
}

impl ExitCode {
    /// The raw process exit status.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// A short, stable label used in diagnostics and tests.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Usage => "usage error",
            Self::SocketSetup => "socket setup failure",
            Self::SocketIo => "socket I/O failure",
            Self::Listen => "listen failure",
            Self::Accept => "accept failure",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.as_u8())
    }
}

impl From<ExitCode> for ProcessExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::ExitCode;

    #[test]
    fn codes_match_spec_numbering() {
        assert_eq!(ExitCode::Ok.as_u8(), 0);
        assert_eq!(ExitCode::Usage.as_u8(), 1);
        assert_eq!(ExitCode::SocketSetup.as_u8(), 2);
        assert_eq!(ExitCode::SocketIo.as_u8(), 3);
        assert_eq!(ExitCode::Listen.as_u8(), 4);
        assert_eq!(ExitCode::Accept.as_u8(), 5);
    }
}
