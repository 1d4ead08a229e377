//! Store error taxonomy (spec.md §7) and its exit-code mapping (spec.md
//! §6): every fatal path the event loop can take lands in exactly one
//! variant here, and `main` derives its process exit status from
//! [`StoreError::exit_code`] rather than re-deriving it at each call site.

use core::exit_code::ExitCode;

use crate::config::ConfigError;

/// Everything that can end a `store` process before a clean `Q`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bad CLI flags.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The socket path could not be unlinked or bound.
    #[error("failed to set up control socket at {path}: {source}")]
    SocketSetup {
        /// The configured socket path.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `listen(2)` on the control socket failed.
    #[error("listen on control socket failed: {0}")]
    Listen(#[source] std::io::Error),
    /// `accept(2)` on the control socket failed.
    #[error("accept on control socket failed: {0}")]
    Accept(#[source] std::io::Error),
    /// A read or write on standard input or a client socket failed for a
    /// reason other than would-block.
    #[error("socket I/O error: {0}")]
    SocketIo(#[source] std::io::Error),
    /// A platform-layer call (poll, fcntl) failed.
    #[error(transparent)]
    Platform(#[from] platform::PlatformError),
    /// A client sent a byte other than `C`, `L`, or `Q`.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    /// The response header could not be built (spec.md §4.2.6), or a
    /// short write occurred partway through it.
    #[error(transparent)]
    Framing(#[from] protocol::FramingError),
    /// The 64-slot client table was full when the listener had a pending
    /// connection.
    #[error("client table is full; rejecting new connection")]
    ClientTableFull,
}

impl StoreError {
    /// The process exit status this error maps to (spec.md §6).
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::UnknownCommand(_) | Self::Framing(_) => ExitCode::Usage,
            Self::SocketSetup { .. } => ExitCode::SocketSetup,
            Self::SocketIo(_) | Self::Platform(_) | Self::ClientTableFull => ExitCode::SocketIo,
            Self::Listen(_) => ExitCode::Listen,
            Self::Accept(_) => ExitCode::Accept,
        }
    }
}
