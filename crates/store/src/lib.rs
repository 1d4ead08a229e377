#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(unix)]

//! # Overview
//!
//! `store` retains a window of the latest records written to its standard
//! input and serves it to any number of clients connected to a Unix control
//! socket (spec.md §4.2). A client sends a single command byte — `C` for
//! the current window, `L` for the window as of end-of-input, or `Q` to
//! shut the whole process down — and receives a ten-digit length-prefixed
//! response.
//!
//! # Design
//!
//! [`config`] parses the command line into a [`config::RuntimeOptions`].
//! [`buffer`] holds the append-only queue of input chunks with their
//! cumulative record/byte counts; [`locator`] turns a response window into
//! a concrete byte range over that queue. [`client`] is the per-connection
//! state machine and the fixed-size client table. [`server`] drives all of
//! it from one `poll(2)`-based event loop, rebuilt fresh every wakeup.
//!
//! # Invariants
//!
//! - The process is single-threaded; no record is ever mutated once
//!   appended, so a client's in-flight cursor is always safe to read
//!   concurrently with new input arriving.
//! - A generation that has been reclaimed is simply absent from the buffer
//!   queue — there is no dangling reference for a slow client to chase.

/// The append-only input buffer queue.
pub mod buffer;
/// The per-connection state machine and client table.
pub mod client;
/// Command-line configuration.
pub mod config;
/// The store's error taxonomy and exit-code mapping.
pub mod error;
/// Turning a response window into a concrete byte range.
pub mod locator;
/// The `poll(2)`-based event loop.
pub mod server;

use std::ffi::OsString;
use std::io::Write;

use core::exit_code::ExitCode;
use core::message::{Message, Role};

pub use config::RuntimeOptions;
pub use error::StoreError;
pub use server::Server;

/// Parses `args`, runs the store to completion, and writes any fatal
/// diagnostic to `stderr`.
///
/// Returns the process exit code the binary should use (spec.md §6):
/// `Ok` (0) on a clean `Q`-triggered shutdown, otherwise the code
/// [`StoreError::exit_code`] maps the failure to.
pub fn run(args: &[OsString], stderr: &mut impl Write) -> ExitCode {
    match try_run(args) {
        Ok(()) => ExitCode::Ok,
        Err(err) => {
            let code = err.exit_code();
            let message = Message::error(err.to_string()).with_role(Role::Store);
            let _ = writeln!(stderr, "{message}");
            code
        }
    }
}

fn try_run(args: &[OsString]) -> Result<(), StoreError> {
    let options = RuntimeOptions::parse(args)?;
    logging::init(options.verbosity);
    if options.since.is_some() {
        tracing::warn!(
            "{}",
            Message::warning("--since is accepted but has no effect on the served window")
                .with_role(Role::Store)
        );
    }
    let mut server = Server::new(options)?;
    server.run()
}
