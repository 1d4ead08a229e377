#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(unix)]

//! # Overview
//!
//! The only crate in this workspace allowed to contain `unsafe`. Every raw
//! `libc`/`nix` call the negotiator and the store need — switching a
//! descriptor to non-blocking mode, waiting on a set of descriptors with
//! `poll(2)`, and allocating a close-on-exec pipe for a graph edge — lives
//! here behind a safe API, the same way the rest of the workspace keeps
//! `#![deny(unsafe_code)]` and reaches into a dedicated platform crate for
//! the few spots that genuinely need raw descriptors.
//!
//! # Invariants
//!
//! - Every descriptor this crate hands out is marked close-on-exec unless a
//!   caller explicitly asks otherwise (negotiator edges are handed to a
//!   child process across `exec`, so the *opposite* end close-on-exec flag
//!   is cleared right before the handoff — see [`pipe::Pipe::into_inheritable_read`]
//!   and [`pipe::Pipe::into_inheritable_write`]).
//! - [`poll::PollSet`] never silently drops a registered descriptor; a
//!   caller removes one explicitly with [`poll::PollSet::remove`].

/// Non-blocking mode and close-on-exec helpers for raw descriptors.
pub mod nonblocking;
/// `poll(2)` wrapper used by both the negotiator's ring wait and the
/// store's event loop.
pub mod poll;
/// Pipe allocation for negotiator connection edges.
pub mod pipe;

pub use nonblocking::PlatformError;
