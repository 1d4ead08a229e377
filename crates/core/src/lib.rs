#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `core` holds the handful of things both the negotiator and the store
//! need that aren't specific to either: a small [`message`] facade for
//! user-visible diagnostics and the [`exit_code`] table the store's process
//! exit status is drawn from.
//!
//! # Invariants
//!
//! - [`exit_code::ExitCode`] values match spec.md §6 exactly; nothing else
//!   in the workspace should hand-roll a process exit status for the store.
//! - [`message::Message`] never allocates beyond its own text buffer.

/// Exit codes for the `store` binary (spec.md §6).
pub mod exit_code;
/// Shared diagnostic formatting (not a port of upstream rsync's message stack).
pub mod message;
