#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Wire formats shared by the negotiator and the store. Two unrelated
//! protocols live here because both are small, native-byte-order,
//! local-machine-only formats with no compression or transport layer of
//! their own:
//!
//! - [`mb`] — the negotiator's message-block wire representation (spec.md
//!   §3, §9): header, node records, edge records, one contiguous region.
//! - [`framing`] — the store's response header (spec.md §4.2.6): ten ASCII
//!   digits, then the payload.
//!
//! # Design
//!
//! Per the Design Note in spec.md §9, the wire representation here is kept
//! separate from any in-memory graph representation — [`mb::MbWire`] is a
//! pure byte-offset view with explicit `encode`/`decode` functions, never a
//! struct with pointer fields. `crates/negotiate` owns the in-memory
//! `Vec<Node>`/`Vec<Edge>` value types and converts to/from [`mb::MbWire`]
//! only at the read/write boundary.

/// The negotiator's message-block wire format.
pub mod mb;
/// The store's length-prefixed response framing.
pub mod framing;
/// Separator-delimited and fixed-length record scanning, shared by the
/// store's buffer queue and its record locator.
pub mod locator;

pub use framing::{FramingError, RESPONSE_HEADER_LEN};
pub use mb::{peek_total_size, EdgeRecord, MbDecodeError, MbWire, NodeRecord, HEADER_LEN};
