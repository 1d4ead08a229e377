//! Negotiator error taxonomy (spec.md §7): configuration, I/O, protocol
//! and allocation failures all bubble straight up to
//! [`crate::negotiate`]'s return value — there is no in-protocol NACK, so
//! any of these simply makes this tool leave the ring.

use crate::block::Side;

/// Everything that can make a tool's negotiation attempt fail.
#[derive(Debug, thiserror::Error)]
pub enum NegotiateError {
    /// `is_graph_in` / `is_graph_out` was absent from the environment.
    #[error("environment variable {0} is not set")]
    MissingEnvVar(&'static str),
    /// `is_graph_in` / `is_graph_out` was set but not a valid integer.
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnvVar {
        /// The variable's name.
        name: &'static str,
        /// The value that failed to parse.
        value: String,
    },
    /// The MB's origin index did not refer to an existing node — a proper
    /// bounded scan (spec.md §9's fix for the source's missing `i <`
    /// bound) caught it instead of reading out of bounds.
    #[error("message block origin refers to nonexistent node {0}")]
    UnknownOrigin(usize),
    /// A contribution's inferred edge direction disagreed with the
    /// node's declared `is_graph_in` / `is_graph_out`.
    #[error("node {node_index} received the message block on its {side:?} side, which it did not declare graph-aware")]
    DirectionMismatch {
        /// The contributing node's index.
        node_index: usize,
        /// The side the mismatch was observed on.
        side: Side,
    },
    /// [`crate::contribution::contribute`] was called with an MB that has
    /// an origin but no `arrived_on` side to infer direction from.
    #[error("message block has an origin but no arrival side was given")]
    MissingArrivalSide,
    /// Connection allocation found an in-degree or out-degree that did
    /// not match the node's declared arity (spec.md §4.1's "Assert their
    /// counts equal").
    #[error(
        "node {node_index} has {actual_in} incoming / {actual_out} outgoing edges, \
         expected {expected_in} / {expected_out}"
    )]
    ArityMismatch {
        /// The node whose arity failed to match.
        node_index: usize,
        /// Declared input arity.
        expected_in: u32,
        /// Observed in-degree.
        actual_in: usize,
        /// Declared output arity.
        expected_out: u32,
        /// Observed out-degree.
        actual_out: usize,
    },
    /// A read or write on a negotiation descriptor failed for a reason
    /// other than would-block or interrupted.
    #[error("negotiation I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A platform-layer call (poll, pipe, fcntl) failed.
    #[error(transparent)]
    Platform(#[from] platform::PlatformError),
    /// A received message block failed to decode.
    #[error(transparent)]
    Decode(#[from] protocol::MbDecodeError),
    /// The peer closed its descriptor mid-message.
    #[error("peer closed the negotiation descriptor before a complete message block arrived")]
    UnexpectedEof,
}
