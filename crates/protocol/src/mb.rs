//! The negotiator's message-block (MB) wire format.
//!
//! Per spec.md §3 and §9, an MB is one self-contained byte region: a fixed
//! header, then one record per node, then one record per edge, all in
//! native byte order (this is a local-machine protocol; cross-arch
//! interchange is explicitly a non-goal). `total_size` is authoritative —
//! a reader trusts it, not the number of bytes a `read(2)` happened to
//! return, and treats a short read as [`MbDecodeError::UnexpectedEof`].
//!
//! This module only knows about bytes. The in-memory graph
//! (`crates/negotiate`'s `Graph`, with owned `Vec<Node>`/`Vec<Edge>` and
//! genuine value semantics) converts to and from [`MbWire`] at its
//! read/write boundary; nothing here ever holds a pointer into the other.

use std::fmt;

/// Maximum encoded length of a node's name, in bytes (spec.md §3).
pub const MAX_NAME_LEN: usize = 100;

/// Length, in bytes, of the fixed portion of the wire format that precedes
/// the node and edge records: protocol_version, initiator_pid, state,
/// serial_no, origin (index + side), node_count, edge_count, total_size.
///
/// A transport reads exactly this many bytes first, reads `total_size`
/// (the header's last field) out of them with [`peek_total_size`], then
/// reads the remaining `total_size - HEADER_LEN` bytes before calling
/// [`MbWire::decode`] on the whole buffer.
pub const HEADER_LEN: usize = 4 + 4 + 1 + 8 + 4 + 1 + 4 + 4 + 4;

/// Reads the `total_size` field out of a complete, just-received header,
/// without decoding the rest of the message block.
///
/// # Panics
///
/// Panics if `header.len() != HEADER_LEN`; callers are expected to have
/// just read exactly that many bytes.
#[must_use]
pub fn peek_total_size(header: &[u8]) -> u32 {
    assert_eq!(header.len(), HEADER_LEN, "expected exactly HEADER_LEN bytes");
    let bytes: [u8; 4] = header[HEADER_LEN - 4..].try_into().expect("length checked");
    u32::from_ne_bytes(bytes)
}

/// The MB's negotiation state (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum State {
    /// The ring is still converging.
    Negotiating = 0,
    /// Termination was detected; one more full round is circulating.
    End = 1,
    /// A participant hit a fatal error.
    Error = 2,
}

impl State {
    fn from_u8(value: u8) -> Result<Self, MbDecodeError> {
        match value {
            0 => Ok(Self::Negotiating),
            1 => Ok(Self::End),
            2 => Ok(Self::Error),
            other => Err(MbDecodeError::InvalidState(other)),
        }
    }
}

/// Which stdio side an MB most recently arrived on or was forwarded from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Side {
    /// The tool's graph-in descriptor.
    Input = 0,
    /// The tool's graph-out descriptor.
    Output = 1,
}

impl Side {
    fn from_u8(value: u8) -> Result<Self, MbDecodeError> {
        match value {
            0 => Ok(Self::Input),
            1 => Ok(Self::Output),
            other => Err(MbDecodeError::InvalidSide(other)),
        }
    }
}

/// One node record: a graph-aware tool that has contributed itself.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeRecord {
    /// The tool's process id.
    pub pid: i32,
    /// Human-readable name, at most [`MAX_NAME_LEN`] bytes.
    pub name: String,
    /// Declared input arity.
    pub requires_channels: u32,
    /// Declared output arity.
    pub provides_channels: u32,
    /// Whether the tool's input side is graph-aware.
    pub is_graph_in: bool,
    /// Whether the tool's output side is graph-aware.
    pub is_graph_out: bool,
}

/// One directed edge record, identified by node-array indices.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EdgeRecord {
    /// Index of the upstream node.
    pub from: u32,
    /// Index of the downstream node.
    pub to: u32,
}

/// The decoded wire representation of one MB.
#[derive(Clone, Debug, PartialEq)]
pub struct MbWire {
    /// Wire format version; bumped only if this layout changes.
    pub protocol_version: u32,
    /// The pid of the tool that created this MB identity (lowest pid wins,
    /// spec.md §4.1).
    pub initiator_pid: i32,
    /// Negotiation state.
    pub state: State,
    /// Monotonically increasing; bumped on any structural change.
    pub serial_no: u64,
    /// Index and side of the node that most recently forwarded this MB,
    /// `None` before the first forward.
    pub origin: Option<(u32, Side)>,
    /// Contributed nodes, in contribution order.
    pub nodes: Vec<NodeRecord>,
    /// Contributed edges, in contribution order.
    pub edges: Vec<EdgeRecord>,
}

/// Failures decoding an [`MbWire`] from bytes.
#[derive(Debug, thiserror::Error)]
pub enum MbDecodeError {
    /// The buffer ended before a complete header or record could be read.
    #[error("message block truncated")]
    UnexpectedEof,
    /// `total_size` in the header did not match the buffer's length.
    #[error("declared total_size {declared} does not match {actual} bytes read")]
    SizeMismatch {
        /// The header's `total_size` field.
        declared: u32,
        /// The number of bytes actually available.
        actual: usize,
    },
    /// A node name exceeded [`MAX_NAME_LEN`].
    #[error("node name exceeds {MAX_NAME_LEN} bytes")]
    NameTooLong,
    /// The name bytes were not valid UTF-8.
    #[error("node name is not valid UTF-8")]
    InvalidName,
    /// An unrecognized [`State`] discriminant.
    #[error("invalid state byte {0}")]
    InvalidState(u8),
    /// An unrecognized [`Side`] discriminant.
    #[error("invalid origin side byte {0}")]
    InvalidSide(u8),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Negotiating => "negotiating",
            Self::End => "end",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MbDecodeError> {
        let end = self.pos.checked_add(len).ok_or(MbDecodeError::UnexpectedEof)?;
        let slice = self.buf.get(self.pos..end).ok_or(MbDecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, MbDecodeError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
        Ok(u32::from_ne_bytes(bytes))
    }

    fn i32(&mut self) -> Result<i32, MbDecodeError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
        Ok(i32::from_ne_bytes(bytes))
    }

    fn u64(&mut self) -> Result<u64, MbDecodeError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("length checked");
        Ok(u64::from_ne_bytes(bytes))
    }

    fn u8(&mut self) -> Result<u8, MbDecodeError> {
        Ok(self.take(1)?[0])
    }
}

impl MbWire {
    /// Encodes the message block to its wire representation, with
    /// `total_size` filled in from the actual encoded length.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.put_u32(self.protocol_version);
        writer.put_i32(self.initiator_pid);
        writer.put_u8(self.state as u8);
        writer.put_u64(self.serial_no);
        match self.origin {
            Some((index, side)) => {
                writer.put_i32(i32::try_from(index).unwrap_or(i32::MAX));
                writer.put_u8(side as u8);
            }
            None => {
                writer.put_i32(-1);
                writer.put_u8(0);
            }
        }
        writer.put_u32(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        writer.put_u32(u32::try_from(self.edges.len()).unwrap_or(u32::MAX));
        let total_size_offset = writer.buf.len();
        // total_size placeholder, patched below.
        writer.put_u32(0);

        for node in &self.nodes {
            writer.put_i32(node.pid);
            writer.put_u8(u8::try_from(node.name.len()).unwrap_or(0));
            writer.put_bytes(node.name.as_bytes());
            writer.put_u32(node.requires_channels);
            writer.put_u32(node.provides_channels);
            writer.put_u8(u8::from(node.is_graph_in));
            writer.put_u8(u8::from(node.is_graph_out));
        }
        for edge in &self.edges {
            writer.put_u32(edge.from);
            writer.put_u32(edge.to);
        }

        let total = writer.buf.len();
        let total_bytes = u32::try_from(total).unwrap_or(u32::MAX).to_ne_bytes();
        writer.buf[total_size_offset..total_size_offset + 4].copy_from_slice(&total_bytes);
        writer.buf
    }

    /// Decodes a message block from `bytes`, which must be exactly the
    /// encoded length (no trailing garbage, no truncation).
    ///
    /// # Errors
    ///
    /// Returns [`MbDecodeError`] if the header is incomplete, a record is
    /// truncated, or the header's `total_size` disagrees with `bytes.len()`.
    pub fn decode(bytes: &[u8]) -> Result<Self, MbDecodeError> {
        let mut reader = Reader::new(bytes);
        let protocol_version = reader.u32()?;
        let initiator_pid = reader.i32()?;
        let state = State::from_u8(reader.u8()?)?;
        let serial_no = reader.u64()?;
        let origin_index = reader.i32()?;
        let origin_side = reader.u8()?;
        let origin = if origin_index < 0 {
            None
        } else {
            Some((origin_index as u32, Side::from_u8(origin_side)?))
        };
        let node_count = reader.u32()? as usize;
        let edge_count = reader.u32()? as usize;
        let total_size = reader.u32()?;

        if total_size as usize != bytes.len() {
            return Err(MbDecodeError::SizeMismatch {
                declared: total_size,
                actual: bytes.len(),
            });
        }

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let pid = reader.i32()?;
            let name_len = reader.u8()? as usize;
            if name_len > MAX_NAME_LEN {
                return Err(MbDecodeError::NameTooLong);
            }
            let name_bytes = reader.take(name_len)?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| MbDecodeError::InvalidName)?
                .to_owned();
            let requires_channels = reader.u32()?;
            let provides_channels = reader.u32()?;
            let is_graph_in = reader.u8()? != 0;
            let is_graph_out = reader.u8()? != 0;
            nodes.push(NodeRecord {
                pid,
                name,
                requires_channels,
                provides_channels,
                is_graph_in,
                is_graph_out,
            });
        }

        let mut edges = Vec::with_capacity(edge_count);
        for _ in 0..edge_count {
            let from = reader.u32()?;
            let to = reader.u32()?;
            edges.push(EdgeRecord { from, to });
        }

        Ok(Self {
            protocol_version,
            initiator_pid,
            state,
            serial_no,
            origin,
            nodes,
            edges,
        })
    }
}
