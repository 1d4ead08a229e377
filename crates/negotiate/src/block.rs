//! The in-memory message block (spec.md §3): the owned [`Graph`] plus the
//! metadata that drives competition and termination detection.

use protocol::mb::{EdgeRecord, MbWire, NodeRecord, State as WireState};
use protocol::mb::Side as WireSide;

use crate::graph::Graph;

/// Which stdio side an MB arrived on or was forwarded from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// The tool's graph-in descriptor.
    Input,
    /// The tool's graph-out descriptor.
    Output,
}

impl Side {
    /// The side opposite to `self`.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl From<Side> for WireSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Input => Self::Input,
            Side::Output => Self::Output,
        }
    }
}

impl From<WireSide> for Side {
    fn from(side: WireSide) -> Self {
        match side {
            WireSide::Input => Self::Input,
            WireSide::Output => Self::Output,
        }
    }
}

/// The message block's negotiation state (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NegotiationState {
    /// The ring is still converging.
    Negotiating,
    /// Termination was detected; one more full round is circulating so
    /// every participant learns of it.
    End,
    /// A participant hit a fatal error.
    Error,
}

impl From<NegotiationState> for WireState {
    fn from(state: NegotiationState) -> Self {
        match state {
            NegotiationState::Negotiating => Self::Negotiating,
            NegotiationState::End => Self::End,
            NegotiationState::Error => Self::Error,
        }
    }
}

impl From<WireState> for NegotiationState {
    fn from(state: WireState) -> Self {
        match state {
            WireState::Negotiating => Self::Negotiating,
            WireState::End => Self::End,
            WireState::Error => Self::Error,
        }
    }
}

/// The single object that circulates around the ring (spec.md §3).
#[derive(Clone, Debug, PartialEq)]
pub struct Mb {
    /// The pid of the tool that created this MB identity; the lowest pid
    /// among all nodes ever considered `chosen` wins (spec.md §4.1).
    pub initiator_pid: i32,
    /// Negotiation state.
    pub state: NegotiationState,
    /// Monotonically increasing; bumped on any structural change.
    pub serial_no: u64,
    /// Index and side of the node that most recently forwarded this MB.
    pub origin: Option<(usize, Side)>,
    /// The graph accumulated so far.
    pub graph: Graph,
}

const PROTOCOL_VERSION: u32 = 1;

impl Mb {
    /// Constructs a fresh MB naming `initiator_pid` as both the initiator
    /// and the MB's only (soon-to-be-added) node.
    #[must_use]
    pub fn new(initiator_pid: i32) -> Self {
        Self {
            initiator_pid,
            state: NegotiationState::Negotiating,
            serial_no: 0,
            origin: None,
            graph: Graph::new(),
        }
    }

    /// Converts to the wire representation for transmission.
    #[must_use]
    pub fn to_wire(&self) -> MbWire {
        MbWire {
            protocol_version: PROTOCOL_VERSION,
            initiator_pid: self.initiator_pid,
            state: self.state.into(),
            serial_no: self.serial_no,
            origin: self
                .origin
                .map(|(index, side)| (index as u32, side.into())),
            nodes: self.graph.nodes.iter().map(NodeRecord::from).collect(),
            edges: self.graph.edges.iter().copied().map(EdgeRecord::from).collect(),
        }
    }

    /// Reconstructs an `Mb` from its wire representation.
    #[must_use]
    pub fn from_wire(wire: MbWire) -> Self {
        Self {
            initiator_pid: wire.initiator_pid,
            state: wire.state.into(),
            serial_no: wire.serial_no,
            origin: wire
                .origin
                .map(|(index, side)| (index as usize, side.into())),
            graph: Graph {
                nodes: wire.nodes.into_iter().map(Into::into).collect(),
                edges: wire.edges.into_iter().map(Into::into).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn round_trips_through_the_wire() {
        let mut mb = Mb::new(17);
        mb.graph.push_node(Node {
            pid: 17,
            name: "tee".into(),
            requires_channels: 1,
            provides_channels: 1,
            is_graph_in: true,
            is_graph_out: true,
        });
        mb.origin = Some((0, Side::Output));
        mb.serial_no = 2;

        let wire = mb.to_wire();
        let bytes = wire.encode();
        let decoded = protocol::MbWire::decode(&bytes).expect("decode");
        let round_tripped = Mb::from_wire(decoded);

        assert_eq!(round_tripped, mb);
    }

    #[test]
    fn opposite_side_is_involutive() {
        assert_eq!(Side::Input.opposite(), Side::Output);
        assert_eq!(Side::Output.opposite(), Side::Input);
        assert_eq!(Side::Input.opposite().opposite(), Side::Input);
    }
}
