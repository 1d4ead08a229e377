//! Contribution and edge-direction inference (spec.md §4.1, §4.1.1).

use crate::block::{Mb, Side};
use crate::graph::Node;
use crate::NegotiateError;

/// This tool's declared identity, supplied by its caller.
#[derive(Clone, Debug)]
pub struct SelfDescription {
    /// This process's pid.
    pub pid: i32,
    /// Human-readable name (truncated to
    /// [`protocol::mb::MAX_NAME_LEN`] bytes if longer).
    pub name: String,
    /// Declared input arity.
    pub requires_channels: u32,
    /// Declared output arity.
    pub provides_channels: u32,
    /// Whether this tool's input side is graph-aware.
    pub is_graph_in: bool,
    /// Whether this tool's output side is graph-aware.
    pub is_graph_out: bool,
}

impl SelfDescription {
    fn into_node(self) -> Node {
        let mut name = self.name;
        name.truncate(protocol::mb::MAX_NAME_LEN);
        Node {
            pid: self.pid,
            name,
            requires_channels: self.requires_channels,
            provides_channels: self.provides_channels,
            is_graph_in: self.is_graph_in,
            is_graph_out: self.is_graph_out,
        }
    }
}

/// Adds `self_description` as a node (if not already present by pid) and
/// an edge to the MB's current origin, inferring direction from
/// `arrived_on` (spec.md §4.1, §4.1.1).
///
/// Returns this tool's node index. `arrived_on` is `None` for the
/// initiator's first contribution, which has no origin to connect to yet.
///
/// # Errors
///
/// Returns [`NegotiateError::DirectionMismatch`] if the inferred edge
/// direction disagrees with the node's declared `is_graph_in` /
/// `is_graph_out`, and [`NegotiateError::UnknownOrigin`] if the MB names
/// an origin index outside its own node array.
pub fn contribute(
    mb: &mut Mb,
    self_description: SelfDescription,
    arrived_on: Option<Side>,
) -> Result<usize, NegotiateError> {
    let pid = self_description.pid;
    let self_index = match mb.graph.index_of_pid(pid) {
        Some(index) => index,
        None => {
            let index = mb.graph.push_node(self_description.into_node());
            mb.serial_no += 1;
            index
        }
    };

    if let Some((origin_index, _)) = mb.origin {
        mb.graph
            .node(origin_index)
            .ok_or(NegotiateError::UnknownOrigin(origin_index))?;

        let arrived_on = arrived_on.ok_or(NegotiateError::MissingArrivalSide)?;
        let (from, to) = match arrived_on {
            Side::Input => (self_index, origin_index),
            Side::Output => (origin_index, self_index),
        };

        let declared_ok = match arrived_on {
            Side::Input => mb.graph.node(self_index).is_some_and(|n| n.is_graph_in),
            Side::Output => mb.graph.node(self_index).is_some_and(|n| n.is_graph_out),
        };
        if !declared_ok {
            return Err(NegotiateError::DirectionMismatch {
                node_index: self_index,
                side: arrived_on,
            });
        }

        if mb.graph.push_edge(from, to) {
            mb.serial_no += 1;
        }
    }

    Ok(self_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(pid: i32) -> SelfDescription {
        SelfDescription {
            pid,
            name: format!("tool{pid}"),
            requires_channels: 1,
            provides_channels: 1,
            is_graph_in: true,
            is_graph_out: true,
        }
    }

    #[test]
    fn first_contribution_adds_a_node_with_no_edge() {
        let mut mb = Mb::new(17);
        let index = contribute(&mut mb, describe(17), None).expect("contribute");
        assert_eq!(index, 0);
        assert_eq!(mb.graph.nodes.len(), 1);
        assert!(mb.graph.edges.is_empty());
        assert_eq!(mb.serial_no, 1);
    }

    #[test]
    fn second_contribution_adds_an_edge_to_the_origin() {
        let mut mb = Mb::new(17);
        let origin_index = contribute(&mut mb, describe(17), None).expect("contribute");
        mb.origin = Some((origin_index, Side::Output));

        let self_index = contribute(&mut mb, describe(30), Some(Side::Input)).expect("contribute");
        assert_eq!(mb.graph.edges.len(), 1);
        assert_eq!(mb.graph.edges[0].from, self_index);
        assert_eq!(mb.graph.edges[0].to, origin_index);
    }

    #[test]
    fn repeated_contribution_by_same_pid_does_not_duplicate_the_node() {
        let mut mb = Mb::new(17);
        let first = contribute(&mut mb, describe(17), None).expect("contribute");
        let second = contribute(&mut mb, describe(17), None).expect("contribute");
        assert_eq!(first, second);
        assert_eq!(mb.graph.nodes.len(), 1);
    }

    #[test]
    fn direction_mismatch_is_rejected() {
        let mut mb = Mb::new(17);
        let origin_index = contribute(&mut mb, describe(17), None).expect("contribute");
        mb.origin = Some((origin_index, Side::Output));

        let mut not_graph_in = describe(30);
        not_graph_in.is_graph_in = false;
        let err = contribute(&mut mb, not_graph_in, Some(Side::Input)).unwrap_err();
        assert!(matches!(err, NegotiateError::DirectionMismatch { .. }));
    }
}
