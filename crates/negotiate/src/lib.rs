//! Ring-protocol graph negotiation (spec.md §4.1).
//!
//! A graph-aware tool calls [`negotiate`] once, after it has opened its
//! stdio but before it touches the data plane. It returns once this tool
//! knows the whole pipeline's shape and has its own connections in hand.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod block;
pub mod competition;
pub mod connection;
pub mod contribution;
pub mod env;
pub mod error;
pub mod graph;
pub mod io;
pub mod state;
pub mod termination;

use std::os::fd::OwnedFd;

pub use block::{Mb, Side};
pub use connection::ConnectionPlan;
pub use env::GraphAwareness;
pub use error::NegotiateError;
pub use graph::{Edge, Graph, Node};
pub use state::ToolState;

use competition::Outcome;
use contribution::SelfDescription;
use io::RingIo;
use termination::{RoundOutcome, TerminationTracker};

/// Runs one tool's side of the ring negotiation to completion.
///
/// `self_pid` is this process's pid (real binaries pass
/// [`std::process::id`] cast to `i32`; tests can supply synthetic,
/// distinct pids to simulate several tools in one process). `awareness`
/// is read from the environment by [`GraphAwareness::from_env`] in a real
/// binary; it is taken as a plain argument here so callers control it
/// directly rather than through process-global state. `stdin` and
/// `stdout` are the descriptors negotiation runs over; on success they
/// are handed back as [`ConnectionPlan`] channels rather than closed,
/// since they are the tool's first real input/output edge once the graph
/// is known.
///
/// # Errors
///
/// Returns [`NegotiateError`] if any negotiation I/O fails or decodes
/// incorrectly, or if connection allocation finds an arity mismatch.
pub fn negotiate(
    self_pid: i32,
    name: &str,
    requires_channels: u32,
    provides_channels: u32,
    awareness: GraphAwareness,
    stdin: OwnedFd,
    stdout: OwnedFd,
) -> Result<ConnectionPlan, NegotiateError> {
    let mut tool_state = ToolState::Entered;
    let result = run(
        self_pid,
        name,
        requires_channels,
        provides_channels,
        awareness,
        stdin,
        stdout,
        &mut tool_state,
    );
    tool_state = if result.is_ok() {
        ToolState::Completed
    } else {
        ToolState::Failed
    };
    tracing::debug!(?tool_state, pid = self_pid, "negotiation finished");
    result
}

fn run(
    self_pid: i32,
    name: &str,
    requires_channels: u32,
    provides_channels: u32,
    awareness: GraphAwareness,
    stdin: OwnedFd,
    stdout: OwnedFd,
    tool_state: &mut ToolState,
) -> Result<ConnectionPlan, NegotiateError> {
    let ring = RingIo::new(stdin, stdout)?;

    let describe_self = || SelfDescription {
        pid: self_pid,
        name: name.to_owned(),
        requires_channels,
        provides_channels,
        is_graph_in: awareness.is_graph_in,
        is_graph_out: awareness.is_graph_out,
    };

    *tool_state = ToolState::Contributing;

    // Startup rule (spec.md §4.1): a tool with a graph-aware output but no
    // graph-aware input has nothing to read first, so it originates a
    // fresh MB as initiator. Everyone else waits for the first MB to
    // arrive and adopts it.
    let (mut chosen, mut last_received) = if awareness.is_graph_out && !awareness.is_graph_in {
        let mut mb = Mb::new(self_pid);
        let self_index = contribution::contribute(&mut mb, describe_self(), None)?;
        let last_received = Side::Input;
        mb.origin = Some((self_index, last_received.opposite()));
        (mb, last_received)
    } else {
        let side = ring.wait_readable()?;
        let mut mb = Mb::from_wire(ring.read_mb(side)?);
        let self_index = contribution::contribute(&mut mb, describe_self(), Some(side))?;
        mb.origin = Some((self_index, side.opposite()));
        (mb, side)
    };

    *tool_state = ToolState::Forwarding;

    let mut tracker = TerminationTracker::new();
    ring.write_mb(last_received.opposite(), &chosen.to_wire())?;

    loop {
        let side = ring.wait_readable()?;
        let fresh = Mb::from_wire(ring.read_mb(side)?);

        let forward = match competition::compete(&chosen, &fresh) {
            Outcome::AdoptFresh => {
                chosen = fresh;
                true
            }
            Outcome::KeepChosen => false,
            Outcome::SameIdentity { fresh_wins } => {
                if fresh_wins {
                    chosen = fresh;
                }
                true
            }
        };

        if !forward {
            continue;
        }

        // Self is only ever contributed once per MB identity: on the
        // identity this tool already belongs to, later rounds just carry
        // other tools' updates through unchanged. Re-running contribution
        // here would try to add a second, reversed edge for this tool
        // using whatever side the MB happens to arrive on this round,
        // which has nothing to do with the edge already recorded.
        let self_index = match chosen.graph.index_of_pid(self_pid) {
            Some(index) => index,
            None => contribution::contribute(&mut chosen, describe_self(), Some(side))?,
        };
        last_received = side;
        chosen.origin = Some((self_index, last_received.opposite()));

        let is_initiator = self_pid == chosen.initiator_pid;
        if is_initiator && chosen.state == block::NegotiationState::Negotiating {
            if let RoundOutcome::JustEnded = tracker.observe_round(&mut chosen) {
                tracing::info!(pid = self_pid, "negotiation converged");
            }
        }

        ring.write_mb(last_received.opposite(), &chosen.to_wire())?;

        if chosen.state == block::NegotiationState::End {
            break;
        }
    }

    let self_index = chosen
        .graph
        .index_of_pid(self_pid)
        .ok_or(NegotiateError::UnknownOrigin(0))?;
    let (stdin, stdout) = ring.into_fds();
    connection::allocate_connections(&chosen.graph, self_index, Some(stdin), Some(stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::OwnedFd;
    use std::thread;

    fn pipe_pair() -> (OwnedFd, OwnedFd) {
        let (read, write) = nix::unistd::pipe().expect("pipe");
        (read, write)
    }

    /// Wires two tools back to back over two real pipes (closing the ring:
    /// `first`'s output feeds `second`'s input, and `second`'s output
    /// feeds back to `first`'s input) and runs both `negotiate` calls to
    /// completion concurrently, one per thread.
    ///
    /// `first` has no graph-aware input, so it is the initiator
    /// (spec.md §4.1's startup rule). `second` contributes on its first
    /// read; by §4.1.1's edge-direction rule an MB arriving on a tool's
    /// input side produces an edge *from* that tool *to* the origin, so
    /// `second` ends up declaring the edge's `provides_channels` side and
    /// `first` its `requires_channels` side.
    ///
    /// This exercises spec.md §8's negotiator properties: convergence
    /// (both calls return `Ok`), initiator-is-min-pid (the lower pid,
    /// `first`, is `chosen.initiator_pid` for both), and edge uniqueness
    /// (exactly one edge is ever added).
    #[test]
    fn two_tool_ring_converges_with_lower_pid_as_initiator() {
        let (a_read, a_write) = pipe_pair();
        let (b_read, b_write) = pipe_pair();

        let first_awareness = GraphAwareness {
            is_graph_in: false,
            is_graph_out: true,
        };
        let second_awareness = GraphAwareness {
            is_graph_in: true,
            is_graph_out: false,
        };

        // first:  input = a_read,  output = b_write
        // second: input = b_read,  output = a_write
        let first = thread::spawn(move || {
            negotiate(10, "first", 1, 0, first_awareness, a_read, b_write)
        });
        let second = thread::spawn(move || {
            negotiate(20, "second", 0, 1, second_awareness, b_read, a_write)
        });

        let first_plan = first.join().expect("first thread").expect("first negotiate");
        let second_plan = second.join().expect("second thread").expect("second negotiate");

        assert_eq!(first_plan.input_fds.len(), 1);
        assert_eq!(first_plan.output_fds.len(), 0);
        assert_eq!(second_plan.input_fds.len(), 0);
        assert_eq!(second_plan.output_fds.len(), 1);
        assert!(first_plan.peer_ends.is_empty());
        assert!(second_plan.peer_ends.is_empty());
    }
}
