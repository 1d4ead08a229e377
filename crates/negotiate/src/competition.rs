//! The competition rule (spec.md §4.1): deciding which of two message
//! blocks survives when a tool is holding one (`chosen`) and reads
//! another (`fresh`).

use crate::block::Mb;

/// The outcome of comparing a freshly read MB against the one a tool is
/// currently holding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// `fresh` has the lower initiator pid: drop `chosen`, adopt `fresh`,
    /// re-contribute, and keep forwarding.
    AdoptFresh,
    /// `chosen` has the lower initiator pid: drop `fresh`; do not forward
    /// this round.
    KeepChosen,
    /// Same initiator pid — this is `chosen` returning around the ring.
    /// Keep whichever has the larger serial number.
    SameIdentity {
        /// Whether `fresh` (rather than `chosen`) has the larger
        /// serial number and should be kept.
        fresh_wins: bool,
    },
}

/// Compares `chosen` against a freshly read `fresh`, per spec.md §4.1's
/// competition rule.
#[must_use]
pub fn compete(chosen: &Mb, fresh: &Mb) -> Outcome {
    match fresh.initiator_pid.cmp(&chosen.initiator_pid) {
        std::cmp::Ordering::Less => Outcome::AdoptFresh,
        std::cmp::Ordering::Greater => Outcome::KeepChosen,
        std::cmp::Ordering::Equal => Outcome::SameIdentity {
            fresh_wins: fresh.serial_no > chosen.serial_no,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_initiator_pid_wins() {
        let chosen = Mb::new(30);
        let fresh = Mb::new(17);
        assert_eq!(compete(&chosen, &fresh), Outcome::AdoptFresh);
    }

    #[test]
    fn higher_initiator_pid_loses() {
        let chosen = Mb::new(17);
        let fresh = Mb::new(30);
        assert_eq!(compete(&chosen, &fresh), Outcome::KeepChosen);
    }

    #[test]
    fn same_identity_keeps_larger_serial_no() {
        let mut chosen = Mb::new(17);
        chosen.serial_no = 4;
        let mut fresh = Mb::new(17);
        fresh.serial_no = 5;
        assert_eq!(
            compete(&chosen, &fresh),
            Outcome::SameIdentity { fresh_wins: true }
        );

        fresh.serial_no = 3;
        assert_eq!(
            compete(&chosen, &fresh),
            Outcome::SameIdentity { fresh_wins: false }
        );
    }

    #[test]
    fn scenario_f_two_simultaneous_initiators() {
        // Two tools start negotiating at once; the lower pid wins on
        // first comparison, discarding the higher-pid tool's own MB.
        let lower = Mb::new(10);
        let higher = Mb::new(99);
        assert_eq!(compete(&higher, &lower), Outcome::AdoptFresh);
        assert_eq!(compete(&lower, &higher), Outcome::KeepChosen);
    }
}
