//! The trip state machine's transition table (§4.3). Kept as data rather
//! than scattered `match` arms so the event log, the dispatcher and tests
//! all consult exactly one source of truth.

use crate::trip::TripStatus;

/// `true` iff `(from, to)` is a transition the Trip Aggregate accepts.
/// Any non-terminal state may additionally transition to `Cancelled` or
/// `Failed`; terminal states accept nothing.
pub fn is_allowed(from: TripStatus, to: TripStatus) -> bool {
    use TripStatus::*;

    if from.is_terminal() {
        return false;
    }
    if matches!(to, Cancelled | Failed) {
        return true;
    }

    matches!(
        (from, to),
        (Requested, Matched)
            | (Matched, DriverAssigned)
            | (DriverAssigned, DriverArriving)
            | (DriverAssigned, DriverArrived)
            | (DriverArriving, DriverArrived)
            | (DriverArrived, TripStarted)
            | (TripStarted, InProgress)
            | (TripStarted, Completed)
            | (InProgress, Completed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use TripStatus::*;

    #[test]
    fn happy_path_chain_is_allowed() {
        let chain = [
            Requested,
            Matched,
            DriverAssigned,
            DriverArriving,
            DriverArrived,
            TripStarted,
            InProgress,
            Completed,
        ];
        for pair in chain.windows(2) {
            assert!(is_allowed(pair[0], pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn any_nonterminal_state_can_cancel() {
        for from in [
            Requested,
            Matched,
            DriverAssigned,
            DriverArriving,
            DriverArrived,
            TripStarted,
            InProgress,
        ] {
            assert!(is_allowed(from, Cancelled));
            assert!(is_allowed(from, Failed));
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for from in [Completed, Cancelled, Failed] {
            for to in [Requested, Matched, Completed, Cancelled, Failed] {
                assert!(!is_allowed(from, to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        assert!(!is_allowed(Requested, DriverAssigned));
        assert!(!is_allowed(Requested, Completed));
        assert!(!is_allowed(Matched, TripStarted));
    }
}
