//! Raffle status state machine.
//!
//! Every allowed move is listed in [`RaffleStatus::apply`]; anything else is
//! rejected. Terminal states (`Ended`, `Cancelled`, `Unfulfilled`) have no
//! outgoing transitions.

use crate::{error::RaffleError, state::RaffleStatus};

/// Events that move a raffle between states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Operator asks for a winner
    RequestClose,
    /// Randomness delivered, cap reached
    SettleFull,
    /// Randomness delivered, cap not reached, at least one entry
    SettleUnfulfilled,
    /// Randomness delivered, no entries
    SettleEmpty,
    /// Operator cancellation
    Cancel,
}

/// Settlement scenario chosen once randomness is delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Cap reached exactly: winner takes the prize, platform the rest
    Full,
    /// Cap missed: first buyer gets the bonus, everyone else a refund
    Unfulfilled,
    /// Nobody entered
    Empty,
}

impl Outcome {
    /// Compares the frozen entry count against the cap.
    pub fn select(entry_count: u64, entry_cap: u64) -> Self {
        if entry_count == 0 {
            Outcome::Empty
        } else if entry_count == entry_cap {
            Outcome::Full
        } else {
            Outcome::Unfulfilled
        }
    }

    pub fn transition(self) -> Transition {
        match self {
            Outcome::Full => Transition::SettleFull,
            Outcome::Unfulfilled => Transition::SettleUnfulfilled,
            Outcome::Empty => Transition::SettleEmpty,
        }
    }
}

impl RaffleStatus {
    /// Target state of `transition`, or the reason it is not allowed.
    pub fn apply(self, transition: Transition) -> Result<RaffleStatus, RaffleError> {
        use RaffleStatus::*;

        match (self, transition) {
            (Accepted, Transition::RequestClose) => Ok(ClosingRequested),
            (ClosingRequested, Transition::SettleFull) => Ok(Ended),
            (ClosingRequested, Transition::SettleUnfulfilled) => Ok(Unfulfilled),
            (ClosingRequested, Transition::SettleEmpty) => Ok(Cancelled),
            (Cancelled, Transition::Cancel) => Err(RaffleError::AlreadyCancelled),
            (
                Created | Accepted | EarlyCashout | CancelRequested | ClosingRequested,
                Transition::Cancel,
            ) => Ok(Cancelled),
            (from, transition) => Err(RaffleError::transition(from, transition.target())),
        }
    }
}

impl Transition {
    /// Nominal destination, used when reporting a rejected transition
    pub fn target(self) -> RaffleStatus {
        match self {
            Transition::RequestClose => RaffleStatus::ClosingRequested,
            Transition::SettleFull => RaffleStatus::Ended,
            Transition::SettleUnfulfilled => RaffleStatus::Unfulfilled,
            Transition::SettleEmpty | Transition::Cancel => RaffleStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RaffleStatus::*;

    const ALL: [RaffleStatus; 8] = [
        Created,
        Accepted,
        EarlyCashout,
        CancelRequested,
        Cancelled,
        ClosingRequested,
        Ended,
        Unfulfilled,
    ];

    const TRANSITIONS: [Transition; 5] = [
        Transition::RequestClose,
        Transition::SettleFull,
        Transition::SettleUnfulfilled,
        Transition::SettleEmpty,
        Transition::Cancel,
    ];

    #[test]
    fn happy_path() {
        let closing = Accepted.apply(Transition::RequestClose).unwrap();
        assert_eq!(closing, ClosingRequested);
        assert_eq!(closing.apply(Transition::SettleFull), Ok(Ended));
        assert_eq!(closing.apply(Transition::SettleUnfulfilled), Ok(Unfulfilled));
        assert_eq!(closing.apply(Transition::SettleEmpty), Ok(Cancelled));
    }

    #[test]
    fn terminal_states_are_final() {
        for status in ALL.iter().filter(|status| status.is_terminal()) {
            for transition in TRANSITIONS {
                assert!(status.apply(transition).is_err(), "{:?} {:?}", status, transition);
            }
        }
    }

    #[test]
    fn cancel_twice_reports_already_cancelled() {
        assert_eq!(Cancelled.apply(Transition::Cancel), Err(RaffleError::AlreadyCancelled));
        assert_eq!(Ended.apply(Transition::Cancel), Err(RaffleError::InvalidTransition));
    }

    #[test]
    fn settlement_requires_closing_requested() {
        assert_eq!(
            Accepted.apply(Transition::SettleFull),
            Err(RaffleError::InvalidTransition)
        );
        assert_eq!(
            ClosingRequested.apply(Transition::RequestClose),
            Err(RaffleError::InvalidTransition)
        );
    }

    #[test]
    fn outcome_compares_frozen_count_with_cap() {
        assert_eq!(Outcome::select(0, 2), Outcome::Empty);
        assert_eq!(Outcome::select(2, 2), Outcome::Full);
        assert_eq!(Outcome::select(1, 2), Outcome::Unfulfilled);
        assert_eq!(Outcome::select(5, 0), Outcome::Unfulfilled);
    }
}
