use solana_program::{decode_error::DecodeError, msg, program_error::ProgramError};
use thiserror::Error;

use crate::state::RaffleStatus;

/// Errors that may be returned by the head-to-head raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Caller lacks the capability the action requires
    #[error("Caller is not authorized for this action")]
    Unauthorized,

    /// No raffle with the given id
    #[error("Raffle does not exist")]
    RaffleNotFound,

    /// Prize amount must be positive
    #[error("Prize amount must be greater than zero")]
    ZeroPrize,

    /// Checked arithmetic failed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Attached payment differs from the entry price
    #[error("Payment does not match the entry price")]
    PriceMismatch,

    /// Invocation channel is not allowed by the raffle's entry type
    #[error("Entry type not allowed for this raffle")]
    EntryTypeNotAllowed,

    /// Buyer is on the blacklist
    #[error("Address is blacklisted")]
    Blacklisted,

    /// Entry cap already reached
    #[error("Entry cap reached")]
    CapReached,

    /// Wallet already holds a purchased slot in this raffle
    #[error("Wallet already participated in this raffle")]
    AlreadyParticipated,

    /// Collection is not on the raffle whitelist
    #[error("Collection is not required by this raffle")]
    NotInRequiredCollection,

    /// Buyer does not own the presented token
    #[error("Buyer does not own the token")]
    NotTokenOwner,

    /// Token was already used to enter this raffle
    #[error("Token already used for this raffle")]
    TokenAlreadyUsed,

    /// Raffle is not accepting entries
    #[error("Raffle is not accepting entries")]
    RaffleNotAccepting,

    /// Ledger slot is owned by someone else
    #[error("Entry owner does not match")]
    OwnershipMismatch,

    /// Ledger index out of range
    #[error("Entry index out of range")]
    EntryIndexOutOfRange,

    /// Entry count must be positive
    #[error("No entries in this raffle")]
    NoEntries,

    /// Normalized draw does not fall inside the ledger
    #[error("Draw is outside the ledger range")]
    DrawOutOfRange,

    /// Every ledger slot is voided
    #[error("All participants are voided")]
    AllParticipantsVoided,

    /// Request id unknown or already fulfilled
    #[error("Unknown or already fulfilled randomness request")]
    UnknownRequest,

    /// Oracle delivered no random words
    #[error("Randomness delivery carried no words")]
    EmptyRandomness,

    /// Free balance cannot cover the payouts
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// A recipient rejected a payment
    #[error("Transfer failed")]
    TransferFailed,

    /// Raffle is already cancelled
    #[error("Raffle already cancelled")]
    AlreadyCancelled,

    /// Transition not allowed by the lifecycle
    #[error("Invalid status transition")]
    InvalidTransition,

    /// Destination (platform) address has not been configured
    #[error("Destination address not set")]
    DestinationNotSet,

    /// Fund-moving operation re-entered
    #[error("Reentrant call")]
    Reentrancy,

    /// House account is not initialized
    #[error("House not initialized")]
    HouseNotInitialized,
}

impl RaffleError {
    /// Error for a transition the lifecycle does not enumerate
    pub fn transition(from: RaffleStatus, to: RaffleStatus) -> Self {
        msg!("Rejected transition {:?} -> {:?}", from, to);
        RaffleError::InvalidTransition
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_custom_program_error() {
        assert_eq!(ProgramError::from(RaffleError::InvalidInstructionData), ProgramError::Custom(0));
        assert_eq!(ProgramError::from(RaffleError::Unauthorized), ProgramError::Custom(1));
        assert_eq!(<RaffleError as DecodeError<RaffleError>>::type_of(), "Raffle Error");
    }
}
