//! Collaborators the raffle engine depends on but does not own.
//!
//! The on-chain program binds these to accounts (see `adapters`); tests bind
//! them to in-memory doubles.

use solana_program::pubkey::Pubkey;

use crate::{error::RaffleError, settlement::Payout};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Operator,
    Oracle,
}

pub trait AccessControl {
    fn has_role(&self, role: Role, account: &Pubkey) -> bool;
}

pub trait BlacklistRegistry {
    fn is_blacklisted(&self, account: &Pubkey) -> bool;
}

pub trait TokenOwnership {
    /// Current owner of `token_id` within `collection`, `None` if the token
    /// does not belong to the collection.
    fn owner_of(&self, collection: &Pubkey, token_id: &Pubkey) -> Option<Pubkey>;
}

pub trait RandomnessOracle {
    /// Asks the oracle to deliver `num_words` words for `request_id` through
    /// a later, out-of-band fulfillment.
    fn request_randomness(&mut self, request_id: u64, num_words: u32) -> Result<(), RaffleError>;
}

/// Pooled balance of the house
pub trait Vault {
    /// Lamports available for payouts
    fn balance(&self) -> u64;

    /// Moves `amount` from `payer` into the house.
    fn collect(&mut self, payer: &Pubkey, amount: u64) -> Result<(), RaffleError>;

    /// Pays every payout or none of them. A rejecting recipient fails the
    /// whole batch with `TransferFailed`.
    fn disburse(&mut self, payouts: &[Payout]) -> Result<(), RaffleError>;
}

/// Blacklist with no entries, used while no registry is configured
pub struct EmptyBlacklist;

impl BlacklistRegistry for EmptyBlacklist {
    fn is_blacklisted(&self, _account: &Pubkey) -> bool {
        false
    }
}

/// Token registry that knows no tokens, for ungated raffles
pub struct NoTokens;

impl TokenOwnership for NoTokens {
    fn owner_of(&self, _collection: &Pubkey, _token_id: &Pubkey) -> Option<Pubkey> {
        None
    }
}

/// Randomness is published as a program event and picked up by the oracle
/// authority off-chain.
pub struct EventOracle;

impl RandomnessOracle for EventOracle {
    fn request_randomness(&mut self, _request_id: u64, _num_words: u32) -> Result<(), RaffleError> {
        Ok(())
    }
}
