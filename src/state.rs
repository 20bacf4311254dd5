// Head-to-head raffle program - State
use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

use crate::{
    interfaces::{AccessControl, Role},
    ledger::EntryLedger,
    randomness::RequestTracker,
};

/// Status of a raffle
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleStatus {
    /// Created but not yet funded (staked creation path)
    Created,
    /// Open for entries
    Accepted,
    /// Creator cashed out early (staked creation path)
    EarlyCashout,
    /// Cancellation requested by the creator (staked creation path)
    CancelRequested,
    /// Cancelled, entrants refunded
    Cancelled,
    /// Waiting for the oracle to deliver randomness
    ClosingRequested,
    /// Cap reached, winner paid
    Ended,
    /// Cap not reached, first buyer paid the bonus and the rest refunded
    Unfulfilled,
}

impl RaffleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RaffleStatus::Ended | RaffleStatus::Cancelled | RaffleStatus::Unfulfilled
        )
    }
}

/// Which invocation channels may buy entries
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryType {
    /// Only top-level instructions
    OnlyDirectly,
    /// Only cross-program invocations
    OnlyExternalContract,
    /// Either
    Mixed,
}

/// How a purchase reached the program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryChannel {
    Direct,
    ExternalContract,
}

impl EntryType {
    pub fn allows(self, channel: EntryChannel) -> bool {
        match self {
            EntryType::OnlyDirectly => channel == EntryChannel::Direct,
            EntryType::OnlyExternalContract => channel == EntryChannel::ExternalContract,
            EntryType::Mixed => true,
        }
    }
}

/// Raffle record. Never removed once created.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    pub id: u64,
    pub status: RaffleStatus,
    /// Maximum number of slots, 0 for unbounded
    pub entry_cap: u64,
    /// Always equal to the ledger's last cumulative count
    pub entry_count: u64,
    /// Entry price in lamports
    pub price: u64,
    /// Paid to the winner when the cap is reached
    pub prize_amount: u64,
    /// Paid to the first buyer when the cap is not reached
    pub unfulfilled_amount: u64,
    /// Sum of accepted payments
    pub funds_raised: u64,
    pub winner: Option<Pubkey>,
    pub entry_type: EntryType,
    /// Empty for ungated raffles
    pub collection_whitelist: BTreeSet<Pubkey>,
    pub cancelled_at: Option<UnixTimestamp>,
    /// Request id of the outstanding or last randomness request
    pub request_id: Option<u64>,
    pub ledger: EntryLedger,
}

impl Raffle {
    pub fn is_gated(&self) -> bool {
        !self.collection_whitelist.is_empty()
    }

    pub fn cap_reached(&self) -> bool {
        self.entry_cap != 0 && self.entry_count >= self.entry_cap
    }
}

/// Parameters of `create_raffle`
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RaffleParams {
    pub prize_amount: u64,
    pub unfulfilled_amount: u64,
    pub price: u64,
    pub collection_whitelist: Vec<Pubkey>,
    pub entry_type: EntryType,
    pub entry_cap: u64,
}

/// Program-wide configuration
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct HouseConfig {
    /// Manages operators and the oracle authority
    pub admin: Pubkey,
    pub operators: BTreeSet<Pubkey>,
    /// Only signer allowed to deliver randomness
    pub oracle: Pubkey,
    /// Receives platform fees and withdrawals
    pub destination: Pubkey,
    /// Registry consulted for blacklisted wallets, default when unset
    pub blacklist_source: Pubkey,
}

/// Everything the program persists, stored in one house account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct HouseState {
    pub is_initialized: bool,
    pub config: HouseConfig,
    /// Arena indexed by raffle id
    pub raffles: Vec<Raffle>,
    pub requests: RequestTracker,
    /// (raffle id, wallet) pairs holding a purchased slot
    pub participations: BTreeSet<(u64, Pubkey)>,
    /// (raffle id, collection, token) triples already used for entry
    pub used_tokens: BTreeSet<(u64, Pubkey, Pubkey)>,
}

impl Sealed for HouseState {}

impl IsInitialized for HouseState {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl HouseState {
    pub fn new(config: HouseConfig) -> Self {
        Self {
            is_initialized: true,
            config,
            ..Self::default()
        }
    }

    pub fn raffle(&self, raffle_id: u64) -> Option<&Raffle> {
        usize::try_from(raffle_id)
            .ok()
            .and_then(|index| self.raffles.get(index))
    }

    pub fn raffle_mut(&mut self, raffle_id: u64) -> Option<&mut Raffle> {
        usize::try_from(raffle_id)
            .ok()
            .and_then(move |index| self.raffles.get_mut(index))
    }

    pub fn has_participated(&self, raffle_id: u64, wallet: &Pubkey) -> bool {
        self.participations.contains(&(raffle_id, *wallet))
    }
}

impl AccessControl for HouseConfig {
    fn has_role(&self, role: Role, account: &Pubkey) -> bool {
        match role {
            Role::Admin => self.admin == *account,
            Role::Operator => self.operators.contains(account),
            Role::Oracle => self.oracle == *account,
        }
    }
}
