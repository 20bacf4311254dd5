//! Raffle house engine.
//!
//! Owns the persisted [`HouseState`] and runs every externally visible
//! operation as one atomic unit: effects are staged on a working copy, the
//! vault interaction (if any) runs next, and the copy is committed only when
//! everything succeeded. Fund-moving operations additionally hold the
//! [`ReentrancyLock`].

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

use crate::{
    error::RaffleError,
    events::{EventJournal, RaffleEvent},
    guard::ReentrancyLock,
    interfaces::{AccessControl, BlacklistRegistry, RandomnessOracle, Role, TokenOwnership, Vault},
    ledger::{EntryLedger, EntryRecord},
    lifecycle::{Outcome, Transition},
    randomness::{RandomWord, RandomnessRequest},
    resolver,
    settlement::{self, PayoutKind, SettlementPlan},
    state::{EntryChannel, HouseState, Raffle, RaffleParams, RaffleStatus},
};

/// Number of random words requested per draw
pub const WORDS_PER_REQUEST: u32 = 1;

/// External collaborators available to one operation
pub struct Collaborators<'a> {
    pub access: &'a dyn AccessControl,
    pub blacklist: &'a dyn BlacklistRegistry,
    pub tokens: &'a dyn TokenOwnership,
    pub oracle: &'a mut dyn RandomnessOracle,
    pub vault: &'a mut dyn Vault,
}

/// Token presented to enter a gated raffle
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenRef {
    pub collection: Pubkey,
    pub token_id: Pubkey,
}

pub struct RaffleHouse {
    state: HouseState,
    lock: ReentrancyLock,
    journal: EventJournal,
}

impl RaffleHouse {
    pub fn new(state: HouseState) -> Self {
        Self {
            state,
            lock: ReentrancyLock::new(),
            journal: EventJournal::default(),
        }
    }

    pub fn state(&self) -> &HouseState {
        &self.state
    }

    /// Shared handle on the lock guarding fund-moving operations
    pub fn lock(&self) -> ReentrancyLock {
        self.lock.clone()
    }

    pub fn raffle(&self, raffle_id: u64) -> Option<&Raffle> {
        self.state.raffle(raffle_id)
    }

    pub fn request(&self, request_id: u64) -> Option<&RandomnessRequest> {
        self.state.requests.get(request_id)
    }

    pub fn has_participated(&self, raffle_id: u64, wallet: &Pubkey) -> bool {
        self.state.has_participated(raffle_id, wallet)
    }

    /// Ledger records of a raffle, voided ones included
    pub fn entries(&self, raffle_id: u64) -> Option<&[EntryRecord]> {
        self.raffle(raffle_id).map(|raffle| raffle.ledger.records())
    }

    /// Events emitted since the last call
    pub fn take_events(&mut self) -> Vec<RaffleEvent> {
        self.journal.drain()
    }

    fn commit(&mut self, staged: HouseState, journal: EventJournal) {
        self.state = staged;
        self.journal.extend(journal);
    }

    // Admin actions

    pub fn set_operator(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        operator: Pubkey,
        enabled: bool,
    ) -> Result<(), RaffleError> {
        require_role(env, Role::Admin, caller)?;
        if enabled {
            self.state.config.operators.insert(operator);
        } else {
            self.state.config.operators.remove(&operator);
        }
        msg!("Operator {} enabled={}", operator, enabled);
        Ok(())
    }

    pub fn set_oracle(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        oracle: Pubkey,
    ) -> Result<(), RaffleError> {
        require_role(env, Role::Admin, caller)?;
        self.state.config.oracle = oracle;
        msg!("Oracle authority set to {}", oracle);
        Ok(())
    }

    // Operator actions

    pub fn create_raffle(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        params: RaffleParams,
    ) -> Result<u64, RaffleError> {
        require_role(env, Role::Operator, caller)?;
        if params.prize_amount == 0 {
            return Err(RaffleError::ZeroPrize);
        }
        // The full pot must be representable in lamports
        params
            .price
            .checked_mul(params.entry_cap)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        let raffle_id = u64::try_from(self.state.raffles.len())
            .map_err(|_| RaffleError::ArithmeticOverflow)?;

        self.state.raffles.push(Raffle {
            id: raffle_id,
            status: RaffleStatus::Accepted,
            entry_cap: params.entry_cap,
            entry_count: 0,
            price: params.price,
            prize_amount: params.prize_amount,
            unfulfilled_amount: params.unfulfilled_amount,
            funds_raised: 0,
            winner: None,
            entry_type: params.entry_type,
            collection_whitelist: params.collection_whitelist.into_iter().collect(),
            cancelled_at: None,
            request_id: None,
            ledger: EntryLedger::new(),
        });
        msg!(
            "Raffle {} created: price={} prize={} cap={}",
            raffle_id,
            params.price,
            params.prize_amount,
            params.entry_cap
        );
        self.journal.record(RaffleEvent::RaffleCreated {
            raffle_id,
            prize_amount: params.prize_amount,
            unfulfilled_amount: params.unfulfilled_amount,
            price: params.price,
            entry_cap: params.entry_cap,
        });
        Ok(raffle_id)
    }

    /// Grants `entries_each` free slots to every player, one ledger record
    /// per player. Price and one-slot-per-wallet rules do not apply.
    pub fn grant_free_entries(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        raffle_id: u64,
        players: &[Pubkey],
        entries_each: u64,
    ) -> Result<u64, RaffleError> {
        require_role(env, Role::Operator, caller)?;
        if entries_each == 0 {
            return Err(RaffleError::NoEntries);
        }
        let mut staged = self.state.clone();
        let mut journal = EventJournal::default();
        let raffle = staged
            .raffle_mut(raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;
        if raffle.status != RaffleStatus::Accepted {
            return Err(RaffleError::RaffleNotAccepting);
        }

        for player in players {
            if env.blacklist.is_blacklisted(player) {
                msg!("Player {} is blacklisted", player);
                return Err(RaffleError::Blacklisted);
            }
            let after = raffle
                .entry_count
                .checked_add(entries_each)
                .ok_or(RaffleError::ArithmeticOverflow)?;
            if raffle.entry_cap != 0 && after > raffle.entry_cap {
                return Err(RaffleError::CapReached);
            }
            raffle.entry_count = raffle.ledger.append_entries(*player, entries_each)?;
            journal.record(RaffleEvent::FreeEntryGranted {
                raffle_id,
                player: *player,
                entries: entries_each,
                current_entries: raffle.entry_count,
            });
        }
        let current_entries = raffle.entry_count;

        msg!(
            "Granted {} free entries to {} players in raffle {}",
            entries_each,
            players.len(),
            raffle_id
        );
        self.commit(staged, journal);
        Ok(current_entries)
    }

    /// Closes entries and asks the oracle for randomness.
    pub fn set_winner(
        &mut self,
        env: &mut Collaborators,
        caller: &Pubkey,
        raffle_id: u64,
    ) -> Result<u64, RaffleError> {
        require_role(env, Role::Operator, caller)?;
        let mut staged = self.state.clone();
        let mut journal = EventJournal::default();
        let raffle = staged
            .raffle_mut(raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;
        if raffle.entry_count == 0 {
            return Err(RaffleError::NoEntries);
        }
        let status = raffle.status.apply(Transition::RequestClose)?;
        let entry_count = raffle.entry_count;
        raffle.status = status;

        let request_id = staged.requests.request(raffle_id, entry_count)?;
        if let Some(raffle) = staged.raffle_mut(raffle_id) {
            raffle.request_id = Some(request_id);
        }
        journal.record(RaffleEvent::RandomnessRequested {
            raffle_id,
            request_id,
            entry_count,
        });

        env.oracle.request_randomness(request_id, WORDS_PER_REQUEST)?;
        msg!("Raffle {} closing, request {}", raffle_id, request_id);
        self.commit(staged, journal);
        Ok(request_id)
    }

    /// Cancels a raffle and refunds every live slot at the entry price.
    pub fn cancel_raffle(
        &mut self,
        env: &mut Collaborators,
        caller: &Pubkey,
        raffle_id: u64,
        now: UnixTimestamp,
    ) -> Result<SettlementPlan, RaffleError> {
        require_role(env, Role::Operator, caller)?;
        let _guard = self.lock.enter()?;
        let mut staged = self.state.clone();
        let mut journal = EventJournal::default();
        let raffle = staged
            .raffle_mut(raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;

        raffle.status = raffle.status.apply(Transition::Cancel)?;
        raffle.cancelled_at = Some(now);
        let plan = settlement::plan_refunds(raffle)?;
        journal.record(RaffleEvent::RaffleCancelled {
            raffle_id,
            refunded: plan.total()?,
            cancelled_at: now,
        });

        plan.execute(&mut *env.vault)?;
        msg!("Raffle {} cancelled, {} refunds", raffle_id, plan.payouts.len());
        self.commit(staged, journal);
        Ok(plan)
    }

    /// Voids ledger slots of `player`. Slots stay in place so draws remain
    /// stable; the resolver skips them.
    pub fn cancel_entry(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        raffle_id: u64,
        indices: &[u64],
        player: &Pubkey,
    ) -> Result<u64, RaffleError> {
        require_role(env, Role::Operator, caller)?;
        let raffle = self
            .state
            .raffle_mut(raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;
        if raffle.status.is_terminal() {
            return Err(RaffleError::InvalidTransition);
        }
        let entries_voided = raffle.ledger.void_entries(indices, player)?;
        msg!(
            "Voided {} entries of {} in raffle {}",
            entries_voided,
            player,
            raffle_id
        );
        self.journal.record(RaffleEvent::EntryCancelled {
            raffle_id,
            player: *player,
            entries_voided,
        });
        Ok(entries_voided)
    }

    pub fn change_blacklist_source(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        source: Pubkey,
    ) -> Result<(), RaffleError> {
        require_role(env, Role::Operator, caller)?;
        self.state.config.blacklist_source = source;
        msg!("Blacklist source set to {}", source);
        Ok(())
    }

    pub fn set_destination_address(
        &mut self,
        env: &Collaborators,
        caller: &Pubkey,
        destination: Pubkey,
    ) -> Result<(), RaffleError> {
        require_role(env, Role::Operator, caller)?;
        self.state.config.destination = destination;
        msg!("Destination set to {}", destination);
        Ok(())
    }

    /// Sends `amount` from the free balance to the destination address.
    pub fn withdraw(
        &mut self,
        env: &mut Collaborators,
        caller: &Pubkey,
        amount: u64,
    ) -> Result<(), RaffleError> {
        require_role(env, Role::Operator, caller)?;
        let destination = self.destination()?;
        let _guard = self.lock.enter()?;
        settlement::plan_withdrawal(destination, amount).execute(&mut *env.vault)?;
        msg!("Withdrew {} lamports to {}", amount, destination);
        Ok(())
    }

    // Participant actions

    /// Buys one slot for exactly the entry price.
    pub fn buy_entry(
        &mut self,
        env: &mut Collaborators,
        buyer: &Pubkey,
        channel: EntryChannel,
        raffle_id: u64,
        token: Option<TokenRef>,
        payment: u64,
    ) -> Result<u64, RaffleError> {
        let _guard = self.lock.enter()?;
        let mut staged = self.state.clone();
        let mut journal = EventJournal::default();

        let participated = staged.has_participated(raffle_id, buyer);
        let raffle = staged
            .raffle_mut(raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;
        if raffle.status != RaffleStatus::Accepted {
            return Err(RaffleError::RaffleNotAccepting);
        }
        if !raffle.entry_type.allows(channel) {
            return Err(RaffleError::EntryTypeNotAllowed);
        }
        if payment != raffle.price {
            msg!("Payment {} does not match price {}", payment, raffle.price);
            return Err(RaffleError::PriceMismatch);
        }
        if env.blacklist.is_blacklisted(buyer) {
            return Err(RaffleError::Blacklisted);
        }
        if raffle.cap_reached() {
            return Err(RaffleError::CapReached);
        }
        if participated {
            return Err(RaffleError::AlreadyParticipated);
        }
        let gate = if raffle.is_gated() {
            let token = token
                .filter(|token| raffle.collection_whitelist.contains(&token.collection))
                .ok_or(RaffleError::NotInRequiredCollection)?;
            if env.tokens.owner_of(&token.collection, &token.token_id) != Some(*buyer) {
                return Err(RaffleError::NotTokenOwner);
            }
            Some(token)
        } else {
            None
        };

        let current_entries = raffle.ledger.append(*buyer)?;
        raffle.entry_count = current_entries;
        raffle.funds_raised = raffle
            .funds_raised
            .checked_add(payment)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        let price = raffle.price;

        if let Some(token) = gate {
            if !staged
                .used_tokens
                .insert((raffle_id, token.collection, token.token_id))
            {
                return Err(RaffleError::TokenAlreadyUsed);
            }
        }
        staged.participations.insert((raffle_id, *buyer));
        journal.record(RaffleEvent::EntrySold {
            raffle_id,
            buyer: *buyer,
            current_entries,
            price,
        });

        if payment > 0 {
            env.vault.collect(buyer, payment)?;
        }
        msg!(
            "Entry {} sold to {} in raffle {}",
            current_entries,
            buyer,
            raffle_id
        );
        self.commit(staged, journal);
        Ok(current_entries)
    }

    // Oracle callback

    /// Delivers randomness for `request_id`, then resolves and settles the
    /// raffle it belongs to. Returns `None` when the raffle had already left
    /// `ClosingRequested` (cancelled while the request was pending).
    pub fn on_randomness_ready(
        &mut self,
        env: &mut Collaborators,
        caller: &Pubkey,
        request_id: u64,
        words: Vec<RandomWord>,
        now: UnixTimestamp,
    ) -> Result<Option<Outcome>, RaffleError> {
        require_role(env, Role::Oracle, caller)?;
        let _guard = self.lock.enter()?;
        let mut staged = self.state.clone();
        let mut journal = EventJournal::default();
        let destination = staged.config.destination;

        let delivery = staged.requests.fulfill(request_id, words)?;
        journal.record(RaffleEvent::RandomnessReceived {
            raffle_id: delivery.raffle_id,
            request_id,
            normalized_draw: delivery.normalized_draw,
        });
        let raffle = staged
            .raffle_mut(delivery.raffle_id)
            .ok_or(RaffleError::RaffleNotFound)?;

        if raffle.status != RaffleStatus::ClosingRequested {
            msg!(
                "Raffle {} is {:?}, request {} recorded without settlement",
                delivery.raffle_id,
                raffle.status,
                request_id
            );
            self.commit(staged, journal);
            return Ok(None);
        }

        let outcome = Outcome::select(delivery.entry_count, raffle.entry_cap);
        let status = raffle.status.apply(outcome.transition())?;
        msg!(
            "Raffle {} settling as {:?} (draw {} of {})",
            delivery.raffle_id,
            outcome,
            delivery.normalized_draw,
            delivery.entry_count
        );

        let plan = match outcome {
            Outcome::Full => {
                let winner = resolver::resolve(&raffle.ledger, delivery.normalized_draw)?;
                let plan = settlement::plan_full(raffle, winner, destination)?;
                let platform_fee = plan.amount_of(PayoutKind::PlatformFee);
                if platform_fee > 0 && destination == Pubkey::default() {
                    return Err(RaffleError::DestinationNotSet);
                }
                raffle.winner = Some(winner);
                journal.record(RaffleEvent::RaffleEnded {
                    raffle_id: raffle.id,
                    winner,
                    prize_amount: raffle.prize_amount,
                    entry_count: delivery.entry_count,
                });
                if platform_fee > 0 {
                    journal.record(RaffleEvent::PlatformFeeTransferred {
                        raffle_id: raffle.id,
                        destination,
                        amount: platform_fee,
                    });
                }
                plan
            }
            Outcome::Unfulfilled => {
                let plan = settlement::plan_unfulfilled(raffle)?;
                let first_buyer = raffle.ledger.first_buyer().ok_or(RaffleError::NoEntries)?;
                journal.record(RaffleEvent::RaffleUnfulfilled {
                    raffle_id: raffle.id,
                    first_buyer,
                    unfulfilled_amount: raffle.unfulfilled_amount,
                    entry_count: delivery.entry_count,
                });
                plan
            }
            Outcome::Empty => {
                raffle.cancelled_at = Some(now);
                journal.record(RaffleEvent::RaffleCancelled {
                    raffle_id: raffle.id,
                    refunded: 0,
                    cancelled_at: now,
                });
                SettlementPlan::default()
            }
        };
        raffle.status = status;

        plan.execute(&mut *env.vault)?;
        self.commit(staged, journal);
        Ok(Some(outcome))
    }

    fn destination(&self) -> Result<Pubkey, RaffleError> {
        match self.state.config.destination {
            destination if destination == Pubkey::default() => Err(RaffleError::DestinationNotSet),
            destination => Ok(destination),
        }
    }
}

fn require_role(env: &Collaborators, role: Role, caller: &Pubkey) -> Result<(), RaffleError> {
    if env.access.has_role(role, caller) {
        Ok(())
    } else {
        msg!("{} lacks the {:?} role", caller, role);
        Err(RaffleError::Unauthorized)
    }
}
