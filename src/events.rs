// Observable events of the raffle program
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, log::sol_log_data, msg, pubkey::Pubkey};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleCreated {
        raffle_id: u64,
        prize_amount: u64,
        unfulfilled_amount: u64,
        price: u64,
        entry_cap: u64,
    },
    EntrySold {
        raffle_id: u64,
        buyer: Pubkey,
        /// Cumulative count after the sale
        current_entries: u64,
        price: u64,
    },
    FreeEntryGranted {
        raffle_id: u64,
        player: Pubkey,
        entries: u64,
        current_entries: u64,
    },
    RandomnessRequested {
        raffle_id: u64,
        request_id: u64,
        entry_count: u64,
    },
    RandomnessReceived {
        raffle_id: u64,
        request_id: u64,
        normalized_draw: u64,
    },
    RaffleEnded {
        raffle_id: u64,
        winner: Pubkey,
        prize_amount: u64,
        entry_count: u64,
    },
    RaffleUnfulfilled {
        raffle_id: u64,
        first_buyer: Pubkey,
        unfulfilled_amount: u64,
        entry_count: u64,
    },
    RaffleCancelled {
        raffle_id: u64,
        refunded: u64,
        cancelled_at: UnixTimestamp,
    },
    EntryCancelled {
        raffle_id: u64,
        player: Pubkey,
        entries_voided: u64,
    },
    PlatformFeeTransferred {
        raffle_id: u64,
        destination: Pubkey,
        amount: u64,
    },
}

impl RaffleEvent {
    /// Writes the event to the program log, borsh-encoded for indexers
    pub fn publish(&self) {
        msg!("Event: {:?}", self);
        if let Ok(bytes) = self.try_to_vec() {
            sol_log_data(&[&bytes]);
        }
    }
}

/// Events recorded by one engine operation, in emission order
#[derive(Clone, Debug, Default)]
pub struct EventJournal {
    events: Vec<RaffleEvent>,
}

impl EventJournal {
    pub fn record(&mut self, event: RaffleEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: EventJournal) {
        self.events.extend(other.events);
    }

    pub fn drain(&mut self) -> Vec<RaffleEvent> {
        std::mem::take(&mut self.events)
    }
}
