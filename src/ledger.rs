//! Append-only weighted entry ledger of a single raffle.
//!
//! Each record covers the rank interval `[previous cumulative + 1, cumulative]`.
//! Records are never removed or renumbered; cancelling an entry only replaces
//! its owner with [`EntryOwner::Voided`], which keeps binary search results
//! stable.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::RaffleError;

/// Owner of a ledger slot
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOwner {
    Buyer(Pubkey),
    Voided,
}

impl EntryOwner {
    pub fn buyer(&self) -> Option<Pubkey> {
        match self {
            EntryOwner::Buyer(key) => Some(*key),
            EntryOwner::Voided => None,
        }
    }

    pub fn is_voided(&self) -> bool {
        matches!(self, EntryOwner::Voided)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entries sold up to and including this record
    pub cumulative: u64,
    pub owner: EntryOwner,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryLedger {
    records: Vec<EntryRecord>,
    /// Buyer of record 0, kept even if that record is voided later
    first_buyer: Option<Pubkey>,
}

impl EntryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single-slot record and returns the new cumulative count.
    pub fn append(&mut self, buyer: Pubkey) -> Result<u64, RaffleError> {
        self.append_entries(buyer, 1)
    }

    /// Appends one record covering `entries` slots.
    pub fn append_entries(&mut self, buyer: Pubkey, entries: u64) -> Result<u64, RaffleError> {
        if entries == 0 {
            return Err(RaffleError::NoEntries);
        }
        let cumulative = self
            .total_entries()
            .checked_add(entries)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        if self.records.is_empty() {
            self.first_buyer = Some(buyer);
        }
        self.records.push(EntryRecord {
            cumulative,
            owner: EntryOwner::Buyer(buyer),
        });
        Ok(cumulative)
    }

    /// Voids every indexed record owned by `expected_owner` and returns the
    /// number of slots voided. Nothing changes if any index fails.
    pub fn void_entries(
        &mut self,
        indices: &[u64],
        expected_owner: &Pubkey,
    ) -> Result<u64, RaffleError> {
        let mut positions = Vec::with_capacity(indices.len());
        for &index in indices {
            let position = usize::try_from(index)
                .ok()
                .filter(|position| *position < self.records.len())
                .ok_or(RaffleError::EntryIndexOutOfRange)?;
            if self.records[position].owner != EntryOwner::Buyer(*expected_owner) {
                return Err(RaffleError::OwnershipMismatch);
            }
            positions.push(position);
        }

        let mut voided = 0u64;
        for position in positions {
            // A repeated index was already voided by an earlier iteration
            if self.records[position].owner.is_voided() {
                continue;
            }
            self.records[position].owner = EntryOwner::Voided;
            voided = voided
                .checked_add(self.weight(position))
                .ok_or(RaffleError::ArithmeticOverflow)?;
        }
        Ok(voided)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of slots, the cumulative count of the last record
    pub fn total_entries(&self) -> u64 {
        self.records.last().map_or(0, |record| record.cumulative)
    }

    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&EntryRecord> {
        self.records.get(index)
    }

    pub fn first_buyer(&self) -> Option<Pubkey> {
        self.first_buyer
    }

    /// Slots covered by the record at `position`
    pub fn weight(&self, position: usize) -> u64 {
        let previous = match position {
            0 => 0,
            _ => self.records[position - 1].cumulative,
        };
        self.records[position].cumulative - previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_counts_strictly_increase() {
        let mut ledger = EntryLedger::new();
        let buyers: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let mut last = 0;
        for (i, buyer) in buyers.iter().enumerate() {
            let count = ledger.append_entries(*buyer, i as u64 + 1).unwrap();
            assert!(count > last);
            assert_eq!(count - last, i as u64 + 1);
            last = count;
        }
        assert_eq!(ledger.len(), 5);
        assert_eq!(ledger.total_entries(), 15);
        assert_eq!(ledger.first_buyer(), Some(buyers[0]));
    }

    #[test]
    fn append_rejects_empty_record() {
        let mut ledger = EntryLedger::new();
        assert_eq!(
            ledger.append_entries(Pubkey::new_unique(), 0),
            Err(RaffleError::NoEntries)
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn voiding_keeps_slots_and_counts_weight() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let mut ledger = EntryLedger::new();
        ledger.append(a).unwrap();
        ledger.append_entries(b, 50).unwrap();
        ledger.append(b).unwrap();

        assert_eq!(ledger.void_entries(&[1, 2], &b), Ok(51));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.get(1).unwrap().cumulative, 51);
        assert!(ledger.get(1).unwrap().owner.is_voided());
        assert_eq!(ledger.get(0).unwrap().owner, EntryOwner::Buyer(a));
    }

    #[test]
    fn voiding_is_all_or_nothing() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let mut ledger = EntryLedger::new();
        ledger.append(a).unwrap();
        ledger.append(b).unwrap();

        assert_eq!(ledger.void_entries(&[0, 1], &a), Err(RaffleError::OwnershipMismatch));
        assert_eq!(ledger.get(0).unwrap().owner, EntryOwner::Buyer(a));
        assert_eq!(ledger.void_entries(&[7], &a), Err(RaffleError::EntryIndexOutOfRange));
    }

    #[test]
    fn first_buyer_survives_voiding() {
        let a = Pubkey::new_unique();
        let mut ledger = EntryLedger::new();
        ledger.append(a).unwrap();
        ledger.void_entries(&[0], &a).unwrap();
        assert_eq!(ledger.first_buyer(), Some(a));
    }
}
