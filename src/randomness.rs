// Randomness request tracking
use std::collections::BTreeMap;

use arrayref::array_ref;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::msg;

use crate::error::RaffleError;

/// One 32-byte random value delivered by the oracle
pub type RandomWord = [u8; 32];

/// Outstanding or fulfilled oracle request. Kept after fulfillment for audit.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: u64,
    pub fulfilled: bool,
    pub words: Vec<RandomWord>,
    pub raffle_id: u64,
    /// Entry count frozen when the request was made
    pub entry_count: u64,
}

/// Result of a fulfillment, handed to the lifecycle manager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub request_id: u64,
    pub raffle_id: u64,
    pub normalized_draw: u64,
    pub entry_count: u64,
}

/// Correlates oracle requests with raffles
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestTracker {
    next_request_id: u64,
    requests: BTreeMap<u64, RandomnessRequest>,
}

impl RequestTracker {
    /// Allocates a request id for `raffle_id`, freezing `entry_count`.
    pub fn request(&mut self, raffle_id: u64, entry_count: u64) -> Result<u64, RaffleError> {
        if entry_count == 0 {
            return Err(RaffleError::NoEntries);
        }
        let request_id = self.next_request_id;
        self.next_request_id = request_id
            .checked_add(1)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        self.requests.insert(
            request_id,
            RandomnessRequest {
                request_id,
                fulfilled: false,
                words: Vec::new(),
                raffle_id,
                entry_count,
            },
        );
        msg!(
            "Randomness request {} for raffle {} ({} entries)",
            request_id,
            raffle_id,
            entry_count
        );
        Ok(request_id)
    }

    /// Marks `request_id` fulfilled and reduces the first word modulo the
    /// frozen entry count. A second delivery for the same id is rejected.
    pub fn fulfill(
        &mut self,
        request_id: u64,
        words: Vec<RandomWord>,
    ) -> Result<Delivery, RaffleError> {
        let request = self
            .requests
            .get_mut(&request_id)
            .filter(|request| !request.fulfilled)
            .ok_or(RaffleError::UnknownRequest)?;
        let first = words.first().ok_or(RaffleError::EmptyRandomness)?;
        let normalized_draw = normalize(first, request.entry_count)?;

        request.fulfilled = true;
        request.words = words;
        Ok(Delivery {
            request_id,
            raffle_id: request.raffle_id,
            normalized_draw,
            entry_count: request.entry_count,
        })
    }

    pub fn get(&self, request_id: u64) -> Option<&RandomnessRequest> {
        self.requests.get(&request_id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &RandomnessRequest> {
        self.requests.values().filter(|request| !request.fulfilled)
    }
}

/// First 8 bytes of `word`, little-endian, modulo `entry_count`
pub fn normalize(word: &RandomWord, entry_count: u64) -> Result<u64, RaffleError> {
    if entry_count == 0 {
        return Err(RaffleError::NoEntries);
    }
    let value = u64::from_le_bytes(*array_ref![word, 0, 8]);
    Ok(value % entry_count)
}

/// Builds a word whose reduction is `value` for any entry count above it
pub fn word_from_u64(value: u64) -> RandomWord {
    let mut word = [0u8; 32];
    word[..8].copy_from_slice(&value.to_le_bytes());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_unique_ids() {
        let mut tracker = RequestTracker::default();
        let first = tracker.request(0, 3).unwrap();
        let second = tracker.request(1, 5).unwrap();
        assert_ne!(first, second);
        assert_eq!(tracker.pending().count(), 2);
        assert_eq!(tracker.get(second).unwrap().entry_count, 5);
    }

    #[test]
    fn fulfill_uses_frozen_entry_count() {
        let mut tracker = RequestTracker::default();
        let id = tracker.request(4, 3).unwrap();
        let delivery = tracker.fulfill(id, vec![word_from_u64(10)]).unwrap();
        assert_eq!(
            delivery,
            Delivery {
                request_id: id,
                raffle_id: 4,
                normalized_draw: 1,
                entry_count: 3,
            }
        );
        let stored = tracker.get(id).unwrap();
        assert!(stored.fulfilled);
        assert_eq!(stored.words, vec![word_from_u64(10)]);
    }

    #[test]
    fn second_fulfillment_is_rejected() {
        let mut tracker = RequestTracker::default();
        let id = tracker.request(0, 2).unwrap();
        tracker.fulfill(id, vec![word_from_u64(1)]).unwrap();
        let before = tracker.clone();
        assert_eq!(
            tracker.fulfill(id, vec![word_from_u64(0)]),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(tracker, before);
    }

    #[test]
    fn unknown_and_empty_deliveries_fail() {
        let mut tracker = RequestTracker::default();
        assert_eq!(
            tracker.fulfill(9, vec![word_from_u64(1)]),
            Err(RaffleError::UnknownRequest)
        );
        let id = tracker.request(0, 2).unwrap();
        assert_eq!(tracker.fulfill(id, vec![]), Err(RaffleError::EmptyRandomness));
        assert!(!tracker.get(id).unwrap().fulfilled);
    }

    #[test]
    fn normalize_reads_little_endian_prefix() {
        let mut word = [0xffu8; 32];
        word[..8].copy_from_slice(&7u64.to_le_bytes());
        assert_eq!(normalize(&word, 5), Ok(2));
        assert_eq!(normalize(&word, 0), Err(RaffleError::NoEntries));
    }
}
