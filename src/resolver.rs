//! Maps a normalized draw to the owner of the ledger slot containing it.

use solana_program::{msg, pubkey::Pubkey};

use crate::{error::RaffleError, ledger::EntryLedger};

/// Index of the record whose interval contains the 0-based `normalized_draw`.
pub fn find_slot(ledger: &EntryLedger, normalized_draw: u64) -> Result<usize, RaffleError> {
    let rank = normalized_draw
        .checked_add(1)
        .ok_or(RaffleError::ArithmeticOverflow)?;
    let index = match ledger
        .records()
        .binary_search_by_key(&rank, |record| record.cumulative)
    {
        Ok(exact) => exact,
        Err(upper_bound) => upper_bound,
    };
    if index >= ledger.len() {
        return Err(RaffleError::DrawOutOfRange);
    }
    Ok(index)
}

/// Resolves the winner for `normalized_draw`, which must lie in
/// `[0, total entries)`.
///
/// When the selected slot is voided the search walks left, wrapping from
/// index 0 to the last record, until it finds a live owner. Every slot is
/// visited at most once.
pub fn resolve(ledger: &EntryLedger, normalized_draw: u64) -> Result<Pubkey, RaffleError> {
    let start = find_slot(ledger, normalized_draw)?;
    let records = ledger.records();

    let mut index = start;
    for _ in 0..records.len() {
        if let Some(owner) = records[index].owner.buyer() {
            if index != start {
                msg!("Slot {} is voided, resolved to slot {}", start, index);
            }
            return Ok(owner);
        }
        index = match index {
            0 => records.len() - 1,
            _ => index - 1,
        };
    }
    Err(RaffleError::AllParticipantsVoided)
}
