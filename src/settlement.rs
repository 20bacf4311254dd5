// Settlement engine: turns a resolved raffle into an ordered list of payouts
use solana_program::{msg, pubkey::Pubkey};

use crate::{
    error::RaffleError,
    interfaces::Vault,
    ledger::EntryLedger,
    state::Raffle,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayoutKind {
    Prize,
    PlatformFee,
    UnfulfilledBonus,
    Refund,
    Withdrawal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub recipient: Pubkey,
    pub amount: u64,
    pub kind: PayoutKind,
}

/// Payouts of one settlement, in execution order, plus the balance that
/// must be available before any of them is attempted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettlementPlan {
    pub payouts: Vec<Payout>,
    pub required_balance: u64,
}

impl SettlementPlan {
    fn push(&mut self, recipient: Pubkey, amount: u64, kind: PayoutKind) {
        if amount > 0 {
            self.payouts.push(Payout {
                recipient,
                amount,
                kind,
            });
        }
    }

    pub fn total(&self) -> Result<u64, RaffleError> {
        self.payouts.iter().try_fold(0u64, |total, payout| {
            total
                .checked_add(payout.amount)
                .ok_or(RaffleError::ArithmeticOverflow)
        })
    }

    pub fn amount_for(&self, recipient: &Pubkey) -> u64 {
        self.payouts
            .iter()
            .filter(|payout| payout.recipient == *recipient)
            .map(|payout| payout.amount)
            .sum()
    }

    pub fn amount_of(&self, kind: PayoutKind) -> u64 {
        self.payouts
            .iter()
            .filter(|payout| payout.kind == kind)
            .map(|payout| payout.amount)
            .sum()
    }

    /// Checks the balance requirement, then hands every payout to the vault
    /// as one all-or-nothing batch.
    pub fn execute(&self, vault: &mut dyn Vault) -> Result<(), RaffleError> {
        let required = self.required_balance.max(self.total()?);
        let available = vault.balance();
        if available < required {
            msg!(
                "Insufficient balance: need {} lamports, have {}",
                required,
                available
            );
            return Err(RaffleError::InsufficientBalance);
        }
        if self.payouts.is_empty() {
            return Ok(());
        }
        vault.disburse(&self.payouts)?;
        for payout in &self.payouts {
            msg!("Paid {} lamports to {} ({:?})", payout.amount, payout.recipient, payout.kind);
        }
        Ok(())
    }
}

/// Cap reached: the winner receives the prize and the destination receives
/// whatever was raised above it.
pub fn plan_full(
    raffle: &Raffle,
    winner: Pubkey,
    destination: Pubkey,
) -> Result<SettlementPlan, RaffleError> {
    let platform_fee = raffle.funds_raised.saturating_sub(raffle.prize_amount);
    let mut plan = SettlementPlan::default();
    plan.push(winner, raffle.prize_amount, PayoutKind::Prize);
    plan.push(destination, platform_fee, PayoutKind::PlatformFee);
    plan.required_balance = plan.total()?;
    Ok(plan)
}

/// Cap missed: the first-ever buyer receives the unfulfilled bonus, every
/// other slot is refunded at the entry price. Voided slots forfeit their
/// refund but still count towards the balance requirement.
pub fn plan_unfulfilled(raffle: &Raffle) -> Result<SettlementPlan, RaffleError> {
    let ledger = &raffle.ledger;
    let first_buyer = ledger.first_buyer().ok_or(RaffleError::NoEntries)?;

    let refundable_slots = raffle
        .entry_count
        .checked_sub(1)
        .ok_or(RaffleError::NoEntries)?;
    let required_balance = raffle
        .price
        .checked_mul(refundable_slots)
        .and_then(|refunds| refunds.checked_add(raffle.unfulfilled_amount))
        .ok_or(RaffleError::ArithmeticOverflow)?;

    let mut plan = SettlementPlan::default();
    plan.push(first_buyer, raffle.unfulfilled_amount, PayoutKind::UnfulfilledBonus);
    push_refunds(&mut plan, ledger, raffle.price, 1)?;
    plan.required_balance = required_balance;
    Ok(plan)
}

/// Operator cancellation: every live slot is refunded at the entry price.
pub fn plan_refunds(raffle: &Raffle) -> Result<SettlementPlan, RaffleError> {
    let mut plan = SettlementPlan::default();
    push_refunds(&mut plan, &raffle.ledger, raffle.price, 0)?;
    plan.required_balance = plan.total()?;
    Ok(plan)
}

/// Pays a withdrawal from the free balance
pub fn plan_withdrawal(destination: Pubkey, amount: u64) -> SettlementPlan {
    let mut plan = SettlementPlan::default();
    plan.push(destination, amount, PayoutKind::Withdrawal);
    plan.required_balance = amount;
    plan
}

// Refunds every slot after the first `skip_slots`, in ledger order.
fn push_refunds(
    plan: &mut SettlementPlan,
    ledger: &EntryLedger,
    price: u64,
    skip_slots: u64,
) -> Result<(), RaffleError> {
    let mut skipped = 0u64;
    for (position, record) in ledger.records().iter().enumerate() {
        let mut slots = ledger.weight(position);
        if skipped < skip_slots {
            let skip = slots.min(skip_slots - skipped);
            skipped += skip;
            slots -= skip;
        }
        let buyer = match record.owner.buyer() {
            Some(buyer) => buyer,
            None => continue,
        };
        let amount = price
            .checked_mul(slots)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        plan.push(buyer, amount, PayoutKind::Refund);
    }
    Ok(())
}
