// Account-backed implementations of the engine's collaborators
use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    borsh::try_from_slice_unchecked,
    msg,
    program::invoke,
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{self, instructions::{load_current_index_checked, load_instruction_at_checked}},
};
use spl_token::state::{Account as TokenAccount, Mint};

use crate::{
    error::RaffleError,
    interfaces::{BlacklistRegistry, TokenOwnership, Vault},
    settlement::Payout,
    state::EntryChannel,
};

/// Layout of a blacklist registry account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct BlacklistAccount {
    pub entries: Vec<Pubkey>,
}

/// Blacklist loaded from the configured registry account
#[derive(Debug, Default)]
pub struct AccountBlacklist {
    entries: BTreeSet<Pubkey>,
}

impl AccountBlacklist {
    /// Reads the registry at `source`. An unset source blacklists nobody.
    pub fn load(source: &Pubkey, account: Option<&AccountInfo>) -> Result<Self, ProgramError> {
        if *source == Pubkey::default() {
            return Ok(Self::default());
        }
        let account = account.ok_or(ProgramError::NotEnoughAccountKeys)?;
        if account.key != source {
            msg!("Blacklist account {} does not match source {}", account.key, source);
            return Err(ProgramError::InvalidArgument);
        }
        let registry: BlacklistAccount = try_from_slice_unchecked(&account.data.borrow())
            .map_err(|_| ProgramError::InvalidAccountData)?;
        Ok(Self {
            entries: registry.entries.into_iter().collect(),
        })
    }
}

impl BlacklistRegistry for AccountBlacklist {
    fn is_blacklisted(&self, account: &Pubkey) -> bool {
        self.entries.contains(account)
    }
}

/// NFT ownership through SPL token accounts. The token id is the NFT mint;
/// it belongs to a collection when the collection address is its mint
/// authority.
#[derive(Debug, Default)]
pub struct SplTokenOwnership {
    presented: Option<(Pubkey, Mint, TokenAccount)>,
}

impl SplTokenOwnership {
    pub fn load(token_account: &AccountInfo, mint_account: &AccountInfo) -> Result<Self, ProgramError> {
        if token_account.owner != &spl_token::id() || mint_account.owner != &spl_token::id() {
            msg!("Token accounts must be owned by the SPL token program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let holding = TokenAccount::unpack(&token_account.data.borrow())?;
        let mint = Mint::unpack(&mint_account.data.borrow())?;
        Ok(Self {
            presented: Some((*mint_account.key, mint, holding)),
        })
    }
}

impl TokenOwnership for SplTokenOwnership {
    fn owner_of(&self, collection: &Pubkey, token_id: &Pubkey) -> Option<Pubkey> {
        let (mint_key, mint, holding) = self.presented.as_ref()?;
        let in_collection = mint_key == token_id && mint.mint_authority == COption::Some(*collection);
        if in_collection && holding.mint == *token_id && holding.amount > 0 {
            Some(holding.owner)
        } else {
            None
        }
    }
}

/// The house account's lamports, minus its rent-exempt floor
pub struct AccountVault<'a, 'info> {
    house: &'a AccountInfo<'info>,
    rent_floor: u64,
    payer: Option<(&'a AccountInfo<'info>, &'a AccountInfo<'info>)>,
    recipients: &'a [AccountInfo<'info>],
}

impl<'a, 'info> AccountVault<'a, 'info> {
    pub fn new(house: &'a AccountInfo<'info>, rent_floor: u64) -> Self {
        Self {
            house,
            rent_floor,
            payer: None,
            recipients: &[],
        }
    }

    /// Payer account and system program used by `collect`
    pub fn with_payer(
        mut self,
        payer: &'a AccountInfo<'info>,
        system_program: &'a AccountInfo<'info>,
    ) -> Self {
        self.payer = Some((payer, system_program));
        self
    }

    pub fn with_recipients(mut self, recipients: &'a [AccountInfo<'info>]) -> Self {
        self.recipients = recipients;
        self
    }

    fn recipient(&self, key: &Pubkey) -> Option<&'a AccountInfo<'info>> {
        self.recipients
            .iter()
            .find(|info| info.key == key && info.is_writable)
    }
}

impl<'a, 'info> Vault for AccountVault<'a, 'info> {
    fn balance(&self) -> u64 {
        self.house.lamports().saturating_sub(self.rent_floor)
    }

    fn collect(&mut self, payer: &Pubkey, amount: u64) -> Result<(), RaffleError> {
        let (payer_info, system_program_info) = self.payer.ok_or(RaffleError::TransferFailed)?;
        if payer_info.key != payer || !payer_info.is_signer {
            return Err(RaffleError::TransferFailed);
        }
        invoke(
            &system_instruction::transfer(payer_info.key, self.house.key, amount),
            &[
                payer_info.clone(),
                self.house.clone(),
                system_program_info.clone(),
            ],
        )
        .map_err(|err| {
            msg!("Payment of {} lamports failed: {}", amount, err);
            RaffleError::TransferFailed
        })
    }

    fn disburse(&mut self, payouts: &[Payout]) -> Result<(), RaffleError> {
        let mut targets = Vec::with_capacity(payouts.len());
        let mut total = 0u64;
        for payout in payouts {
            let target = self.recipient(&payout.recipient).ok_or_else(|| {
                msg!("Recipient {} not writable or missing", payout.recipient);
                RaffleError::TransferFailed
            })?;
            total = total
                .checked_add(payout.amount)
                .ok_or(RaffleError::ArithmeticOverflow)?;
            targets.push((target, payout.amount));
        }
        if total > self.balance() {
            return Err(RaffleError::InsufficientBalance);
        }

        for (target, amount) in targets {
            let mut house_lamports = self
                .house
                .try_borrow_mut_lamports()
                .map_err(|_| RaffleError::TransferFailed)?;
            **house_lamports = house_lamports
                .checked_sub(amount)
                .ok_or(RaffleError::InsufficientBalance)?;
            drop(house_lamports);

            let mut target_lamports = target
                .try_borrow_mut_lamports()
                .map_err(|_| RaffleError::TransferFailed)?;
            **target_lamports = target_lamports
                .checked_add(amount)
                .ok_or(RaffleError::ArithmeticOverflow)?;
        }
        Ok(())
    }
}

/// Whether the current instruction is top-level or reached through CPI
pub fn entry_channel(program_id: &Pubkey, instructions: &AccountInfo) -> Result<EntryChannel, ProgramError> {
    if !sysvar::instructions::check_id(instructions.key) {
        msg!("Expected the instructions sysvar");
        return Err(ProgramError::InvalidArgument);
    }
    let current = load_current_index_checked(instructions)?;
    let top_level = load_instruction_at_checked(usize::from(current), instructions)?;
    if top_level.program_id == *program_id {
        Ok(EntryChannel::Direct)
    } else {
        Ok(EntryChannel::ExternalContract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::clock::Epoch;

    #[test]
    fn unset_source_blacklists_nobody() {
        let blacklist = AccountBlacklist::load(&Pubkey::default(), None).unwrap();
        assert!(!blacklist.is_blacklisted(&Pubkey::new_unique()));
    }

    #[test]
    fn reads_registry_entries() {
        let source = Pubkey::new_unique();
        let banned = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mut lamports = 0;
        let mut data = BlacklistAccount { entries: vec![banned] }.try_to_vec().unwrap();
        data.resize(128, 0);
        let info = AccountInfo::new(
            &source,
            false,
            false,
            &mut lamports,
            &mut data,
            &owner,
            false,
            Epoch::default(),
        );
        let blacklist = AccountBlacklist::load(&source, Some(&info)).unwrap();
        assert!(blacklist.is_blacklisted(&banned));
        assert!(!blacklist.is_blacklisted(&owner));

        let other = Pubkey::new_unique();
        assert_eq!(
            AccountBlacklist::load(&other, Some(&info)).unwrap_err(),
            ProgramError::InvalidArgument
        );
    }

    #[test]
    fn disburse_moves_lamports_or_nothing() {
        let program_id = Pubkey::new_unique();
        let house_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let missing = Pubkey::new_unique();
        let (mut house_lamports, mut winner_lamports) = (1_000u64, 0u64);
        let (mut house_data, mut winner_data) = (Vec::<u8>::new(), Vec::<u8>::new());
        let house = AccountInfo::new(
            &house_key,
            false,
            true,
            &mut house_lamports,
            &mut house_data,
            &program_id,
            false,
            Epoch::default(),
        );
        let recipients = [AccountInfo::new(
            &winner_key,
            false,
            true,
            &mut winner_lamports,
            &mut winner_data,
            &program_id,
            false,
            Epoch::default(),
        )];
        let mut vault = AccountVault::new(&house, 100).with_recipients(&recipients);
        assert_eq!(vault.balance(), 900);

        let rejected = [
            Payout { recipient: winner_key, amount: 10, kind: crate::settlement::PayoutKind::Prize },
            Payout { recipient: missing, amount: 10, kind: crate::settlement::PayoutKind::Refund },
        ];
        assert_eq!(vault.disburse(&rejected), Err(RaffleError::TransferFailed));
        assert_eq!(recipients[0].lamports(), 0);

        let prize = [Payout { recipient: winner_key, amount: 600, kind: crate::settlement::PayoutKind::Prize }];
        vault.disburse(&prize).unwrap();
        assert_eq!(recipients[0].lamports(), 600);
        assert_eq!(house.lamports(), 400);
        assert_eq!(vault.disburse(&prize), Err(RaffleError::InsufficientBalance));
    }
}
