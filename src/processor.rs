// Head-to-head raffle program - instruction processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    borsh::try_from_slice_unchecked,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
    rent::Rent,
    system_program,
    sysvar::Sysvar,
};

use crate::{
    adapters::{self, AccountBlacklist, AccountVault, SplTokenOwnership},
    error::RaffleError,
    house::{Collaborators, RaffleHouse, TokenRef},
    instruction::RaffleInstruction,
    interfaces::{BlacklistRegistry, EmptyBlacklist, EventOracle, NoTokens, TokenOwnership, Vault},
    randomness::RandomWord,
    state::{HouseConfig, HouseState, RaffleParams},
};

/// Program state handler.
pub struct Processor {}

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeHouse {
                oracle,
                destination,
            } => {
                msg!("Instruction: Initialize House");
                Self::process_initialize_house(program_id, accounts, oracle, destination)
            }
            RaffleInstruction::SetOperator { operator, enabled } => {
                msg!("Instruction: Set Operator");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house.set_operator(env, caller, operator, enabled)
                })
            }
            RaffleInstruction::SetOracle { oracle } => {
                msg!("Instruction: Set Oracle");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house.set_oracle(env, caller, oracle)
                })
            }
            RaffleInstruction::CreateRaffle(params) => {
                msg!("Instruction: Create Raffle");
                Self::process_create_raffle(program_id, accounts, params)
            }
            RaffleInstruction::BuyEntry {
                raffle_id,
                token,
                payment,
            } => {
                msg!("Instruction: Buy Entry");
                Self::process_buy_entry(program_id, accounts, raffle_id, token, payment)
            }
            RaffleInstruction::GrantFreeEntries {
                raffle_id,
                players,
                entries_each,
            } => {
                msg!("Instruction: Grant Free Entries");
                Self::process_grant_free_entries(program_id, accounts, raffle_id, players, entries_each)
            }
            RaffleInstruction::SetWinner { raffle_id } => {
                msg!("Instruction: Set Winner");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house.set_winner(env, caller, raffle_id).map(|request_id| {
                        msg!("Randomness request {} issued", request_id);
                    })
                })
            }
            RaffleInstruction::FulfillRandomness { request_id, words } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(program_id, accounts, request_id, words)
            }
            RaffleInstruction::CancelRaffle { raffle_id } => {
                msg!("Instruction: Cancel Raffle");
                Self::process_cancel_raffle(program_id, accounts, raffle_id)
            }
            RaffleInstruction::CancelEntry {
                raffle_id,
                indices,
                player,
            } => {
                msg!("Instruction: Cancel Entry");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house
                        .cancel_entry(env, caller, raffle_id, &indices, &player)
                        .map(|_| ())
                })
            }
            RaffleInstruction::ChangeBlacklistSource { source } => {
                msg!("Instruction: Change Blacklist Source");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house.change_blacklist_source(env, caller, source)
                })
            }
            RaffleInstruction::SetDestinationAddress { destination } => {
                msg!("Instruction: Set Destination Address");
                Self::process_signed(program_id, accounts, |house, env, caller| {
                    house.set_destination_address(env, caller, destination)
                })
            }
            RaffleInstruction::Withdraw { amount } => {
                msg!("Instruction: Withdraw");
                Self::process_payouts(program_id, accounts, |house, env, caller| {
                    house.withdraw(env, caller, amount)
                })
            }
        }
    }

    fn process_initialize_house(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        oracle: Pubkey,
        destination: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let house_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if house_info.owner != program_id {
            msg!("House account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let rent = Rent::get()?;
        if !rent.is_exempt(house_info.lamports(), house_info.data_len()) {
            msg!("House account must be rent exempt");
            return Err(ProgramError::AccountNotRentExempt);
        }
        let existing: HouseState = try_from_slice_unchecked(&house_info.data.borrow())
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if existing.is_initialized() {
            msg!("House account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        let state = HouseState::new(HouseConfig {
            admin: *admin_info.key,
            oracle,
            destination,
            ..HouseConfig::default()
        });
        store_house(house_info, &state)?;

        msg!(
            "House initialized: Admin={}, Oracle={}, Destination={}",
            admin_info.key,
            oracle,
            destination
        );
        Ok(())
    }

    fn process_create_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        params: RaffleParams,
    ) -> ProgramResult {
        Self::process_signed(program_id, accounts, |house, env, caller| {
            house.create_raffle(env, caller, params).map(|raffle_id| {
                msg!("Raffle id: {}", raffle_id);
            })
        })
    }

    fn process_buy_entry(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        raffle_id: u64,
        token: Option<TokenRef>,
        payment: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let buyer_info = next_account_info(account_info_iter)?;
        let house_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let instructions_info = next_account_info(account_info_iter)?;

        if !buyer_info.is_signer {
            msg!("Buyer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if system_program_info.key != &system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        let state = load_house(program_id, house_info)?;
        let channel = adapters::entry_channel(program_id, instructions_info)?;

        let blacklist = Self::load_blacklist(&state.config, account_info_iter)?;
        let tokens = match token {
            Some(_) => {
                let token_account_info = next_account_info(account_info_iter)?;
                let mint_info = next_account_info(account_info_iter)?;
                SplTokenOwnership::load(token_account_info, mint_info)?
            }
            None => SplTokenOwnership::default(),
        };
        let mut vault = AccountVault::new(house_info, rent_floor(house_info)?)
            .with_payer(buyer_info, system_program_info);

        let current_entries = execute(house_info, state, &blacklist, &tokens, &mut vault, |house, env| {
            house.buy_entry(env, buyer_info.key, channel, raffle_id, token, payment)
        })?;
        msg!("Entry purchased, raffle {} now holds {} entries", raffle_id, current_entries);
        Ok(())
    }

    fn process_grant_free_entries(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        raffle_id: u64,
        players: Vec<Pubkey>,
        entries_each: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_signer(account_info_iter)?;
        let house_info = next_account_info(account_info_iter)?;

        let state = load_house(program_id, house_info)?;
        let blacklist = Self::load_blacklist(&state.config, account_info_iter)?;
        let mut vault = AccountVault::new(house_info, rent_floor(house_info)?);

        execute(house_info, state, &blacklist, &NoTokens, &mut vault, |house, env| {
            house.grant_free_entries(env, operator_info.key, raffle_id, &players, entries_each)
        })?;
        Ok(())
    }

    fn process_fulfill_randomness(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        words: Vec<RandomWord>,
    ) -> ProgramResult {
        let now = Clock::get()?.unix_timestamp;
        Self::process_payouts(program_id, accounts, |house, env, caller| {
            house
                .on_randomness_ready(env, caller, request_id, words, now)
                .map(|outcome| match outcome {
                    Some(outcome) => msg!("Request {} settled as {:?}", request_id, outcome),
                    None => msg!("Request {} recorded", request_id),
                })
        })
    }

    fn process_cancel_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        raffle_id: u64,
    ) -> ProgramResult {
        let now = Clock::get()?.unix_timestamp;
        Self::process_payouts(program_id, accounts, |house, env, caller| {
            house.cancel_raffle(env, caller, raffle_id, now).map(|plan| {
                msg!("Raffle {} refunded {} wallets", raffle_id, plan.payouts.len());
            })
        })
    }

    /// Instructions taking only a signer and the house account
    fn process_signed<F>(program_id: &Pubkey, accounts: &[AccountInfo], operation: F) -> ProgramResult
    where
        F: FnOnce(&mut RaffleHouse, &mut Collaborators, &Pubkey) -> Result<(), RaffleError>,
    {
        let account_info_iter = &mut accounts.iter();
        let signer_info = next_signer(account_info_iter)?;
        let house_info = next_account_info(account_info_iter)?;

        let state = load_house(program_id, house_info)?;
        let mut vault = AccountVault::new(house_info, rent_floor(house_info)?);
        execute(house_info, state, &EmptyBlacklist, &NoTokens, &mut vault, |house, env| {
            operation(house, env, signer_info.key)
        })
    }

    /// Instructions paying out of the house; remaining accounts are the
    /// recipients
    fn process_payouts<F>(program_id: &Pubkey, accounts: &[AccountInfo], operation: F) -> ProgramResult
    where
        F: FnOnce(&mut RaffleHouse, &mut Collaborators, &Pubkey) -> Result<(), RaffleError>,
    {
        let account_info_iter = &mut accounts.iter();
        let signer_info = next_signer(account_info_iter)?;
        let house_info = next_account_info(account_info_iter)?;

        let state = load_house(program_id, house_info)?;
        let mut vault = AccountVault::new(house_info, rent_floor(house_info)?)
            .with_recipients(account_info_iter.as_slice());
        execute(house_info, state, &EmptyBlacklist, &NoTokens, &mut vault, |house, env| {
            operation(house, env, signer_info.key)
        })?;
        msg!("Free balance: {} lamports", vault.balance());
        Ok(())
    }

    fn load_blacklist<'a, 'info>(
        config: &HouseConfig,
        account_info_iter: &mut std::slice::Iter<'a, AccountInfo<'info>>,
    ) -> Result<AccountBlacklist, ProgramError> {
        let source_info = if config.blacklist_source == Pubkey::default() {
            None
        } else {
            Some(next_account_info(account_info_iter)?)
        };
        AccountBlacklist::load(&config.blacklist_source, source_info)
    }
}

/// Runs one engine operation against the persisted house and writes the
/// result back. Nothing is stored when the operation fails.
fn execute<T, F>(
    house_info: &AccountInfo,
    state: HouseState,
    blacklist: &dyn BlacklistRegistry,
    tokens: &dyn TokenOwnership,
    vault: &mut dyn Vault,
    operation: F,
) -> Result<T, ProgramError>
where
    F: FnOnce(&mut RaffleHouse, &mut Collaborators) -> Result<T, RaffleError>,
{
    let config = state.config.clone();
    let mut oracle = EventOracle;
    let mut env = Collaborators {
        access: &config,
        blacklist,
        tokens,
        oracle: &mut oracle,
        vault,
    };
    let mut house = RaffleHouse::new(state);

    let result = operation(&mut house, &mut env).map_err(|error| {
        msg!("Error: {}", error);
        ProgramError::from(error)
    })?;

    for event in house.take_events() {
        event.publish();
    }
    store_house(house_info, house.state())?;
    Ok(result)
}

fn next_signer<'a, 'info>(
    account_info_iter: &mut std::slice::Iter<'a, AccountInfo<'info>>,
) -> Result<&'a AccountInfo<'info>, ProgramError> {
    let signer_info = next_account_info(account_info_iter)?;
    if !signer_info.is_signer {
        msg!("{} must sign the transaction", signer_info.key);
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(signer_info)
}

fn rent_floor(house_info: &AccountInfo) -> Result<u64, ProgramError> {
    Ok(Rent::get()?.minimum_balance(house_info.data_len()))
}

/// Reads the house state, which must be initialized and owned by the program
pub fn load_house(program_id: &Pubkey, house_info: &AccountInfo) -> Result<HouseState, ProgramError> {
    if house_info.owner != program_id {
        msg!("House account must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    let state: HouseState = try_from_slice_unchecked(&house_info.data.borrow())
        .map_err(|_| ProgramError::InvalidAccountData)?;
    if !state.is_initialized() {
        return Err(RaffleError::HouseNotInitialized.into());
    }
    Ok(state)
}

fn store_house(house_info: &AccountInfo, state: &HouseState) -> ProgramResult {
    let mut data = house_info.try_borrow_mut_data()?;
    state.serialize(&mut &mut data[..]).map_err(|_| {
        msg!("House account too small for state");
        ProgramError::AccountDataTooSmall
    })
}
