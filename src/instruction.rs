// Head-to-head raffle program - instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
    sysvar,
};

use crate::{error::RaffleError, house::TokenRef, randomness::RandomWord, state::RaffleParams};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Initialize the house. The signer becomes admin.
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The house account, program owned and zeroed
    InitializeHouse {
        oracle: Pubkey,
        destination: Pubkey,
    },

    /// Grant or revoke the operator role (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The house account
    SetOperator { operator: Pubkey, enabled: bool },

    /// Replace the oracle authority (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The house account
    SetOracle { oracle: Pubkey },

    /// Open a new raffle (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    CreateRaffle(RaffleParams),

    /// Buy one entry at exactly the entry price
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The buyer
    /// 1. `[writable]` The house account
    /// 2. `[]` The system program
    /// 3. `[]` The instructions sysvar
    /// 4. `[]` The blacklist registry, only when a source is configured
    /// 5. `[]` The buyer's token account, only when `token` is set
    /// 6. `[]` The token mint, only when `token` is set
    BuyEntry {
        raffle_id: u64,
        token: Option<TokenRef>,
        payment: u64,
    },

    /// Grant free entries (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    /// 2. `[]` The blacklist registry, only when a source is configured
    GrantFreeEntries {
        raffle_id: u64,
        players: Vec<Pubkey>,
        entries_each: u64,
    },

    /// Close entries and request randomness (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    SetWinner { raffle_id: u64 },

    /// Deliver randomness and settle (oracle authority only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle authority
    /// 1. `[writable]` The house account
    /// 2.. `[writable]` Every payout recipient
    FulfillRandomness {
        request_id: u64,
        words: Vec<RandomWord>,
    },

    /// Cancel a raffle and refund live entries (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    /// 2.. `[writable]` Every refund recipient
    CancelRaffle { raffle_id: u64 },

    /// Void ledger records of one player (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    CancelEntry {
        raffle_id: u64,
        indices: Vec<u64>,
        player: Pubkey,
    },

    /// Switch the blacklist registry account (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    ChangeBlacklistSource { source: Pubkey },

    /// Set the platform fee destination (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    SetDestinationAddress { destination: Pubkey },

    /// Send free balance to the destination (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` An operator
    /// 1. `[writable]` The house account
    /// 2. `[writable]` The destination
    Withdraw { amount: u64 },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| RaffleError::InvalidInstructionData.into())
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|_| RaffleError::InvalidInstructionData.into())
    }
}

fn build(
    program_id: &Pubkey,
    instruction: RaffleInstruction,
    accounts: Vec<AccountMeta>,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: instruction.pack()?,
    })
}

fn signed_by(signer: &Pubkey, house: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*signer, true),
        AccountMeta::new(*house, false),
    ]
}

/// Creates an `InitializeHouse` instruction
pub fn initialize_house(
    program_id: &Pubkey,
    admin: &Pubkey,
    house: &Pubkey,
    oracle: &Pubkey,
    destination: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::InitializeHouse {
            oracle: *oracle,
            destination: *destination,
        },
        signed_by(admin, house),
    )
}

pub fn set_operator(
    program_id: &Pubkey,
    admin: &Pubkey,
    house: &Pubkey,
    operator: &Pubkey,
    enabled: bool,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::SetOperator {
            operator: *operator,
            enabled,
        },
        signed_by(admin, house),
    )
}

pub fn set_oracle(
    program_id: &Pubkey,
    admin: &Pubkey,
    house: &Pubkey,
    oracle: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::SetOracle { oracle: *oracle },
        signed_by(admin, house),
    )
}

pub fn create_raffle(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    params: RaffleParams,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::CreateRaffle(params),
        signed_by(operator, house),
    )
}

/// Creates a `BuyEntry` instruction. `token_account` must be given with
/// `token` for gated raffles.
#[allow(clippy::too_many_arguments)]
pub fn buy_entry(
    program_id: &Pubkey,
    buyer: &Pubkey,
    house: &Pubkey,
    raffle_id: u64,
    payment: u64,
    blacklist_source: Option<&Pubkey>,
    token: Option<TokenRef>,
    token_account: Option<&Pubkey>,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*buyer, true),
        AccountMeta::new(*house, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
    ];
    if let Some(source) = blacklist_source {
        accounts.push(AccountMeta::new_readonly(*source, false));
    }
    if let (Some(token), Some(token_account)) = (token, token_account) {
        accounts.push(AccountMeta::new_readonly(*token_account, false));
        accounts.push(AccountMeta::new_readonly(token.token_id, false));
    }
    build(
        program_id,
        RaffleInstruction::BuyEntry {
            raffle_id,
            token,
            payment,
        },
        accounts,
    )
}

pub fn grant_free_entries(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    raffle_id: u64,
    players: Vec<Pubkey>,
    entries_each: u64,
    blacklist_source: Option<&Pubkey>,
) -> Result<Instruction, ProgramError> {
    let mut accounts = signed_by(operator, house);
    if let Some(source) = blacklist_source {
        accounts.push(AccountMeta::new_readonly(*source, false));
    }
    build(
        program_id,
        RaffleInstruction::GrantFreeEntries {
            raffle_id,
            players,
            entries_each,
        },
        accounts,
    )
}

pub fn set_winner(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    raffle_id: u64,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::SetWinner { raffle_id },
        signed_by(operator, house),
    )
}

/// Creates a `FulfillRandomness` instruction. `recipients` must cover every
/// account the settlement pays.
pub fn fulfill_randomness(
    program_id: &Pubkey,
    oracle: &Pubkey,
    house: &Pubkey,
    request_id: u64,
    words: Vec<RandomWord>,
    recipients: &[Pubkey],
) -> Result<Instruction, ProgramError> {
    let mut accounts = signed_by(oracle, house);
    accounts.extend(recipients.iter().map(|key| AccountMeta::new(*key, false)));
    build(
        program_id,
        RaffleInstruction::FulfillRandomness { request_id, words },
        accounts,
    )
}

pub fn cancel_raffle(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    raffle_id: u64,
    recipients: &[Pubkey],
) -> Result<Instruction, ProgramError> {
    let mut accounts = signed_by(operator, house);
    accounts.extend(recipients.iter().map(|key| AccountMeta::new(*key, false)));
    build(
        program_id,
        RaffleInstruction::CancelRaffle { raffle_id },
        accounts,
    )
}

pub fn cancel_entry(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    raffle_id: u64,
    indices: Vec<u64>,
    player: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::CancelEntry {
            raffle_id,
            indices,
            player: *player,
        },
        signed_by(operator, house),
    )
}

pub fn change_blacklist_source(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    source: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::ChangeBlacklistSource { source: *source },
        signed_by(operator, house),
    )
}

pub fn set_destination_address(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    destination: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        RaffleInstruction::SetDestinationAddress {
            destination: *destination,
        },
        signed_by(operator, house),
    )
}

pub fn withdraw(
    program_id: &Pubkey,
    operator: &Pubkey,
    house: &Pubkey,
    destination: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let mut accounts = signed_by(operator, house);
    accounts.push(AccountMeta::new(*destination, false));
    build(program_id, RaffleInstruction::Withdraw { amount }, accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(
            RaffleInstruction::unpack(&[200, 1, 2]),
            Err(RaffleError::InvalidInstructionData.into())
        );
        assert!(RaffleInstruction::unpack(&[]).is_err());
    }

    #[test]
    fn buy_entry_lists_optional_accounts_in_order() {
        let program_id = Pubkey::new_unique();
        let (buyer, house, source) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let token = TokenRef {
            collection: Pubkey::new_unique(),
            token_id: Pubkey::new_unique(),
        };
        let holding = Pubkey::new_unique();
        let ix = buy_entry(&program_id, &buyer, &house, 3, 10, Some(&source), Some(token), Some(&holding)).unwrap();

        let keys: Vec<Pubkey> = ix.accounts.iter().map(|meta| meta.pubkey).collect();
        assert_eq!(
            keys,
            vec![buyer, house, system_program::id(), sysvar::instructions::id(), source, holding, token.token_id]
        );
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(
            RaffleInstruction::unpack(&ix.data).unwrap(),
            RaffleInstruction::BuyEntry {
                raffle_id: 3,
                token: Some(token),
                payment: 10
            }
        );
    }
}
