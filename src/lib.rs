// Head-to-head raffle program
// Capped raffles with oracle-drawn winners, paid out of a single house account

// Engine
pub mod error;
pub mod events;
pub mod guard;
pub mod house;
pub mod interfaces;
pub mod ledger;
pub mod lifecycle;
pub mod randomness;
pub mod resolver;
pub mod settlement;
pub mod state;

// On-chain program
pub mod adapters;
pub mod instruction;
pub mod processor;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

// Exposed for program-test harnesses and CPI callers built with `no-entrypoint`
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
