use solana_program::{borsh::try_from_slice_unchecked, native_token::LAMPORTS_PER_SOL};
use solana_program_test::*;
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    rent::Rent,
    signature::{Keypair, Signer},
    system_program,
    transaction::{Transaction, TransactionError},
};

use head2head::{
    error::RaffleError,
    instruction,
    process_instruction,
    randomness::word_from_u64,
    state::{EntryType, HouseState, RaffleParams, RaffleStatus},
};

const HOUSE_SPACE: usize = 10_000;
const STARTING_BALANCE: u64 = 10 * LAMPORTS_PER_SOL;

struct Harness {
    banks_client: BanksClient,
    payer: Keypair,
    recent_blockhash: Hash,
    program_id: Pubkey,
    house: Pubkey,
    oracle: Keypair,
    destination: Pubkey,
    buyers: Vec<Keypair>,
}

impl Harness {
    async fn send(&mut self, instruction: Instruction, signers: &[&Keypair]) -> Result<(), BanksClientError> {
        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&self.payer.pubkey()));
        let mut all_signers = vec![&self.payer];
        all_signers.extend_from_slice(signers);
        transaction.sign(&all_signers, self.recent_blockhash);
        self.banks_client.process_transaction(transaction).await
    }

    async fn house_state(&mut self) -> HouseState {
        let account = self.banks_client.get_account(self.house).await.unwrap().unwrap();
        try_from_slice_unchecked(&account.data).unwrap()
    }

    async fn balance(&mut self, key: Pubkey) -> u64 {
        self.banks_client.get_balance(key).await.unwrap()
    }
}

// Starts a bank with a zeroed house account and funded buyers
async fn setup(buyer_count: usize) -> Harness {
    let program_id = Pubkey::new_unique();
    let mut program_test = ProgramTest::new("head2head", program_id, processor!(process_instruction));

    let house = Pubkey::new_unique();
    program_test.add_account(
        house,
        Account {
            lamports: Rent::default().minimum_balance(HOUSE_SPACE),
            data: vec![0; HOUSE_SPACE],
            owner: program_id,
            executable: false,
            rent_epoch: 0,
        },
    );
    let buyers: Vec<Keypair> = (0..buyer_count).map(|_| Keypair::new()).collect();
    for buyer in &buyers {
        program_test.add_account(
            buyer.pubkey(),
            Account {
                lamports: STARTING_BALANCE,
                data: vec![],
                owner: system_program::id(),
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    let (banks_client, payer, recent_blockhash) = program_test.start().await;
    Harness {
        banks_client,
        payer,
        recent_blockhash,
        program_id,
        house,
        oracle: Keypair::new(),
        destination: Pubkey::new_unique(),
        buyers,
    }
}

// Initializes the house with the payer as admin and operator, then opens
// a raffle with the given cap
async fn open_raffle(harness: &mut Harness, entry_cap: u64) {
    let admin = harness.payer.pubkey();
    let ix = instruction::initialize_house(
        &harness.program_id,
        &admin,
        &harness.house,
        &harness.oracle.pubkey(),
        &harness.destination,
    )
    .unwrap();
    harness.send(ix, &[]).await.unwrap();

    let ix = instruction::set_operator(&harness.program_id, &admin, &harness.house, &admin, true).unwrap();
    harness.send(ix, &[]).await.unwrap();

    let params = RaffleParams {
        prize_amount: 3 * LAMPORTS_PER_SOL / 2,
        unfulfilled_amount: 6 * LAMPORTS_PER_SOL / 10,
        price: LAMPORTS_PER_SOL,
        collection_whitelist: vec![],
        entry_type: EntryType::OnlyDirectly,
        entry_cap,
    };
    let ix = instruction::create_raffle(&harness.program_id, &admin, &harness.house, params).unwrap();
    harness.send(ix, &[]).await.unwrap();
}

async fn buy(harness: &mut Harness, buyer_index: usize) -> Result<(), BanksClientError> {
    let buyer = Keypair::from_bytes(&harness.buyers[buyer_index].to_bytes()).unwrap();
    let ix = instruction::buy_entry(
        &harness.program_id,
        &buyer.pubkey(),
        &harness.house,
        0,
        LAMPORTS_PER_SOL,
        None,
        None,
        None,
    )
    .unwrap();
    harness.send(ix, &[&buyer]).await
}

async fn close(harness: &mut Harness) {
    let operator = harness.payer.pubkey();
    let ix = instruction::set_winner(&harness.program_id, &operator, &harness.house, 0).unwrap();
    harness.send(ix, &[]).await.unwrap();
}

fn custom(error: RaffleError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

#[tokio::test]
async fn test_full_raffle_settles_on_chain() {
    let mut harness = setup(2).await;
    open_raffle(&mut harness, 2).await;
    buy(&mut harness, 0).await.unwrap();
    buy(&mut harness, 1).await.unwrap();
    close(&mut harness).await;

    let winner = harness.buyers[0].pubkey();
    let destination = harness.destination;
    let oracle = Keypair::from_bytes(&harness.oracle.to_bytes()).unwrap();
    let ix = instruction::fulfill_randomness(
        &harness.program_id,
        &oracle.pubkey(),
        &harness.house,
        0,
        vec![word_from_u64(0)],
        &[winner, destination],
    )
    .unwrap();
    harness.send(ix, &[&oracle]).await.unwrap();

    assert_eq!(harness.balance(winner).await, STARTING_BALANCE + LAMPORTS_PER_SOL / 2);
    assert_eq!(harness.balance(destination).await, LAMPORTS_PER_SOL / 2);
    assert_eq!(
        harness.balance(harness.house).await,
        Rent::default().minimum_balance(HOUSE_SPACE)
    );

    let state = harness.house_state().await;
    let raffle = state.raffle(0).unwrap();
    assert_eq!(raffle.status, RaffleStatus::Ended);
    assert_eq!(raffle.winner, Some(winner));
    assert!(state.requests.get(0).unwrap().fulfilled);
}

#[tokio::test]
async fn test_unfulfilled_raffle_pays_bonus() {
    let mut harness = setup(1).await;
    open_raffle(&mut harness, 2).await;
    buy(&mut harness, 0).await.unwrap();
    close(&mut harness).await;

    let buyer = harness.buyers[0].pubkey();
    let oracle = Keypair::from_bytes(&harness.oracle.to_bytes()).unwrap();
    let ix = instruction::fulfill_randomness(
        &harness.program_id,
        &oracle.pubkey(),
        &harness.house,
        0,
        vec![word_from_u64(5)],
        &[buyer],
    )
    .unwrap();
    harness.send(ix, &[&oracle]).await.unwrap();

    assert_eq!(
        harness.balance(buyer).await,
        STARTING_BALANCE - LAMPORTS_PER_SOL + 6 * LAMPORTS_PER_SOL / 10
    );
    let state = harness.house_state().await;
    assert_eq!(state.raffle(0).unwrap().status, RaffleStatus::Unfulfilled);
}

#[tokio::test]
async fn test_only_oracle_fulfills() {
    let mut harness = setup(1).await;
    open_raffle(&mut harness, 2).await;
    buy(&mut harness, 0).await.unwrap();
    close(&mut harness).await;

    let impostor = Keypair::from_bytes(&harness.buyers[0].to_bytes()).unwrap();
    let ix = instruction::fulfill_randomness(
        &harness.program_id,
        &impostor.pubkey(),
        &harness.house,
        0,
        vec![word_from_u64(0)],
        &[impostor.pubkey()],
    )
    .unwrap();
    let err = harness.send(ix, &[&impostor]).await.unwrap_err();
    assert_eq!(err.unwrap(), custom(RaffleError::Unauthorized));

    let state = harness.house_state().await;
    assert_eq!(state.raffle(0).unwrap().status, RaffleStatus::ClosingRequested);
}

#[tokio::test]
async fn test_second_purchase_is_rejected() {
    let mut harness = setup(1).await;
    open_raffle(&mut harness, 3).await;
    buy(&mut harness, 0).await.unwrap();

    // Distinct blockhash so the retry is not deduplicated
    harness.recent_blockhash = harness
        .banks_client
        .get_new_latest_blockhash(&harness.recent_blockhash)
        .await
        .unwrap();
    let err = buy(&mut harness, 0).await.unwrap_err();
    assert_eq!(err.unwrap(), custom(RaffleError::AlreadyParticipated));

    let buyer = harness.buyers[0].pubkey();
    assert_eq!(harness.balance(buyer).await, STARTING_BALANCE - LAMPORTS_PER_SOL);
    let state = harness.house_state().await;
    assert_eq!(state.raffle(0).unwrap().entry_count, 1);
    assert!(state.has_participated(0, &buyer));
}

#[tokio::test]
async fn test_house_initializes_once() {
    let mut harness = setup(0).await;
    open_raffle(&mut harness, 2).await;

    harness.recent_blockhash = harness
        .banks_client
        .get_new_latest_blockhash(&harness.recent_blockhash)
        .await
        .unwrap();
    let admin = harness.payer.pubkey();
    let ix = instruction::initialize_house(
        &harness.program_id,
        &admin,
        &harness.house,
        &admin,
        &admin,
    )
    .unwrap();
    let err = harness.send(ix, &[]).await.unwrap_err();
    assert_eq!(
        err.unwrap(),
        TransactionError::InstructionError(0, InstructionError::AccountAlreadyInitialized)
    );
}
