//! Full round lifecycle scenarios driven through the arena with a
//! simulated clock, plus one end-to-end run over the async handle with
//! real participant clients.

use ed25519_dalek::SigningKey;
use joinpool::arena::{AcceptAllCoins, Arena, ArenaHandle};
use joinpool::client::{redeemable_value, AliceClient, BobClient};
use joinpool::config::RoundConfig;
use joinpool::credentials::Credential;
use joinpool::error::ProtocolError;
use joinpool::round::{EndReason, Phase};
use joinpool::*;
use std::sync::Arc;
use std::time::Duration;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn test_config(max_input_count: usize) -> RoundConfig {
    RoundConfig {
        max_input_count,
        min_input_count_multiplier: 0.5,
        min_output_amount: 5_000,
        fee_rate: FeeRate(2),
        input_registration_timeout_secs: 100,
        connection_confirmation_timeout_secs: 100,
        output_registration_timeout_secs: 100,
        transaction_signing_timeout_secs: 100,
        ..Default::default()
    }
}

fn make_arena(cfg: RoundConfig) -> Arena {
    Arena::new(cfg, Arc::new(AcceptAllCoins)).unwrap()
}

fn make_coin(seed: u8, value: u64) -> (SigningKey, Coin) {
    let (sk, script) = keypair_from_seed(&[seed; 32]);
    let coin = Coin {
        outpoint: OutPoint { txid: hash(&[seed]), vout: 0 },
        value,
        script_pubkey: script,
    };
    (sk, coin)
}

struct Participant {
    sk: SigningKey,
    coin: Coin,
    alice_id: AliceId,
    amount: Vec<Credential>,
    vsize: Vec<Credential>,
}

/// Register and confirm the given coins, stepping the arena until the
/// round reaches output registration at `now = 2`.
fn confirmed_round(arena: &mut Arena, coins: Vec<(SigningKey, Coin)>) -> (RoundId, Vec<Participant>) {
    arena.create_round_if_needed(0);
    let round_id = arena.active_round(0).unwrap().id;

    let mut participants: Vec<Participant> = coins
        .into_iter()
        .map(|(sk, coin)| {
            let proof = sign_ownership(&sk, &round_id, &coin.outpoint);
            let alice_id = arena.register_input(0, &round_id, coin, &proof).unwrap();
            Participant { sk, coin, alice_id, amount: Vec::new(), vsize: Vec::new() }
        })
        .collect();

    arena.step(1);
    assert_eq!(
        arena.round_state(1, &round_id).unwrap().phase,
        Phase::ConnectionConfirmation
    );

    for p in &mut participants {
        let (amount, vsize) = arena.confirm_connection(&round_id, p.alice_id).unwrap();
        p.amount = amount;
        p.vsize = vsize;
    }

    arena.step(2);
    assert_eq!(
        arena.round_state(2, &round_id).unwrap().phase,
        Phase::OutputRegistration
    );

    (round_id, participants)
}

fn register_own_output(arena: &mut Arena, round_id: &RoundId, p: &Participant, dest: u8) -> u64 {
    let value = redeemable_value(&p.amount, FeeRate(2));
    arena
        .register_output(
            round_id,
            ScriptPubkey(hash(&[dest])),
            value,
            &p.amount,
            &p.vsize,
        )
        .unwrap();
    value
}

fn sign_all(arena: &mut Arena, round_id: &RoundId, participants: &[Participant]) {
    let unsigned = arena
        .round_state(3, round_id)
        .unwrap()
        .unsigned_tx
        .expect("unsigned transaction exposed in signing phase");
    let sighash = unsigned.sighash();
    for p in participants {
        arena
            .submit_witness(round_id, p.alice_id, sign_sighash(&p.sk, &sighash))
            .unwrap();
    }
}

fn assert_value_conservation(tx: &Transaction, fee_rate: FeeRate) {
    let in_sum: u64 = tx.inputs.iter().map(|i| i.value).sum();
    let out_sum: u64 = tx.outputs.iter().map(|o| o.value).sum();
    let fee = fee_rate.fee(
        tx.inputs.len() as u64 * INPUT_VSIZE + tx.outputs.len() as u64 * OUTPUT_VSIZE,
    );
    assert!(
        in_sum >= out_sum + fee,
        "inputs {} must cover outputs {} plus fee {}",
        in_sum,
        out_sum,
        fee
    );
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn all_bobs_registered_reaches_signing_with_two_outputs() {
    let cfg = test_config(2);
    let mut arena = make_arena(cfg.clone());
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    for (i, p) in participants.iter().enumerate() {
        register_own_output(&mut arena, &round_id, p, 0xA0 + i as u8);
        arena.ready_to_sign(&round_id, p.alice_id).unwrap();
    }

    arena.step(3);
    assert_eq!(
        arena.round_state(3, &round_id).unwrap().phase,
        Phase::TransactionSigning
    );

    sign_all(&mut arena, &round_id, &participants);
    arena.step(4);

    let round = arena.round(&round_id).unwrap();
    assert_eq!(round.phase(), Phase::Ended(EndReason::TransactionBroadcast));
    let tx = round.transaction().unwrap();
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(tx.outputs.len(), 2);
    assert!(!tx.outputs.iter().any(|o| o.script_pubkey == cfg.blame_script));
    assert_value_conservation(tx, cfg.fee_rate);
}

#[test]
fn missing_bob_at_timeout_pays_leftover_to_blame_script() {
    let cfg = RoundConfig { output_registration_timeout_secs: 0, ..test_config(2) };
    let mut arena = make_arena(cfg.clone());
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    // Only the first participant redeems its credit.
    register_own_output(&mut arena, &round_id, &participants[0], 0xA0);

    arena.step(3);
    assert_eq!(
        arena.round_state(3, &round_id).unwrap().phase,
        Phase::TransactionSigning
    );

    let unsigned = arena.round_state(3, &round_id).unwrap().unsigned_tx.unwrap();
    assert_eq!(unsigned.inputs.len(), 2);
    assert_eq!(unsigned.outputs.len(), 2);

    // The second output carries the unredeemed credit, minus its own fee,
    // to the blame script.
    let leftover = 80_000 - cfg.fee_rate.fee(INPUT_VSIZE);
    let blame = unsigned
        .outputs
        .iter()
        .find(|o| o.script_pubkey == cfg.blame_script)
        .expect("blame output present");
    assert_eq!(blame.value, leftover - cfg.fee_rate.fee(OUTPUT_VSIZE));
}

#[test]
fn leftover_below_minimum_is_absorbed_as_fee() {
    let mut cfg = RoundConfig { output_registration_timeout_secs: 0, ..test_config(3) };
    cfg.min_input_count_multiplier = 0.5;
    let mut arena = make_arena(cfg.clone());

    // The third coin is worth exactly one minimum output after fees, so
    // its unredeemed credit stays below the blame threshold (minimum
    // output plus the blame output's own fee).
    let small = cfg.fee_rate.fee(INPUT_VSIZE) + cfg.min_output_amount;
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000), make_coin(3, small)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    register_own_output(&mut arena, &round_id, &participants[0], 0xA0);
    register_own_output(&mut arena, &round_id, &participants[1], 0xA1);

    arena.step(3);
    let unsigned = arena.round_state(3, &round_id).unwrap().unsigned_tx.unwrap();
    assert_eq!(unsigned.inputs.len(), 3);
    assert_eq!(unsigned.outputs.len(), 2);
    assert!(!unsigned.outputs.iter().any(|o| o.script_pubkey == cfg.blame_script));

    let tx_stub = Transaction {
        inputs: unsigned.inputs.clone(),
        outputs: unsigned.outputs.clone(),
        witnesses: Vec::new(),
    };
    assert_value_conservation(&tx_stub, cfg.fee_rate);
}

#[test]
fn partial_readiness_without_timeout_does_not_advance() {
    let cfg = test_config(2);
    let mut arena = make_arena(cfg);
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    register_own_output(&mut arena, &round_id, &participants[0], 0xA0);
    arena.ready_to_sign(&round_id, participants[0].alice_id).unwrap();

    // Deadline is at now = 102; stepping before it must not advance.
    arena.step(50);
    assert_eq!(
        arena.round_state(50, &round_id).unwrap().phase,
        Phase::OutputRegistration
    );
}

#[test]
fn sub_quorum_round_aborts_and_never_reaches_output_registration() {
    let cfg = RoundConfig {
        min_input_count_multiplier: 1.0,
        input_registration_timeout_secs: 10,
        ..test_config(2)
    };
    let mut arena = make_arena(cfg);
    arena.create_round_if_needed(0);
    let round_id = arena.active_round(0).unwrap().id;

    let (sk, coin) = make_coin(1, 100_000);
    let proof = sign_ownership(&sk, &round_id, &coin.outpoint);
    arena.register_input(0, &round_id, coin, &proof).unwrap();

    arena.step(5);
    assert_eq!(
        arena.round_state(5, &round_id).unwrap().phase,
        Phase::InputRegistration
    );

    arena.step(10);
    assert_eq!(
        arena.round_state(10, &round_id).unwrap().phase,
        Phase::Ended(EndReason::AbortedInsufficientQuorum)
    );
}

#[test]
fn credentials_cannot_fund_two_outputs() {
    let cfg = test_config(2);
    let mut arena = make_arena(cfg);
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    let p = &participants[0];
    register_own_output(&mut arena, &round_id, p, 0xA0);

    // The second participant's credit is still unredeemed, so a modest
    // second output fits the balance; only the spent serials stop it.
    let second = arena.register_output(
        &round_id,
        ScriptPubkey(hash(b"elsewhere")),
        10_000,
        &p.amount,
        &p.vsize,
    );
    assert_eq!(second, Err(ProtocolError::CredentialAlreadySpent));
}

#[test]
fn signing_timeout_aborts_and_bans_non_signers() {
    let cfg = RoundConfig {
        output_registration_timeout_secs: 0,
        transaction_signing_timeout_secs: 10,
        blame_ban_secs: 1_000,
        ..test_config(2)
    };
    let mut arena = make_arena(cfg);
    let coins = vec![make_coin(1, 100_000), make_coin(2, 80_000)];
    let (round_id, participants) = confirmed_round(&mut arena, coins);

    register_own_output(&mut arena, &round_id, &participants[0], 0xA0);
    arena.step(3);
    assert_eq!(
        arena.round_state(3, &round_id).unwrap().phase,
        Phase::TransactionSigning
    );

    // Only the first participant signs.
    let unsigned = arena.round_state(3, &round_id).unwrap().unsigned_tx.unwrap();
    let sighash = unsigned.sighash();
    arena
        .submit_witness(
            &round_id,
            participants[0].alice_id,
            sign_sighash(&participants[0].sk, &sighash),
        )
        .unwrap();

    arena.step(13);
    assert_eq!(
        arena.round_state(13, &round_id).unwrap().phase,
        Phase::Ended(EndReason::AbortedNotAllSigned)
    );

    // The defector's coin is refused in the next round; the honest
    // participant may register again.
    arena.create_round_if_needed(14);
    let next_round = arena.active_round(14).unwrap().id;

    let defector = &participants[1];
    let proof = sign_ownership(&defector.sk, &next_round, &defector.coin.outpoint);
    assert!(matches!(
        arena.register_input(14, &next_round, defector.coin, &proof),
        Err(ProtocolError::InputBanned { .. })
    ));

    let honest = &participants[0];
    let proof = sign_ownership(&honest.sk, &next_round, &honest.coin.outpoint);
    arena.register_input(14, &next_round, honest.coin, &proof).unwrap();
}

// ─── End-to-end over the async handle ───────────────────────────────────────

#[tokio::test]
async fn clients_complete_a_round_end_to_end() {
    let cfg = RoundConfig {
        input_registration_timeout_secs: 60,
        connection_confirmation_timeout_secs: 60,
        output_registration_timeout_secs: 60,
        transaction_signing_timeout_secs: 60,
        ..test_config(2)
    };
    let fee_rate = cfg.fee_rate;
    let handle = ArenaHandle::new(Arena::new(cfg, Arc::new(AcceptAllCoins)).unwrap());
    let ticker = handle.spawn_step_loop(Duration::from_millis(20));

    // Wait for the first round to open.
    let round_id = loop {
        if let Some(state) = joinpool::client::Coordinator::active_round(&handle).await.unwrap() {
            break state.id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let run_participant = |seed: u8, value: u64, dest: u8| {
        let handle = handle.clone();
        async move {
            let (sk, coin) = {
                let (sk, script) = keypair_from_seed(&[seed; 32]);
                let coin = Coin {
                    outpoint: OutPoint { txid: hash(&[seed]), vout: 0 },
                    value,
                    script_pubkey: script,
                };
                (sk, coin)
            };
            let mut alice = AliceClient::new(&handle, sk, coin, round_id)
                .with_timing(Duration::from_millis(20), Duration::from_secs(10));
            alice.register().await.unwrap();
            alice.confirm_connection().await.unwrap();
            alice.await_phase(Phase::OutputRegistration).await.unwrap();

            let (amount, vsize) = alice.credentials();
            let out_value = redeemable_value(amount, fee_rate);
            let bob = BobClient::new(&handle, round_id);
            bob.register_output(
                ScriptPubkey(hash(&[dest])),
                out_value,
                amount.to_vec(),
                vsize.to_vec(),
            )
            .await
            .unwrap();

            alice.ready_to_sign().await.unwrap();
            alice.sign().await.unwrap();
            alice
                .await_phase(Phase::Ended(EndReason::TransactionBroadcast))
                .await
                .unwrap()
        }
    };

    let (end1, end2) = tokio::join!(
        run_participant(1, 100_000, 0xA0),
        run_participant(2, 80_000, 0xA1)
    );

    assert_eq!(end1.phase, Phase::Ended(EndReason::TransactionBroadcast));
    assert_eq!(end2.phase, Phase::Ended(EndReason::TransactionBroadcast));
    assert!(end1.txid.is_some());
    assert_eq!(end1.txid, end2.txid);

    let unsigned = end1.unsigned_tx.unwrap();
    assert_eq!(unsigned.inputs.len(), 2);
    assert_eq!(unsigned.outputs.len(), 2);

    ticker.abort();
}
