//! A single coinjoin round: phase state machine, registered inputs, and
//! the client-facing protocol operations.
//!
//! Client calls only mutate round data; phase transitions are committed
//! exclusively by the arena's step function, so two concurrent
//! evaluations can never double-advance a round.

use crate::builder::{AmountRange, CoinjoinState, ConstructionState, TxParams};
use crate::config::RoundConfig;
use crate::credentials::{Credential, CredentialIssuer, CredentialKind};
use crate::error::ProtocolError;
use crate::types::{
    AliceId, Coin, FeeRate, OutPoint, RoundId, ScriptPubkey, Transaction, UnsignedTransaction,
    verify_ownership, INPUT_VSIZE, OUTPUT_VSIZE,
};
use serde::{Deserialize, Serialize};

/// Why a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// All witnesses collected, transaction assembled.
    TransactionBroadcast,
    /// Too few inputs at the input-registration or confirmation deadline.
    AbortedInsufficientQuorum,
    /// Signing deadline passed with witnesses missing.
    AbortedNotAllSigned,
}

/// Round lifecycle. Strictly forward-ordered; `Ended` is terminal and
/// can be reached from any phase by aborting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    InputRegistration,
    ConnectionConfirmation,
    OutputRegistration,
    TransactionSigning,
    Ended(EndReason),
}

impl Phase {
    /// Position in the forward phase order; `Ended` sorts last.
    pub fn order(self) -> u8 {
        match self {
            Phase::InputRegistration => 0,
            Phase::ConnectionConfirmation => 1,
            Phase::OutputRegistration => 2,
            Phase::TransactionSigning => 3,
            Phase::Ended(_) => 4,
        }
    }
}

/// One registered input and its owner's per-round state.
#[derive(Clone, Debug)]
pub struct Alice {
    pub id: AliceId,
    pub coin: Coin,
    pub confirmed: bool,
    pub ready_to_sign: bool,
    pub issued_amount_credentials: Vec<Credential>,
    pub issued_vsize_credentials: Vec<Credential>,
}

/// Point-in-time view of a round served to status queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundStateSnapshot {
    pub id: RoundId,
    pub phase: Phase,
    pub input_count: usize,
    pub confirmed_count: usize,
    pub max_input_count: usize,
    pub min_input_count: usize,
    pub min_output_amount: u64,
    pub max_output_amount: u64,
    pub fee_rate: FeeRate,
    /// Seconds until the current phase times out. Zero once ended.
    pub remaining_secs: u64,
    /// Present from the signing phase on.
    pub unsigned_tx: Option<UnsignedTransaction>,
    /// Present once the round ended with a broadcast transaction.
    pub txid: Option<[u8; 32]>,
}

/// Result of one step evaluation: outpoints to ban for refusing to sign.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub banned: Vec<OutPoint>,
}

pub struct Round {
    id: RoundId,
    cfg: RoundConfig,
    phase: Phase,
    phase_start: u64,
    alices: Vec<Alice>,
    coinjoin: CoinjoinState,
    issuer: CredentialIssuer,
    final_tx: Option<Transaction>,
}

impl Round {
    pub fn new(cfg: RoundConfig, now: u64) -> Self {
        let id: RoundId = rand::random();
        let params = TxParams {
            max_input_count: cfg.max_input_count,
            allowed_output_amounts: AmountRange {
                min: cfg.min_output_amount,
                max: cfg.max_output_amount,
            },
            fee_rate: cfg.fee_rate,
        };
        tracing::info!(round = %hex::encode(id), "round created");
        Self {
            id,
            cfg,
            phase: Phase::InputRegistration,
            phase_start: now,
            alices: Vec::new(),
            coinjoin: CoinjoinState::Construction(ConstructionState::new(params)),
            issuer: CredentialIssuer::new(id),
            final_tx: None,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn alice_count(&self) -> usize {
        self.alices.len()
    }

    /// The assembled transaction, once the round ended successfully.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.final_tx.as_ref()
    }

    fn require_phase(&self, phase: Phase) -> Result<(), ProtocolError> {
        if self.phase != phase {
            return Err(ProtocolError::WrongPhase(self.phase));
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase, now: u64) {
        tracing::info!(
            round = %hex::encode(self.id),
            from = ?self.phase,
            to = ?phase,
            "phase change"
        );
        self.phase = phase;
        self.phase_start = now;
    }

    fn phase_timeout(&self) -> u64 {
        match self.phase {
            Phase::InputRegistration => self.cfg.input_registration_timeout_secs,
            Phase::ConnectionConfirmation => self.cfg.connection_confirmation_timeout_secs,
            Phase::OutputRegistration => self.cfg.output_registration_timeout_secs,
            Phase::TransactionSigning => self.cfg.transaction_signing_timeout_secs,
            Phase::Ended(_) => 0,
        }
    }

    fn phase_timed_out(&self, now: u64) -> bool {
        now >= self.phase_start + self.phase_timeout()
    }

    /// Amount credit an input is worth after paying its own fee.
    fn amount_credit(&self, coin: &Coin) -> u64 {
        coin.value.saturating_sub(self.cfg.fee_rate.fee(INPUT_VSIZE))
    }

    // ─── Client-facing operations ───────────────────────────────────────

    /// Register a coin into the round. Creates an Alice; the input joins
    /// the transaction only at connection confirmation.
    pub fn register_input(
        &mut self,
        coin: Coin,
        ownership_proof: &[u8],
    ) -> Result<AliceId, ProtocolError> {
        self.require_phase(Phase::InputRegistration)?;
        if self.alices.len() >= self.cfg.max_input_count {
            return Err(ProtocolError::InputOutOfRange(format!(
                "round is full ({} inputs)",
                self.cfg.max_input_count
            )));
        }
        if self.alices.iter().any(|a| a.coin.outpoint == coin.outpoint) {
            return Err(ProtocolError::DuplicateRegistration);
        }
        if self.amount_credit(&coin) < self.cfg.min_output_amount {
            return Err(ProtocolError::InputOutOfRange(format!(
                "coin value {} cannot cover its fee share plus a minimum output",
                coin.value
            )));
        }
        if !verify_ownership(&coin.script_pubkey, &self.id, &coin.outpoint, ownership_proof) {
            return Err(ProtocolError::InvalidOwnershipProof);
        }
        let alice = Alice {
            id: rand::random(),
            coin,
            confirmed: false,
            ready_to_sign: false,
            issued_amount_credentials: Vec::new(),
            issued_vsize_credentials: Vec::new(),
        };
        let id = alice.id;
        self.alices.push(alice);
        tracing::debug!(
            round = %hex::encode(self.id),
            alice = %hex::encode(id),
            inputs = self.alices.len(),
            "input registered"
        );
        Ok(id)
    }

    /// Prove liveness and collect credentials. Adds the coin to the
    /// builder and issues amount credentials worth the coin value minus
    /// the input fee, plus vsize credentials for the remaining allocation.
    pub fn confirm_connection(
        &mut self,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>), ProtocolError> {
        self.require_phase(Phase::ConnectionConfirmation)?;
        let alice = self
            .alices
            .iter()
            .position(|a| a.id == alice_id)
            .ok_or(ProtocolError::AliceNotFound)?;
        if self.alices[alice].confirmed {
            return Err(ProtocolError::DuplicateRegistration);
        }

        let coin = self.alices[alice].coin;
        let next = self.coinjoin.construction()?.add_input(coin)?;
        self.coinjoin = CoinjoinState::Construction(next);

        let amount = self.issuer.issue(CredentialKind::Amount, self.amount_credit(&coin));
        let vsize = self.issuer.issue(
            CredentialKind::Vsize,
            self.cfg.max_vsize_allocation_per_alice - INPUT_VSIZE,
        );
        let alice = &mut self.alices[alice];
        alice.confirmed = true;
        alice.issued_amount_credentials = amount.clone();
        alice.issued_vsize_credentials = vsize.clone();
        tracing::debug!(
            round = %hex::encode(self.id),
            alice = %hex::encode(alice_id),
            "connection confirmed"
        );
        Ok((amount, vsize))
    }

    /// Register an output paid for with credentials. Any holder of valid
    /// credentials may call this; no link to the funding input is known
    /// or checked.
    pub fn register_output(
        &mut self,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: &[Credential],
        vsize_credentials: &[Credential],
    ) -> Result<(), ProtocolError> {
        self.require_phase(Phase::OutputRegistration)?;

        // Build the candidate state first: an invalid output must fail
        // before any credential is consumed.
        let candidate = self.coinjoin.construction()?.add_output(script_pubkey, value)?;

        // Verify both groups before spending either, so a rejection in
        // the second dimension never burns serials from the first.
        let required_amount = value + self.cfg.fee_rate.fee(OUTPUT_VSIZE);
        self.issuer.verify(CredentialKind::Amount, amount_credentials, required_amount)?;
        self.issuer.verify(CredentialKind::Vsize, vsize_credentials, OUTPUT_VSIZE)?;
        self.issuer.consume(amount_credentials);
        self.issuer.consume(vsize_credentials);

        self.coinjoin = CoinjoinState::Construction(candidate);
        tracing::debug!(round = %hex::encode(self.id), value, "output registered");
        Ok(())
    }

    /// Signal that this Alice's outputs are all registered. Idempotent.
    pub fn ready_to_sign(&mut self, alice_id: AliceId) -> Result<(), ProtocolError> {
        self.require_phase(Phase::OutputRegistration)?;
        let alice = self
            .alices
            .iter_mut()
            .find(|a| a.id == alice_id)
            .ok_or(ProtocolError::AliceNotFound)?;
        alice.ready_to_sign = true;
        Ok(())
    }

    /// Submit the witness for this Alice's input.
    pub fn submit_witness(
        &mut self,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.require_phase(Phase::TransactionSigning)?;
        let coin = self
            .alices
            .iter()
            .find(|a| a.id == alice_id)
            .map(|a| a.coin)
            .ok_or(ProtocolError::AliceNotFound)?;
        let signing = self.coinjoin.signing()?;
        let index = signing.input_index(&coin.outpoint).ok_or(ProtocolError::InvalidWitness)?;
        let next = signing.add_witness(index, witness)?;
        self.coinjoin = CoinjoinState::Signing(next);
        Ok(())
    }

    /// Confirmed Alices still holding issued credentials that were
    /// never presented back.
    pub fn unredeemed_alice_count(&self) -> usize {
        self.alices
            .iter()
            .filter(|a| {
                a.issued_amount_credentials
                    .iter()
                    .chain(&a.issued_vsize_credentials)
                    .any(|c| c.value > 0 && !self.issuer.is_spent(&c.serial))
            })
            .count()
    }

    pub fn state_snapshot(&self, now: u64) -> RoundStateSnapshot {
        let deadline = self.phase_start + self.phase_timeout();
        RoundStateSnapshot {
            id: self.id,
            phase: self.phase,
            input_count: self.alices.len(),
            confirmed_count: self.alices.iter().filter(|a| a.confirmed).count(),
            max_input_count: self.cfg.max_input_count,
            min_input_count: self.cfg.min_input_count(),
            min_output_amount: self.cfg.min_output_amount,
            max_output_amount: self.cfg.max_output_amount,
            fee_rate: self.cfg.fee_rate,
            remaining_secs: deadline.saturating_sub(now),
            unsigned_tx: self
                .coinjoin
                .signing()
                .ok()
                .map(|s| s.unsigned_transaction()),
            txid: self.final_tx.as_ref().map(|tx| tx.txid()),
        }
    }

    // ─── Phase stepping (arena-only) ────────────────────────────────────

    /// Evaluate this round's transition predicate once and commit at most
    /// one phase change. Called only from the arena's step loop.
    pub fn step(&mut self, now: u64) -> Result<StepOutcome, ProtocolError> {
        match self.phase {
            Phase::InputRegistration => self.step_input_registration(now),
            Phase::ConnectionConfirmation => self.step_connection_confirmation(now),
            Phase::OutputRegistration => self.step_output_registration(now),
            Phase::TransactionSigning => self.step_transaction_signing(now),
            Phase::Ended(_) => Ok(StepOutcome::default()),
        }
    }

    fn step_input_registration(&mut self, now: u64) -> Result<StepOutcome, ProtocolError> {
        if self.alices.len() >= self.cfg.max_input_count {
            self.set_phase(Phase::ConnectionConfirmation, now);
        } else if self.phase_timed_out(now) {
            if self.alices.len() >= self.cfg.min_input_count() {
                self.set_phase(Phase::ConnectionConfirmation, now);
            } else {
                tracing::warn!(
                    round = %hex::encode(self.id),
                    have = self.alices.len(),
                    need = self.cfg.min_input_count(),
                    "aborting: not enough inputs at registration deadline"
                );
                self.set_phase(Phase::Ended(EndReason::AbortedInsufficientQuorum), now);
            }
        }
        Ok(StepOutcome::default())
    }

    fn step_connection_confirmation(&mut self, now: u64) -> Result<StepOutcome, ProtocolError> {
        let all_confirmed = self.alices.iter().all(|a| a.confirmed);
        if all_confirmed {
            self.set_phase(Phase::OutputRegistration, now);
        } else if self.phase_timed_out(now) {
            let before = self.alices.len();
            self.alices.retain(|a| a.confirmed);
            if before > self.alices.len() {
                tracing::warn!(
                    round = %hex::encode(self.id),
                    dropped = before - self.alices.len(),
                    "dropped unconfirmed inputs at confirmation deadline"
                );
            }
            if self.alices.len() >= self.cfg.min_input_count() {
                self.set_phase(Phase::OutputRegistration, now);
            } else {
                self.set_phase(Phase::Ended(EndReason::AbortedInsufficientQuorum), now);
            }
        }
        Ok(StepOutcome::default())
    }

    fn step_output_registration(&mut self, now: u64) -> Result<StepOutcome, ProtocolError> {
        let construction = self.coinjoin.construction()?;
        let leftover = construction.balance();
        let blame_fee = self.cfg.fee_rate.fee(OUTPUT_VSIZE);
        // Below this there is no blameable credit outstanding: whatever
        // remains cannot form an allowed output and is absorbed as fee.
        let blame_threshold = (self.cfg.min_output_amount + blame_fee) as i128;
        let all_ready = !self.alices.is_empty() && self.alices.iter().all(|a| a.ready_to_sign);

        let signing = if self.phase_timed_out(now) {
            let mut state = construction.clone();
            if leftover >= blame_threshold {
                let value = (leftover as u64 - blame_fee).min(self.cfg.max_output_amount);
                state = state.add_output(self.cfg.blame_script, value)?;
                tracing::info!(
                    round = %hex::encode(self.id),
                    value,
                    alices = self.unredeemed_alice_count(),
                    "unredeemed credit paid to blame script"
                );
            } else if leftover > 0 {
                tracing::info!(
                    round = %hex::encode(self.id),
                    leftover,
                    "leftover below minimum output, absorbed as fee"
                );
            }
            state.finalize()?
        } else if all_ready && leftover < blame_threshold {
            construction.finalize()?
        } else {
            return Ok(StepOutcome::default());
        };

        self.coinjoin = CoinjoinState::Signing(signing);
        self.set_phase(Phase::TransactionSigning, now);
        Ok(StepOutcome::default())
    }

    fn step_transaction_signing(&mut self, now: u64) -> Result<StepOutcome, ProtocolError> {
        let signing = self.coinjoin.signing()?;
        if signing.is_fully_signed() {
            let tx = signing.create_transaction()?;
            tracing::info!(
                round = %hex::encode(self.id),
                txid = %hex::encode(tx.txid()),
                inputs = tx.inputs.len(),
                outputs = tx.outputs.len(),
                "transaction fully signed, broadcasting"
            );
            self.final_tx = Some(tx);
            self.set_phase(Phase::Ended(EndReason::TransactionBroadcast), now);
            return Ok(StepOutcome::default());
        }
        if self.phase_timed_out(now) {
            let banned: Vec<OutPoint> = self
                .alices
                .iter()
                .filter(|a| {
                    signing
                        .input_index(&a.coin.outpoint)
                        .map_or(false, |i| !signing.is_input_signed(i))
                })
                .map(|a| a.coin.outpoint)
                .collect();
            tracing::warn!(
                round = %hex::encode(self.id),
                blamed = banned.len(),
                "aborting: signing deadline passed"
            );
            self.set_phase(Phase::Ended(EndReason::AbortedNotAllSigned), now);
            return Ok(StepOutcome { banned });
        }
        Ok(StepOutcome::default())
    }

    /// True once the arena may evict this round.
    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.phase, Phase::Ended(_))
            && now >= self.phase_start + self.cfg.round_expiry_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{hash, keypair_from_seed, sign_ownership};
    use ed25519_dalek::SigningKey;

    fn test_config() -> RoundConfig {
        RoundConfig {
            max_input_count: 2,
            min_input_count_multiplier: 0.5,
            input_registration_timeout_secs: 100,
            connection_confirmation_timeout_secs: 100,
            output_registration_timeout_secs: 100,
            transaction_signing_timeout_secs: 100,
            ..Default::default()
        }
    }

    fn coin(seed: u8, value: u64) -> (SigningKey, Coin) {
        let (sk, script) = keypair_from_seed(&[seed; 32]);
        let coin = Coin {
            outpoint: OutPoint { txid: hash(&[seed]), vout: 0 },
            value,
            script_pubkey: script,
        };
        (sk, coin)
    }

    fn register(round: &mut Round, sk: &SigningKey, c: Coin) -> AliceId {
        let proof = sign_ownership(sk, &round.id(), &c.outpoint);
        round.register_input(c, &proof).unwrap()
    }

    #[test]
    fn rejects_duplicate_coin() {
        let mut round = Round::new(test_config(), 0);
        let (sk, c) = coin(1, 100_000);
        register(&mut round, &sk, c);
        let proof = sign_ownership(&sk, &round.id(), &c.outpoint);
        assert_eq!(
            round.register_input(c, &proof),
            Err(ProtocolError::DuplicateRegistration)
        );
    }

    #[test]
    fn rejects_bad_ownership_proof() {
        let mut round = Round::new(test_config(), 0);
        let (_, c) = coin(1, 100_000);
        let (other, _) = keypair_from_seed(&[9; 32]);
        let proof = sign_ownership(&other, &round.id(), &c.outpoint);
        assert_eq!(
            round.register_input(c, &proof),
            Err(ProtocolError::InvalidOwnershipProof)
        );
    }

    #[test]
    fn rejects_coin_below_minimum_credit() {
        let mut round = Round::new(test_config(), 0);
        let (sk, c) = coin(1, 200);
        let proof = sign_ownership(&sk, &round.id(), &c.outpoint);
        assert!(matches!(
            round.register_input(c, &proof),
            Err(ProtocolError::InputOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_registration_when_full() {
        let mut round = Round::new(test_config(), 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 100_000);
        let (sk3, c3) = coin(3, 100_000);
        register(&mut round, &sk1, c1);
        register(&mut round, &sk2, c2);
        let proof = sign_ownership(&sk3, &round.id(), &c3.outpoint);
        assert!(matches!(
            round.register_input(c3, &proof),
            Err(ProtocolError::InputOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_operations_in_wrong_phase() {
        let mut round = Round::new(test_config(), 0);
        assert_eq!(
            round.confirm_connection([0; 32]),
            Err(ProtocolError::WrongPhase(Phase::InputRegistration))
        );
        assert_eq!(
            round.ready_to_sign([0; 32]),
            Err(ProtocolError::WrongPhase(Phase::InputRegistration))
        );
    }

    #[test]
    fn advances_when_max_inputs_reached() {
        let mut round = Round::new(test_config(), 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 100_000);
        register(&mut round, &sk1, c1);
        register(&mut round, &sk2, c2);
        round.step(1).unwrap();
        assert_eq!(round.phase(), Phase::ConnectionConfirmation);
    }

    #[test]
    fn aborts_below_quorum_at_deadline() {
        let mut round = Round::new(test_config(), 0);
        let (sk1, c1) = coin(1, 100_000);
        register(&mut round, &sk1, c1);
        // Deadline not reached: stays open.
        round.step(99).unwrap();
        assert_eq!(round.phase(), Phase::InputRegistration);
        round.step(100).unwrap();
        assert_eq!(round.phase(), Phase::ConnectionConfirmation);

        let mut empty = Round::new(test_config(), 0);
        empty.step(100).unwrap();
        assert_eq!(empty.phase(), Phase::Ended(EndReason::AbortedInsufficientQuorum));
    }

    #[test]
    fn issued_credentials_match_coin_value_minus_overhead() {
        let cfg = test_config();
        let fee = cfg.fee_rate.fee(INPUT_VSIZE);
        let mut round = Round::new(cfg.clone(), 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 80_000);
        let a1 = register(&mut round, &sk1, c1);
        register(&mut round, &sk2, c2);
        round.step(1).unwrap();

        let (amount, vsize) = round.confirm_connection(a1).unwrap();
        assert_eq!(amount.iter().map(|c| c.value).sum::<u64>(), 100_000 - fee);
        assert_eq!(
            vsize.iter().map(|c| c.value).sum::<u64>(),
            cfg.max_vsize_allocation_per_alice - INPUT_VSIZE
        );
    }

    #[test]
    fn unredeemed_credit_is_tracked_per_alice() {
        let cfg = test_config();
        let mut round = Round::new(cfg.clone(), 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 80_000);
        let a1 = register(&mut round, &sk1, c1);
        let a2 = register(&mut round, &sk2, c2);
        round.step(1).unwrap();

        let (amount, vsize) = round.confirm_connection(a1).unwrap();
        round.confirm_connection(a2).unwrap();
        round.step(2).unwrap();
        assert_eq!(round.unredeemed_alice_count(), 2);

        let value =
            amount.iter().map(|c| c.value).sum::<u64>() - cfg.fee_rate.fee(OUTPUT_VSIZE);
        round
            .register_output(ScriptPubkey(hash(b"dest")), value, &amount, &vsize)
            .unwrap();
        assert_eq!(round.unredeemed_alice_count(), 1);
    }

    #[test]
    fn second_confirmation_is_rejected() {
        let mut round = Round::new(test_config(), 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 100_000);
        let a1 = register(&mut round, &sk1, c1);
        register(&mut round, &sk2, c2);
        round.step(1).unwrap();
        round.confirm_connection(a1).unwrap();
        assert_eq!(round.confirm_connection(a1), Err(ProtocolError::DuplicateRegistration));
    }

    #[test]
    fn unconfirmed_alices_dropped_at_deadline() {
        let cfg = RoundConfig { min_input_count_multiplier: 1.0, ..test_config() };
        let mut round = Round::new(cfg, 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 100_000);
        let a1 = register(&mut round, &sk1, c1);
        register(&mut round, &sk2, c2);
        round.step(1).unwrap();
        round.confirm_connection(a1).unwrap();

        // Second alice never confirms; below quorum once dropped.
        round.step(101).unwrap();
        assert_eq!(round.phase(), Phase::Ended(EndReason::AbortedInsufficientQuorum));
        assert_eq!(round.alice_count(), 1);
    }

    #[test]
    fn not_ready_without_timeout_stays_in_output_registration() {
        let cfg = test_config();
        let mut round = Round::new(cfg, 0);
        let (sk1, c1) = coin(1, 100_000);
        let (sk2, c2) = coin(2, 100_000);
        let a1 = register(&mut round, &sk1, c1);
        let a2 = register(&mut round, &sk2, c2);
        round.step(1).unwrap();
        round.confirm_connection(a1).unwrap();
        round.confirm_connection(a2).unwrap();
        round.step(2).unwrap();
        assert_eq!(round.phase(), Phase::OutputRegistration);

        round.ready_to_sign(a1).unwrap();
        round.step(50).unwrap();
        assert_eq!(round.phase(), Phase::OutputRegistration);
    }
}
