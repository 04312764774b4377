//! Participant-side protocol drivers.
//!
//! [`AliceClient`] runs the input side: register a coin, confirm the
//! connection to collect credentials, signal readiness, and sign.
//! [`BobClient`] runs one output registration; it holds credentials and
//! nothing else, with no notion of which input funded them.
//!
//! Both talk to the coordinator through the [`Coordinator`] trait, so
//! the same client code runs in-process against an [`ArenaHandle`]
//! (tests, colocated setups) or over HTTP via the RPC client.

use crate::arena::ArenaHandle;
use crate::credentials::Credential;
use crate::round::{Phase, RoundStateSnapshot};
use crate::types::{
    sign_ownership, sign_sighash, AliceId, Coin, FeeRate, RoundId, ScriptPubkey, OUTPUT_VSIZE,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use std::time::Duration;

/// The coordinator operations a participant needs, round-scoped.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// The round currently accepting input registrations, if any.
    async fn active_round(&self) -> Result<Option<RoundStateSnapshot>>;
    async fn round_state(&self, round_id: &RoundId) -> Result<RoundStateSnapshot>;
    async fn register_input(
        &self,
        round_id: &RoundId,
        coin: Coin,
        ownership_proof: Vec<u8>,
    ) -> Result<AliceId>;
    async fn confirm_connection(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>)>;
    async fn register_output(
        &self,
        round_id: &RoundId,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: Vec<Credential>,
        vsize_credentials: Vec<Credential>,
    ) -> Result<()>;
    async fn ready_to_sign(&self, round_id: &RoundId, alice_id: AliceId) -> Result<()>;
    async fn submit_witness(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<()>;
}

#[async_trait]
impl Coordinator for ArenaHandle {
    async fn active_round(&self) -> Result<Option<RoundStateSnapshot>> {
        Ok(ArenaHandle::active_round(self).await)
    }

    async fn round_state(&self, round_id: &RoundId) -> Result<RoundStateSnapshot> {
        Ok(ArenaHandle::round_state(self, round_id).await?)
    }

    async fn register_input(
        &self,
        round_id: &RoundId,
        coin: Coin,
        ownership_proof: Vec<u8>,
    ) -> Result<AliceId> {
        Ok(ArenaHandle::register_input(self, round_id, coin, &ownership_proof).await?)
    }

    async fn confirm_connection(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>)> {
        Ok(ArenaHandle::confirm_connection(self, round_id, alice_id).await?)
    }

    async fn register_output(
        &self,
        round_id: &RoundId,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: Vec<Credential>,
        vsize_credentials: Vec<Credential>,
    ) -> Result<()> {
        Ok(ArenaHandle::register_output(
            self,
            round_id,
            script_pubkey,
            value,
            &amount_credentials,
            &vsize_credentials,
        )
        .await?)
    }

    async fn ready_to_sign(&self, round_id: &RoundId, alice_id: AliceId) -> Result<()> {
        Ok(ArenaHandle::ready_to_sign(self, round_id, alice_id).await?)
    }

    async fn submit_witness(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<()> {
        Ok(ArenaHandle::submit_witness(self, round_id, alice_id, witness).await?)
    }
}

/// Amount an output paid from `amount_credentials` can carry: the
/// credential total minus the output's own fee.
pub fn redeemable_value(amount_credentials: &[Credential], fee_rate: FeeRate) -> u64 {
    let total: u64 = amount_credentials.iter().map(|c| c.value).sum();
    total.saturating_sub(fee_rate.fee(OUTPUT_VSIZE))
}

/// Input-side participant for one round.
pub struct AliceClient<'a, C: Coordinator> {
    api: &'a C,
    signing_key: SigningKey,
    coin: Coin,
    round_id: RoundId,
    alice_id: Option<AliceId>,
    amount_credentials: Vec<Credential>,
    vsize_credentials: Vec<Credential>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl<'a, C: Coordinator> AliceClient<'a, C> {
    pub fn new(api: &'a C, signing_key: SigningKey, coin: Coin, round_id: RoundId) -> Self {
        Self {
            api,
            signing_key,
            coin,
            round_id,
            alice_id: None,
            amount_credentials: Vec::new(),
            vsize_credentials: Vec::new(),
            poll_interval: Duration::from_millis(200),
            wait_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    /// Credentials received at connection confirmation, to hand to an
    /// output-registration client.
    pub fn credentials(&self) -> (&[Credential], &[Credential]) {
        (&self.amount_credentials, &self.vsize_credentials)
    }

    /// Register this client's coin with the round.
    pub async fn register(&mut self) -> Result<()> {
        let proof = sign_ownership(&self.signing_key, &self.round_id, &self.coin.outpoint);
        let alice_id = self
            .api
            .register_input(&self.round_id, self.coin, proof)
            .await
            .context("input registration rejected")?;
        self.alice_id = Some(alice_id);
        tracing::debug!(alice = %hex::encode(alice_id), "registered input");
        Ok(())
    }

    /// Poll until the round reaches `phase` (or a later one).
    ///
    /// Times out independently of the round's own timers; timing out or
    /// dropping the future never mutates round state. Fails early if the
    /// round ends before reaching `phase`.
    pub async fn await_phase(&self, phase: Phase) -> Result<RoundStateSnapshot> {
        let poll = async {
            loop {
                let state = self.api.round_state(&self.round_id).await?;
                if state.phase.order() >= phase.order() {
                    if matches!(state.phase, Phase::Ended(_)) && phase.order() < state.phase.order()
                    {
                        bail!("round ended ({:?}) before reaching {:?}", state.phase, phase);
                    }
                    return Ok(state);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        tokio::time::timeout(self.wait_timeout, poll)
            .await
            .map_err(|_| anyhow!("timed out waiting for phase {:?}", phase))?
    }

    fn alice_id(&self) -> Result<AliceId> {
        self.alice_id.ok_or_else(|| anyhow!("input not registered yet"))
    }

    /// Prove liveness during connection confirmation and store the
    /// issued credentials.
    pub async fn confirm_connection(&mut self) -> Result<()> {
        self.await_phase(Phase::ConnectionConfirmation).await?;
        let (amount, vsize) = self
            .api
            .confirm_connection(&self.round_id, self.alice_id()?)
            .await
            .context("connection confirmation rejected")?;
        self.amount_credentials = amount;
        self.vsize_credentials = vsize;
        Ok(())
    }

    pub async fn ready_to_sign(&self) -> Result<()> {
        self.api.ready_to_sign(&self.round_id, self.alice_id()?).await
    }

    /// Wait for the signing phase, sign the joint sighash, and submit
    /// the witness for this client's input.
    pub async fn sign(&self) -> Result<()> {
        let state = self.await_phase(Phase::TransactionSigning).await?;
        let unsigned = state
            .unsigned_tx
            .ok_or_else(|| anyhow!("signing phase without an unsigned transaction"))?;
        if !unsigned.inputs.iter().any(|i| i.outpoint == self.coin.outpoint) {
            bail!("own input missing from the assembled transaction");
        }
        let witness = sign_sighash(&self.signing_key, &unsigned.sighash());
        self.api
            .submit_witness(&self.round_id, self.alice_id()?, witness)
            .await
            .context("witness rejected")
    }
}

/// Output-side client: presents credentials, registers one output.
pub struct BobClient<'a, C: Coordinator> {
    api: &'a C,
    round_id: RoundId,
}

impl<'a, C: Coordinator> BobClient<'a, C> {
    pub fn new(api: &'a C, round_id: RoundId) -> Self {
        Self { api, round_id }
    }

    pub async fn register_output(
        &self,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: Vec<Credential>,
        vsize_credentials: Vec<Credential>,
    ) -> Result<()> {
        self.api
            .register_output(
                &self.round_id,
                script_pubkey,
                value,
                amount_credentials,
                vsize_credentials,
            )
            .await
            .context("output registration rejected")
    }
}
