//! The arena owns every active round and is the single authority that
//! commits phase transitions.
//!
//! Client-facing calls mutate one round's data under the arena lock and
//! return immediately; only the periodic step loop observes the clock
//! and advances phases, so transition decisions are linearized per
//! round. Time is an explicit parameter throughout: tests drive a
//! simulated clock, the tick loop passes wall time.

use crate::config::RoundConfig;
use crate::credentials::Credential;
use crate::error::ProtocolError;
use crate::metrics::Metrics;
use crate::round::{Phase, Round, RoundStateSnapshot};
use crate::types::{AliceId, Coin, OutPoint, RoundId, ScriptPubkey};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Blockchain-access seam: the arena asks whether a coin reference is
/// currently unspent and sufficiently confirmed. Chain queries live
/// behind this trait; the coordinator never performs them itself.
pub trait CoinVerifier: Send + Sync {
    fn is_spendable(&self, coin: &Coin) -> bool;
}

/// Verifier that accepts every coin. For tests and offline runs.
pub struct AcceptAllCoins;

impl CoinVerifier for AcceptAllCoins {
    fn is_spendable(&self, _coin: &Coin) -> bool {
        true
    }
}

pub struct Arena {
    cfg: RoundConfig,
    rounds: HashMap<RoundId, Round>,
    /// Outpoints of inputs blamed for failing a round, with ban expiry.
    prison: HashMap<OutPoint, u64>,
    coin_verifier: Arc<dyn CoinVerifier>,
    metrics: Metrics,
}

impl Arena {
    pub fn new(cfg: RoundConfig, coin_verifier: Arc<dyn CoinVerifier>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            rounds: HashMap::new(),
            prison: HashMap::new(),
            coin_verifier,
            metrics: Metrics::new(),
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn round(&self, id: &RoundId) -> Option<&Round> {
        self.rounds.get(id)
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    fn round_mut(&mut self, id: &RoundId) -> Result<&mut Round, ProtocolError> {
        self.rounds.get_mut(id).ok_or(ProtocolError::RoundNotFound)
    }

    // ─── Scheduling ─────────────────────────────────────────────────────

    /// Keep exactly one round accepting input registrations.
    pub fn create_round_if_needed(&mut self, now: u64) {
        let accepting = self
            .rounds
            .values()
            .any(|r| r.phase() == Phase::InputRegistration);
        if !accepting {
            let round = Round::new(self.cfg.clone(), now);
            self.metrics.inc_rounds_created();
            self.rounds.insert(round.id(), round);
        }
    }

    /// Evaluate every round's transition predicate once, committing at
    /// most one phase change per round; apply blame from failed rounds.
    pub fn step(&mut self, now: u64) {
        let ban_until = now + self.cfg.blame_ban_secs;
        for round in self.rounds.values_mut() {
            let before = round.phase();
            match round.step(now) {
                Ok(outcome) => {
                    if !outcome.banned.is_empty() {
                        self.metrics.add_inputs_banned(outcome.banned.len() as u64);
                        for outpoint in outcome.banned {
                            self.prison.insert(outpoint, ban_until);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        round = %hex::encode(round.id()),
                        error = %e,
                        "step failed"
                    );
                    continue;
                }
            }
            match (before, round.phase()) {
                (Phase::Ended(_), _) => {}
                (_, Phase::Ended(crate::round::EndReason::TransactionBroadcast)) => {
                    self.metrics.inc_rounds_succeeded();
                }
                (_, Phase::Ended(_)) => self.metrics.inc_rounds_aborted(),
                _ => {}
            }
        }
    }

    /// Evict ended rounds past their query grace period and expired bans.
    pub fn sweep(&mut self, now: u64) {
        self.rounds.retain(|id, round| {
            if round.is_expired(now) {
                tracing::debug!(round = %hex::encode(id), "round evicted");
                false
            } else {
                true
            }
        });
        self.prison.retain(|_, until| *until > now);
    }

    // ─── Client-facing operations ───────────────────────────────────────

    pub fn register_input(
        &mut self,
        now: u64,
        round_id: &RoundId,
        coin: Coin,
        ownership_proof: &[u8],
    ) -> Result<AliceId, ProtocolError> {
        if let Some(&until) = self.prison.get(&coin.outpoint) {
            if until > now {
                self.metrics.inc_registrations_rejected();
                return Err(ProtocolError::InputBanned { banned_until: until });
            }
        }
        if !self.coin_verifier.is_spendable(&coin) {
            self.metrics.inc_registrations_rejected();
            return Err(ProtocolError::InputOutOfRange(
                "coin is spent, unknown, or unconfirmed".into(),
            ));
        }
        let metrics = self.metrics.clone();
        let result = self
            .round_mut(round_id)?
            .register_input(coin, ownership_proof);
        match &result {
            Ok(_) => metrics.inc_inputs_registered(),
            Err(_) => metrics.inc_registrations_rejected(),
        }
        result
    }

    pub fn confirm_connection(
        &mut self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>), ProtocolError> {
        self.round_mut(round_id)?.confirm_connection(alice_id)
    }

    pub fn register_output(
        &mut self,
        round_id: &RoundId,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: &[Credential],
        vsize_credentials: &[Credential],
    ) -> Result<(), ProtocolError> {
        let metrics = self.metrics.clone();
        let result = self.round_mut(round_id)?.register_output(
            script_pubkey,
            value,
            amount_credentials,
            vsize_credentials,
        );
        match &result {
            Ok(()) => metrics.inc_outputs_registered(),
            Err(_) => metrics.inc_registrations_rejected(),
        }
        result
    }

    pub fn ready_to_sign(
        &mut self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(), ProtocolError> {
        self.round_mut(round_id)?.ready_to_sign(alice_id)
    }

    pub fn submit_witness(
        &mut self,
        round_id: &RoundId,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.round_mut(round_id)?.submit_witness(alice_id, witness)
    }

    pub fn round_state(
        &self,
        now: u64,
        round_id: &RoundId,
    ) -> Result<RoundStateSnapshot, ProtocolError> {
        self.rounds
            .get(round_id)
            .map(|r| r.state_snapshot(now))
            .ok_or(ProtocolError::RoundNotFound)
    }

    /// The round currently accepting input registrations, if any.
    pub fn active_round(&self, now: u64) -> Option<RoundStateSnapshot> {
        self.rounds
            .values()
            .find(|r| r.phase() == Phase::InputRegistration)
            .map(|r| r.state_snapshot(now))
    }

    pub fn snapshots(&self, now: u64) -> Vec<RoundStateSnapshot> {
        self.rounds.values().map(|r| r.state_snapshot(now)).collect()
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

/// Shared, lock-guarded arena used by the RPC layer and in-process
/// clients. The lock is taken per call and never held across awaits.
#[derive(Clone)]
pub struct ArenaHandle {
    inner: Arc<RwLock<Arena>>,
}

impl ArenaHandle {
    pub fn new(arena: Arena) -> Self {
        Self { inner: Arc::new(RwLock::new(arena)) }
    }

    pub async fn register_input(
        &self,
        round_id: &RoundId,
        coin: Coin,
        ownership_proof: &[u8],
    ) -> Result<AliceId, ProtocolError> {
        self.inner
            .write()
            .await
            .register_input(unix_now(), round_id, coin, ownership_proof)
    }

    pub async fn confirm_connection(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>), ProtocolError> {
        self.inner.write().await.confirm_connection(round_id, alice_id)
    }

    pub async fn register_output(
        &self,
        round_id: &RoundId,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: &[Credential],
        vsize_credentials: &[Credential],
    ) -> Result<(), ProtocolError> {
        self.inner.write().await.register_output(
            round_id,
            script_pubkey,
            value,
            amount_credentials,
            vsize_credentials,
        )
    }

    pub async fn ready_to_sign(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(), ProtocolError> {
        self.inner.write().await.ready_to_sign(round_id, alice_id)
    }

    pub async fn submit_witness(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.inner.write().await.submit_witness(round_id, alice_id, witness)
    }

    pub async fn round_state(
        &self,
        round_id: &RoundId,
    ) -> Result<RoundStateSnapshot, ProtocolError> {
        self.inner.read().await.round_state(unix_now(), round_id)
    }

    pub async fn active_round(&self) -> Option<RoundStateSnapshot> {
        self.inner.read().await.active_round(unix_now())
    }

    pub async fn snapshots(&self) -> Vec<RoundStateSnapshot> {
        self.inner.read().await.snapshots(unix_now())
    }

    /// Run the scheduling tick: create, step, sweep, on a fixed interval.
    pub fn spawn_step_loop(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            let mut metrics_tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let now = unix_now();
                        let mut arena = handle.inner.write().await;
                        arena.create_round_if_needed(now);
                        arena.step(now);
                        arena.sweep(now);
                    }
                    _ = metrics_tick.tick() => {
                        handle.inner.read().await.metrics().report();
                    }
                }
            }
        })
    }
}
