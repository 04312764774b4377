use crate::types::{FeeRate, ScriptPubkey, INPUT_VSIZE, OUTPUT_VSIZE};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Coordinator configuration shared by every round it creates.
///
/// All durations are in seconds; all amounts in satoshis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Hard cap on registered inputs per round. Reaching it ends input
    /// registration early.
    pub max_input_count: usize,
    /// Quorum fraction: a round needs at least
    /// `ceil(multiplier * max_input_count)` confirmed inputs to proceed.
    pub min_input_count_multiplier: f64,
    /// Smallest output amount a registration may request.
    pub min_output_amount: u64,
    /// Largest output amount a registration may request.
    pub max_output_amount: u64,
    /// Fee rate applied to every input and output vsize.
    pub fee_rate: FeeRate,
    /// Virtual size budget granted to each confirmed input: the input
    /// itself plus the one output its credentials can pay for. Must
    /// equal `INPUT_VSIZE + OUTPUT_VSIZE`; the fixed credential
    /// allocation cannot split a larger budget across outputs.
    pub max_vsize_allocation_per_alice: u64,
    pub input_registration_timeout_secs: u64,
    pub connection_confirmation_timeout_secs: u64,
    pub output_registration_timeout_secs: u64,
    pub transaction_signing_timeout_secs: u64,
    /// How long a non-signing input's outpoint stays banned.
    pub blame_ban_secs: u64,
    /// How long an ended round stays queryable before the sweep evicts it.
    pub round_expiry_secs: u64,
    /// Coordinator-controlled script receiving unredeemed credit left
    /// behind at the output registration timeout.
    pub blame_script: ScriptPubkey,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            max_input_count: 100,
            min_input_count_multiplier: 0.5,
            min_output_amount: 5_000,
            max_output_amount: 2_000_000_000_000,
            fee_rate: FeeRate(2),
            max_vsize_allocation_per_alice: INPUT_VSIZE + OUTPUT_VSIZE,
            input_registration_timeout_secs: 3_600,
            connection_confirmation_timeout_secs: 60,
            output_registration_timeout_secs: 60,
            transaction_signing_timeout_secs: 60,
            blame_ban_secs: 86_400,
            round_expiry_secs: 30,
            blame_script: ScriptPubkey(*blake3::hash(b"joinpool coordinator blame script").as_bytes()),
        }
    }
}

impl RoundConfig {
    /// Minimum confirmed inputs for the round to proceed past input
    /// registration. Never less than one.
    pub fn min_input_count(&self) -> usize {
        let min = (self.min_input_count_multiplier * self.max_input_count as f64).ceil() as usize;
        min.max(1)
    }

    /// Reject a configuration no round could ever complete under.
    /// A bad configuration is fatal to the coordinator, not to a caller.
    pub fn validate(&self) -> Result<()> {
        if self.max_input_count == 0 {
            bail!("max_input_count must be positive");
        }
        if !(0.0..=1.0).contains(&self.min_input_count_multiplier) {
            bail!(
                "min_input_count_multiplier must be within [0, 1], got {}",
                self.min_input_count_multiplier
            );
        }
        if self.min_output_amount == 0 || self.min_output_amount > self.max_output_amount {
            bail!(
                "output amount range [{}, {}] is empty",
                self.min_output_amount,
                self.max_output_amount
            );
        }
        if self.max_vsize_allocation_per_alice != INPUT_VSIZE + OUTPUT_VSIZE {
            bail!(
                "vsize allocation {} must cover exactly one input and one output ({})",
                self.max_vsize_allocation_per_alice,
                INPUT_VSIZE + OUTPUT_VSIZE
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RoundConfig::default().validate().unwrap();
    }

    #[test]
    fn min_input_count_rounds_up() {
        let cfg = RoundConfig {
            max_input_count: 5,
            min_input_count_multiplier: 0.5,
            ..Default::default()
        };
        assert_eq!(cfg.min_input_count(), 3);
    }

    #[test]
    fn min_input_count_is_at_least_one() {
        let cfg = RoundConfig {
            max_input_count: 10,
            min_input_count_multiplier: 0.0,
            ..Default::default()
        };
        assert_eq!(cfg.min_input_count(), 1);
    }

    #[test]
    fn rejects_empty_output_range() {
        let cfg = RoundConfig {
            min_output_amount: 10,
            max_output_amount: 5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_vsize_allocation_other_than_one_output() {
        // Issued vsize credentials carry the full allocation in one
        // token; a larger budget could never be presented as the exact
        // per-output vsize, leaving every holder unredeemable.
        let cfg = RoundConfig {
            max_vsize_allocation_per_alice: INPUT_VSIZE + 2 * OUTPUT_VSIZE,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RoundConfig {
            max_vsize_allocation_per_alice: INPUT_VSIZE,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_inputs() {
        let cfg = RoundConfig { max_input_count: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
