//! Multiparty transaction builder.
//!
//! The under-construction coinjoin is a chain of immutable sub-states:
//! [`ConstructionState`] while inputs and outputs are being added, then
//! [`SigningState`] once the set is frozen and witnesses are pending.
//! Every operation returns a new value and leaves the previous state
//! intact, so a snapshot handed to a status query stays valid while the
//! round keeps building.

use crate::error::ProtocolError;
use crate::types::{
    Coin, FeeRate, OutPoint, ScriptPubkey, Transaction, TxOut, UnsignedTransaction, INPUT_VSIZE,
    OUTPUT_VSIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed output amount range, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: u64,
    pub max: u64,
}

impl AmountRange {
    pub fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Limits the builder enforces on every transition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TxParams {
    pub max_input_count: usize,
    pub allowed_output_amounts: AmountRange,
    pub fee_rate: FeeRate,
}

/// Inputs and outputs still being collected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructionState {
    params: TxParams,
    inputs: Vec<Coin>,
    outputs: Vec<TxOut>,
}

impl ConstructionState {
    pub fn new(params: TxParams) -> Self {
        Self { params, inputs: Vec::new(), outputs: Vec::new() }
    }

    pub fn params(&self) -> &TxParams {
        &self.params
    }

    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    /// Fee owed by the elements added so far, at the configured rate.
    pub fn estimated_fee(&self) -> u64 {
        self.params.fee_rate.fee(
            self.inputs.len() as u64 * INPUT_VSIZE + self.outputs.len() as u64 * OUTPUT_VSIZE,
        )
    }

    /// Input value not yet spoken for by outputs or fees. Never negative
    /// for a state produced by the checked transitions below.
    pub fn balance(&self) -> i128 {
        let in_sum: i128 = self.inputs.iter().map(|i| i.value as i128).sum();
        let out_sum: i128 = self.outputs.iter().map(|o| o.value as i128).sum();
        in_sum - out_sum - self.estimated_fee() as i128
    }

    /// Append an input, yielding the successor state.
    ///
    /// Rejects duplicate outpoints, inputs past the configured cap, and
    /// coins too small to pay their own fee share plus a minimum output.
    pub fn add_input(&self, coin: Coin) -> Result<Self, ProtocolError> {
        if self.inputs.len() >= self.params.max_input_count {
            return Err(ProtocolError::InputOutOfRange(format!(
                "input count cap {} reached",
                self.params.max_input_count
            )));
        }
        if self.inputs.iter().any(|i| i.outpoint == coin.outpoint) {
            return Err(ProtocolError::DuplicateRegistration);
        }
        let floor = self.params.fee_rate.fee(INPUT_VSIZE) + self.params.allowed_output_amounts.min;
        if coin.value < floor {
            return Err(ProtocolError::InputOutOfRange(format!(
                "coin value {} cannot cover its fee share plus a minimum output ({})",
                coin.value, floor
            )));
        }
        let mut next = self.clone();
        next.inputs.push(coin);
        Ok(next)
    }

    /// Append an output, yielding the successor state.
    ///
    /// Rejects amounts outside the allowed range and outputs that would
    /// overdraw the remaining balance.
    pub fn add_output(&self, script_pubkey: ScriptPubkey, value: u64) -> Result<Self, ProtocolError> {
        if !self.params.allowed_output_amounts.contains(value) {
            return Err(ProtocolError::InputOutOfRange(format!(
                "output amount {} outside [{}, {}]",
                value,
                self.params.allowed_output_amounts.min,
                self.params.allowed_output_amounts.max
            )));
        }
        let mut next = self.clone();
        next.outputs.push(TxOut { script_pubkey, value });
        if next.balance() < 0 {
            return Err(ProtocolError::InputOutOfRange(format!(
                "output amount {} overdraws the round balance",
                value
            )));
        }
        Ok(next)
    }

    /// Freeze the input/output set for signing.
    ///
    /// Valid only with at least one input and a non-negative balance:
    /// input value must cover output value plus the fee at the
    /// configured rate, exactly or with surplus absorbed as extra fee.
    pub fn finalize(&self) -> Result<SigningState, ProtocolError> {
        if self.inputs.is_empty() || self.balance() < 0 {
            return Err(ProtocolError::NotReady);
        }
        Ok(SigningState {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            witnesses: BTreeMap::new(),
        })
    }
}

/// Frozen input/output set collecting witnesses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningState {
    inputs: Vec<Coin>,
    outputs: Vec<TxOut>,
    witnesses: BTreeMap<usize, Vec<u8>>,
}

impl SigningState {
    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    /// The transaction participants sign, in registration order.
    pub fn unsigned_transaction(&self) -> UnsignedTransaction {
        UnsignedTransaction { inputs: self.inputs.clone(), outputs: self.outputs.clone() }
    }

    pub fn sighash(&self) -> [u8; 32] {
        self.unsigned_transaction().sighash()
    }

    /// Position of an input by outpoint, if registered.
    pub fn input_index(&self, outpoint: &OutPoint) -> Option<usize> {
        self.inputs.iter().position(|i| i.outpoint == *outpoint)
    }

    pub fn is_input_signed(&self, index: usize) -> bool {
        self.witnesses.contains_key(&index)
    }

    /// Attach a verified witness for one input, yielding the successor
    /// state. The witness must be a valid signature over the joint
    /// sighash by the input's script key.
    pub fn add_witness(&self, index: usize, witness: Vec<u8>) -> Result<Self, ProtocolError> {
        let input = self.inputs.get(index).ok_or(ProtocolError::InvalidWitness)?;
        if self.witnesses.contains_key(&index) {
            return Err(ProtocolError::DuplicateRegistration);
        }
        if !input.script_pubkey.verify(&self.sighash(), &witness) {
            return Err(ProtocolError::InvalidWitness);
        }
        let mut next = self.clone();
        next.witnesses.insert(index, witness);
        Ok(next)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.witnesses.len() == self.inputs.len()
    }

    /// Serialize the final transaction: inputs and outputs in
    /// registration order with their collected witnesses.
    pub fn create_transaction(&self) -> Result<Transaction, ProtocolError> {
        if !self.is_fully_signed() {
            return Err(ProtocolError::NotReady);
        }
        let witnesses = (0..self.inputs.len())
            .map(|i| self.witnesses[&i].clone())
            .collect();
        Ok(Transaction {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            witnesses,
        })
    }
}

/// The round's builder position: construction or signing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CoinjoinState {
    Construction(ConstructionState),
    Signing(SigningState),
}

impl CoinjoinState {
    pub fn construction(&self) -> Result<&ConstructionState, ProtocolError> {
        match self {
            CoinjoinState::Construction(state) => Ok(state),
            CoinjoinState::Signing(_) => Err(ProtocolError::NotReady),
        }
    }

    pub fn signing(&self) -> Result<&SigningState, ProtocolError> {
        match self {
            CoinjoinState::Signing(state) => Ok(state),
            CoinjoinState::Construction(_) => Err(ProtocolError::NotReady),
        }
    }
}
