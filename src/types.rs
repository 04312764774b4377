use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Hash a byte slice with BLAKE3.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Identifies one coordination round. Random, hex-encoded at the RPC boundary.
pub type RoundId = [u8; 32];

/// Identifies one registered input within a round.
pub type AliceId = [u8; 32];

/// Virtual size of one input, including its witness.
pub const INPUT_VSIZE: u64 = 68;

/// Virtual size of one output.
pub const OUTPUT_VSIZE: u64 = 31;

/// Reference to an unspent output on chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut buf = [0u8; 36];
        buf[..32].copy_from_slice(&self.txid);
        buf[32..].copy_from_slice(&self.vout.to_le_bytes());
        buf
    }
}

/// A pay-to-pubkey script: the 32-byte ed25519 verifying key of the owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptPubkey(pub [u8; 32]);

impl ScriptPubkey {
    /// Verify a 64-byte signature over `msg` against this script's key.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(sig) else {
            return false;
        };
        key.verify(msg, &sig).is_ok()
    }
}

/// A spendable coin: outpoint plus the value and script it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script_pubkey: ScriptPubkey,
}

/// One transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub script_pubkey: ScriptPubkey,
    pub value: u64,
}

/// Fee rate in satoshis per virtual byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    pub fn fee(&self, vsize: u64) -> u64 {
        self.0 * vsize
    }
}

/// The assembled transaction before any witness is attached.
///
/// Inputs and outputs appear in registration order; all participants
/// sign the same joint sighash over this structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub inputs: Vec<Coin>,
    pub outputs: Vec<TxOut>,
}

impl UnsignedTransaction {
    /// Sighash committing to every input outpoint/value and every output.
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for input in &self.inputs {
            hasher.update(&input.outpoint.to_bytes());
            hasher.update(&input.value.to_le_bytes());
            hasher.update(&input.script_pubkey.0);
        }
        for output in &self.outputs {
            hasher.update(&output.script_pubkey.0);
            hasher.update(&output.value.to_le_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}

/// The final, fully signed coinjoin transaction.
///
/// `witnesses[i]` is the signature for `inputs[i]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Coin>,
    pub outputs: Vec<TxOut>,
    pub witnesses: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn txid(&self) -> [u8; 32] {
        let unsigned = UnsignedTransaction {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        };
        unsigned.sighash()
    }
}

/// Derive a signing key and its pay-to-pubkey script from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> (SigningKey, ScriptPubkey) {
    let sk = SigningKey::from_bytes(seed);
    let script = ScriptPubkey(sk.verifying_key().to_bytes());
    (sk, script)
}

/// Message an input owner signs to prove it controls the coin it registers.
fn ownership_message(round_id: &RoundId, outpoint: &OutPoint) -> Vec<u8> {
    let mut msg = b"joinpool ownership".to_vec();
    msg.extend_from_slice(round_id);
    msg.extend_from_slice(&outpoint.to_bytes());
    msg
}

/// Produce an ownership proof for registering `outpoint` into `round_id`.
pub fn sign_ownership(sk: &SigningKey, round_id: &RoundId, outpoint: &OutPoint) -> Vec<u8> {
    sk.sign(&ownership_message(round_id, outpoint)).to_bytes().to_vec()
}

/// Check an ownership proof against the coin's script.
pub fn verify_ownership(
    script: &ScriptPubkey,
    round_id: &RoundId,
    outpoint: &OutPoint,
    proof: &[u8],
) -> bool {
    script.verify(&ownership_message(round_id, outpoint), proof)
}

/// Sign the joint sighash, producing an input witness.
pub fn sign_sighash(sk: &SigningKey, sighash: &[u8; 32]) -> Vec<u8> {
    sk.sign(sighash).to_bytes().to_vec()
}
