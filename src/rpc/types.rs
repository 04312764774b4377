use crate::credentials::Credential;
use crate::round::RoundStateSnapshot;
use crate::types::{AliceId, Coin, RoundId, ScriptPubkey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterInputRequest {
    pub round_id: RoundId,
    pub coin: Coin,
    pub ownership_proof: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterInputResponse {
    pub alice_id: AliceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmConnectionRequest {
    pub round_id: RoundId,
    pub alice_id: AliceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmConnectionResponse {
    pub amount_credentials: Vec<Credential>,
    pub vsize_credentials: Vec<Credential>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterOutputRequest {
    pub round_id: RoundId,
    pub script_pubkey: ScriptPubkey,
    pub value: u64,
    pub amount_credentials: Vec<Credential>,
    pub vsize_credentials: Vec<Credential>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyToSignRequest {
    pub round_id: RoundId,
    pub alice_id: AliceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitWitnessRequest {
    pub round_id: RoundId,
    pub alice_id: AliceId,
    pub witness: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: String,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub rounds: Vec<RoundStateSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveRoundResponse {
    pub round: Option<RoundStateSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
