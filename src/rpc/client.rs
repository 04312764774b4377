use super::types::*;
use crate::client::Coordinator;
use crate::credentials::Credential;
use crate::round::RoundStateSnapshot;
use crate::types::{AliceId, Coin, RoundId, ScriptPubkey};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// [`Coordinator`] over the coordinator's HTTP RPC.
pub struct RpcCoordinator {
    base_url: String,
    http: reqwest::Client,
}

impl RpcCoordinator {
    pub fn new(rpc_port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", rpc_port),
            http: reqwest::Client::new(),
        }
    }

    async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            bail!("coordinator rejected request: {}", error);
        }
        Ok(response.json().await?)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.post(&url).json(req).send().await?;
        Self::read_response(response).await
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        Self::read_response(response).await
    }

    /// All rounds the coordinator is currently tracking.
    pub async fn status(&self) -> Result<Vec<RoundStateSnapshot>> {
        let resp: StatusResponse = self.get("status").await?;
        Ok(resp.rounds)
    }
}

#[async_trait]
impl Coordinator for RpcCoordinator {
    async fn active_round(&self) -> Result<Option<RoundStateSnapshot>> {
        let resp: ActiveRoundResponse = self.get("rounds/active").await?;
        Ok(resp.round)
    }

    async fn round_state(&self, round_id: &RoundId) -> Result<RoundStateSnapshot> {
        self.get(&format!("rounds/{}", hex::encode(round_id))).await
    }

    async fn register_input(
        &self,
        round_id: &RoundId,
        coin: Coin,
        ownership_proof: Vec<u8>,
    ) -> Result<AliceId> {
        let resp: RegisterInputResponse = self
            .post(
                "register-input",
                &RegisterInputRequest { round_id: *round_id, coin, ownership_proof },
            )
            .await?;
        Ok(resp.alice_id)
    }

    async fn confirm_connection(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
    ) -> Result<(Vec<Credential>, Vec<Credential>)> {
        let resp: ConfirmConnectionResponse = self
            .post(
                "confirm-connection",
                &ConfirmConnectionRequest { round_id: *round_id, alice_id },
            )
            .await?;
        Ok((resp.amount_credentials, resp.vsize_credentials))
    }

    async fn register_output(
        &self,
        round_id: &RoundId,
        script_pubkey: ScriptPubkey,
        value: u64,
        amount_credentials: Vec<Credential>,
        vsize_credentials: Vec<Credential>,
    ) -> Result<()> {
        let _: AckResponse = self
            .post(
                "register-output",
                &RegisterOutputRequest {
                    round_id: *round_id,
                    script_pubkey,
                    value,
                    amount_credentials,
                    vsize_credentials,
                },
            )
            .await?;
        Ok(())
    }

    async fn ready_to_sign(&self, round_id: &RoundId, alice_id: AliceId) -> Result<()> {
        let _: AckResponse = self
            .post("ready-to-sign", &ReadyToSignRequest { round_id: *round_id, alice_id })
            .await?;
        Ok(())
    }

    async fn submit_witness(
        &self,
        round_id: &RoundId,
        alice_id: AliceId,
        witness: Vec<u8>,
    ) -> Result<()> {
        let _: AckResponse = self
            .post(
                "submit-witness",
                &SubmitWitnessRequest { round_id: *round_id, alice_id, witness },
            )
            .await?;
        Ok(())
    }
}
