use super::types::*;
use crate::arena::ArenaHandle;
use crate::error::ProtocolError;
use crate::types::RoundId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

type AppState = ArenaHandle;

/// Protocol rejection carried to the HTTP layer.
pub struct ApiError(pub ProtocolError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match self.0 {
            ProtocolError::RoundNotFound | ProtocolError::AliceNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (code, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        ApiError(e)
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn status(State(arena): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse { rounds: arena.snapshots().await })
}

pub async fn active_round(State(arena): State<AppState>) -> Json<ActiveRoundResponse> {
    Json(ActiveRoundResponse { round: arena.active_round().await })
}

fn parse_round_id(hex_str: &str) -> Result<RoundId, ApiError> {
    let bytes = hex::decode(hex_str).map_err(|_| ApiError(ProtocolError::RoundNotFound))?;
    <RoundId>::try_from(bytes).map_err(|_| ApiError(ProtocolError::RoundNotFound))
}

pub async fn round_state(
    State(arena): State<AppState>,
    Path(round_id): Path<String>,
) -> Result<Json<crate::round::RoundStateSnapshot>, ApiError> {
    let round_id = parse_round_id(&round_id)?;
    Ok(Json(arena.round_state(&round_id).await?))
}

pub async fn register_input(
    State(arena): State<AppState>,
    Json(req): Json<RegisterInputRequest>,
) -> Result<Json<RegisterInputResponse>, ApiError> {
    let alice_id = arena
        .register_input(&req.round_id, req.coin, &req.ownership_proof)
        .await?;
    Ok(Json(RegisterInputResponse { alice_id }))
}

pub async fn confirm_connection(
    State(arena): State<AppState>,
    Json(req): Json<ConfirmConnectionRequest>,
) -> Result<Json<ConfirmConnectionResponse>, ApiError> {
    let (amount_credentials, vsize_credentials) =
        arena.confirm_connection(&req.round_id, req.alice_id).await?;
    Ok(Json(ConfirmConnectionResponse { amount_credentials, vsize_credentials }))
}

pub async fn register_output(
    State(arena): State<AppState>,
    Json(req): Json<RegisterOutputRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    arena
        .register_output(
            &req.round_id,
            req.script_pubkey,
            req.value,
            &req.amount_credentials,
            &req.vsize_credentials,
        )
        .await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn ready_to_sign(
    State(arena): State<AppState>,
    Json(req): Json<ReadyToSignRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    arena.ready_to_sign(&req.round_id, req.alice_id).await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn submit_witness(
    State(arena): State<AppState>,
    Json(req): Json<SubmitWitnessRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    arena.submit_witness(&req.round_id, req.alice_id, req.witness).await?;
    Ok(Json(AckResponse::ok()))
}
