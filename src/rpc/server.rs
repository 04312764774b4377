use super::handlers::*;
use crate::arena::ArenaHandle;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

pub struct RpcServer {
    addr: SocketAddr,
}

impl RpcServer {
    pub fn new(port: u16) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        Self { addr }
    }

    pub async fn run(self, arena: ArenaHandle) -> Result<()> {
        let app = Self::router(arena);

        tracing::info!("RPC server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn router(arena: ArenaHandle) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/status", get(status))
            .route("/rounds/active", get(active_round))
            .route("/rounds/:id", get(round_state))
            .route("/register-input", post(register_input))
            .route("/confirm-connection", post(confirm_connection))
            .route("/register-output", post(register_output))
            .route("/ready-to-sign", post(ready_to_sign))
            .route("/submit-witness", post(submit_witness))
            .layer(TraceLayer::new_for_http())
            .with_state(arena)
    }
}
