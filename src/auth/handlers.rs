use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse},
        extractors::AuthTerminal,
    },
    error::ApiError,
    state::AppState,
    terminal::TerminalHandle,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut controller = state.controller();
    controller.login(&payload.email, &payload.password).await?;
    let view = controller.view();

    let token = state.terminals.insert(TerminalHandle::new(controller)).await;
    let open = state.terminals.count().await;
    info!(%token, open, "terminal opened");
    Ok(Json(LoginResponse { token, view }))
}

#[instrument(skip(state, terminal))]
pub async fn logout(
    State(state): State<AppState>,
    terminal: AuthTerminal,
) -> Result<StatusCode, ApiError> {
    // a camera start may be holding the lock
    terminal.handle.canceller.cancel();
    terminal.handle.controller.lock().await.logout().await;
    state.terminals.remove(&terminal.token).await;
    info!(token = %terminal.token, "terminal closed");
    Ok(StatusCode::NO_CONTENT)
}
