use axum::{routing::get, Json, Router};
use tracing::{debug, instrument};

use super::dto::LedgerResponse;
use crate::{auth::extractors::AuthTerminal, error::ApiError, state::AppState};

pub fn punch_routes() -> Router<AppState> {
    Router::new().route("/punches", get(list_punches))
}

#[instrument(skip(terminal))]
pub async fn list_punches(
    terminal: AuthTerminal,
) -> Result<Json<LedgerResponse>, ApiError> {
    let mut controller = terminal.handle.controller.lock().await;
    let ledger = controller.refresh().await?.clone();
    let email = controller.user().unwrap_or_default().to_string();
    debug!(user = %email, count = ledger.entries().len(), "ledger rendered");
    Ok(Json(LedgerResponse::new(email, ledger)))
}
