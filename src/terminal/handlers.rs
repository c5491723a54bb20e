use axum::{routing::get, Json, Router};
use tracing::instrument;

use super::dto::TerminalView;
use crate::{auth::extractors::AuthTerminal, state::AppState};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(terminal))]
pub async fn get_me(terminal: AuthTerminal) -> Json<TerminalView> {
    Json(terminal.handle.controller.lock().await.view())
}
