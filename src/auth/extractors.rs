use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState, terminal::TerminalHandle};

/// Resolves the bearer token to a logged-in terminal.
pub struct AuthTerminal {
    pub token: Uuid,
    pub handle: Arc<TerminalHandle>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthTerminal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .and_then(|t| Uuid::parse_str(t.trim()).ok())
            .ok_or(ApiError::NotAuthenticated)?;

        match state.terminals.get(&token).await {
            Some(handle) => Ok(AuthTerminal { token, handle }),
            None => {
                warn!(%token, "unknown terminal token");
                Err(ApiError::NotAuthenticated)
            }
        }
    }
}
