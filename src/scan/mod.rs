use crate::state::AppState;
use axum::Router;

pub mod decoder;
mod dto;
#[cfg(test)]
pub(crate) mod fake;
pub mod handlers;
pub mod relay;
pub mod session;

pub fn router() -> Router<AppState> {
    handlers::scan_routes()
}
