use crate::state::AppState;
use axum::Router;

mod dto;
pub(crate) mod extractors;
pub mod handlers;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
