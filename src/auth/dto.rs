use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::terminal::dto::TerminalView;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    #[serde(flatten)]
    pub view: TerminalView,
}
