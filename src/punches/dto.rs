use serde::Serialize;

use super::repo::Rendered;

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub email: String,
    pub ledger: Rendered,
    /// Set when there is nothing to list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl LedgerResponse {
    pub fn new(email: String, ledger: Rendered) -> Self {
        let message = match ledger {
            Rendered::Empty => Some(Rendered::EMPTY_MESSAGE),
            Rendered::Entries(_) => None,
        };
        Self {
            email,
            ledger,
            message,
        }
    }
}
