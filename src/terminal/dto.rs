use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    punches::{repo::Rendered, repo_types::{PunchRecord, PunchType}},
    scan::session::ScanState,
};

/// Everything a terminal's display needs after an action.
#[derive(Debug, Clone, Serialize)]
pub struct TerminalView {
    pub user: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    pub scan: ScanState,
    /// Echoed back with every decode relayed for the running scan.
    pub scan_id: Option<u64>,
    /// Punch direction of the running scan.
    pub mode: Option<PunchType>,
    pub viewport_visible: bool,
    pub status: Option<String>,
    pub ledger: Option<Rendered>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    #[serde(flatten)]
    pub view: TerminalView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punch: Option<PunchRecord>,
}
