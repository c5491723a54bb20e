use serde::Deserialize;

use crate::punches::repo_types::PunchType;

#[derive(Debug, Deserialize)]
pub struct StartScanRequest {
    pub mode: PunchType,
}

/// Text the browser's decoder recognised in a frame.
#[derive(Debug, Deserialize)]
pub struct DecodedRequest {
    /// `scan_id` of the scan the frame came from.
    pub scan: u64,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecodeErrorRequest {
    pub scan: u64,
    #[serde(default)]
    pub message: String,
}
