use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::repo_types::PunchRecord;
use crate::storage::{KvStore, StoreError};

/// Storage key of a user's ledger.
pub fn ledger_key(email: &str) -> String {
    format!("punches_{email}")
}

/// How a ledger read went when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    Clean,
    /// The slot held unreadable data and was treated as empty.
    Corrupt { reason: String },
}

#[derive(Debug)]
pub struct Loaded {
    pub punches: Vec<PunchRecord>,
    pub recovery: Recovery,
}

/// A ledger ready for display: timestamp-ascending, or the "no records" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "punches", rename_all = "snake_case")]
pub enum Rendered {
    Empty,
    Entries(Vec<PunchRecord>),
}

impl Rendered {
    pub const EMPTY_MESSAGE: &'static str = "No records yet.";

    pub fn entries(&self) -> &[PunchRecord] {
        match self {
            Self::Empty => &[],
            Self::Entries(p) => p,
        }
    }
}

/// Per-user append-only punch ledgers on top of a [`KvStore`].
#[derive(Clone)]
pub struct PunchStore {
    kv: Arc<dyn KvStore>,
}

impl PunchStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Reads the ledger in insertion order. Missing or corrupt slots read as empty.
    pub async fn load(&self, email: &str) -> Result<Loaded, StoreError> {
        let key = ledger_key(email);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(Loaded {
                punches: Vec::new(),
                recovery: Recovery::Clean,
            });
        };

        match serde_json::from_str::<Vec<PunchRecord>>(&raw) {
            Ok(punches) => Ok(Loaded {
                punches,
                recovery: Recovery::Clean,
            }),
            Err(e) => {
                warn!(%key, error = %e, "corrupt ledger, reading as empty");
                Ok(Loaded {
                    punches: Vec::new(),
                    recovery: Recovery::Corrupt {
                        reason: e.to_string(),
                    },
                })
            }
        }
    }

    /// Appends one record and writes the whole ledger back.
    ///
    /// Not atomic: two writers racing on the same user can lose a punch.
    /// A corrupt ledger is replaced by one holding just `record`.
    pub async fn append(&self, email: &str, record: PunchRecord) -> Result<Recovery, StoreError> {
        let Loaded {
            mut punches,
            recovery,
        } = self.load(email).await?;
        punches.push(record);
        let raw = serde_json::to_string(&punches)
            .map_err(|e| StoreError::Backend(format!("serialize ledger: {e}")))?;
        self.kv.set(&ledger_key(email), raw).await?;
        debug!(user = %email, count = punches.len(), "ledger written");
        Ok(recovery)
    }

    pub async fn render(&self, email: &str) -> Result<Rendered, StoreError> {
        let Loaded { mut punches, .. } = self.load(email).await?;
        if punches.is_empty() {
            return Ok(Rendered::Empty);
        }
        // stable: equal timestamps keep insertion order
        punches.sort_by_key(|p| p.timestamp);
        Ok(Rendered::Entries(punches))
    }
}
