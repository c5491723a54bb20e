use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::dto::TerminalView;
use crate::{
    clock::Clock,
    config::DemoConfig,
    punches::{
        repo::{PunchStore, Recovery, Rendered},
        repo_types::{PunchRecord, PunchType},
    },
    scan::{
        decoder::DecodeEvent,
        session::{Release, ScanCompleted, ScanError, ScanSession, StartCanceller},
    },
    storage::StoreError,
};

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Log in first.")]
    NotAuthenticated,
    #[error("Invalid demo login. Use {email} / {password}.")]
    InvalidCredentials { email: String, password: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Who is logged in on this terminal.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub email: String,
    pub since: OffsetDateTime,
}

/// Drives one terminal: login gate, scan sessions and the punch ledger.
pub struct Controller {
    demo: DemoConfig,
    store: PunchStore,
    scan: ScanSession,
    clock: Arc<dyn Clock>,
    context: Option<SessionContext>,
    status: Option<String>,
    ledger: Option<Rendered>,
}

impl Controller {
    pub fn new(demo: DemoConfig, store: PunchStore, scan: ScanSession, clock: Arc<dyn Clock>) -> Self {
        Self {
            demo,
            store,
            scan,
            clock,
            context: None,
            status: None,
            ledger: None,
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.email.as_str())
    }

    /// Handle for cancelling a camera start without holding the controller.
    pub fn canceller(&self) -> StartCanceller {
        self.scan.canceller()
    }

    fn email(&self) -> Result<String, TerminalError> {
        self.user()
            .map(str::to_string)
            .ok_or(TerminalError::NotAuthenticated)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&Rendered, TerminalError> {
        let email = email.trim();
        let password = password.trim();
        if email != self.demo.email || password != self.demo.password {
            warn!(%email, "rejected demo login");
            return Err(TerminalError::InvalidCredentials {
                email: self.demo.email.clone(),
                password: self.demo.password.clone(),
            });
        }

        self.context = Some(SessionContext {
            email: email.to_string(),
            since: self.clock.now(),
        });
        self.status = None;
        info!(user = %email, "logged in");
        self.refresh().await
    }

    /// Stops any scan, then forgets the user.
    pub async fn logout(&mut self) {
        self.scan.stop().await;
        if let Some(ctx) = self.context.take() {
            info!(user = %ctx.email, "logged out");
        }
        self.status = None;
        self.ledger = None;
    }

    pub async fn start_scan(&mut self, mode: PunchType) -> Result<(), ScanError> {
        if self.context.is_none() {
            self.status = Some(ScanError::NotAuthenticated.to_string());
            return Err(ScanError::NotAuthenticated);
        }

        self.status = Some(format!("Starting camera for {mode}..."));
        let res = self.scan.start(mode).await;
        self.status = match &res {
            Ok(()) => Some(format!("Point the camera at the QR code ({mode})")),
            Err(ScanError::Cancelled) => None,
            Err(e) => Some(e.to_string()),
        };
        res
    }

    pub async fn stop_scan(&mut self) -> Release {
        self.scan.stop().await
    }

    /// Hands one engine event to the scan identified by `generation`.
    /// Returns the punch it produced, if this event completed the scan.
    pub async fn relay(
        &mut self,
        generation: u64,
        event: DecodeEvent,
    ) -> Result<Option<PunchRecord>, TerminalError> {
        match self.scan.deliver(generation, event).await {
            Some(ScanCompleted { mode, text }) => self.on_scan_completed(mode, Some(&text)).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drains events an in-process engine queued on its own.
    pub async fn pump(&mut self) -> Result<Option<PunchRecord>, TerminalError> {
        match self.scan.poll().await {
            Some(ScanCompleted { mode, text }) => self.on_scan_completed(mode, Some(&text)).await.map(Some),
            None => Ok(None),
        }
    }

    /// Records exactly one punch for a completed scan and re-renders.
    pub async fn on_scan_completed(
        &mut self,
        mode: PunchType,
        decoded: Option<&str>,
    ) -> Result<PunchRecord, TerminalError> {
        let email = self.email()?;
        let record = PunchRecord::from_scan(&email, mode, decoded, self.clock.now());

        if let Recovery::Corrupt { reason } = self.store.append(&email, record.clone()).await? {
            warn!(user = %email, %reason, "ledger was unreadable; started a new one");
        }
        info!(user = %email, %mode, location = %record.location, "punch recorded");

        self.status = Some(format!(
            "Registered: {mode} at location \"{}\"",
            record.location
        ));
        self.refresh().await?;
        Ok(record)
    }

    /// Re-reads the ledger in display order.
    pub async fn refresh(&mut self) -> Result<&Rendered, TerminalError> {
        let email = self.email()?;
        let rendered = self.store.render(&email).await?;
        Ok(self.ledger.insert(rendered))
    }

    pub fn view(&self) -> TerminalView {
        TerminalView {
            user: self.context.as_ref().map(|c| c.email.clone()),
            since: self.context.as_ref().map(|c| c.since),
            scan: self.scan.state(),
            scan_id: self.scan.generation(),
            mode: self.scan.mode(),
            viewport_visible: self.scan.viewport_visible(),
            status: self.status.clone(),
            ledger: self.ledger.clone(),
        }
    }
}
