use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, DemoConfig, ScannerConfig, TerminalConfig};
use crate::db::PgStore;
use crate::punches::repo::PunchStore;
use crate::scan::{decoder::DecoderFactory, relay::RelayFactory, session::ScanSession};
use crate::storage::{KvStore, MemoryStore};
use crate::terminal::{controller::Controller, Terminals};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: PunchStore,
    pub decoders: Arc<dyn DecoderFactory>,
    pub clock: Arc<dyn Clock>,
    pub terminals: Terminals,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let kv = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?) as Arc<dyn KvStore>,
            None => {
                tracing::warn!("DATABASE_URL not set; punches are kept in memory");
                Arc::new(MemoryStore::new()) as Arc<dyn KvStore>
            }
        };

        Ok(Self::from_parts(
            config,
            kv,
            Arc::new(RelayFactory),
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        kv: Arc<dyn KvStore>,
        decoders: Arc<dyn DecoderFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let terminals = Terminals::new(config.terminals.clone());
        Self {
            config,
            store: PunchStore::new(kv),
            decoders,
            clock,
            terminals,
        }
    }

    /// A fresh, logged-out controller for a new terminal.
    pub fn controller(&self) -> Controller {
        let scan = ScanSession::new(self.decoders.clone(), self.config.scanner.clone());
        Controller::new(
            self.config.demo.clone(),
            self.store.clone(),
            scan,
            self.clock.clone(),
        )
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: "public".into(),
            database_url: None,
            demo: DemoConfig::default(),
            scanner: ScannerConfig::default(),
            terminals: TerminalConfig::default(),
        });
        Self::from_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(RelayFactory),
            Arc::new(SystemClock),
        )
    }
}
