use std::{path::PathBuf, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// The single hardcoded account accepted by the login gate.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    pub email: String,
    pub password: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            email: "demo@demo.be".into(),
            password: "demo".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Element id of the camera viewport the decoder renders into.
    pub viewport: String,
    pub facing_mode: String,
    pub fps: u32,
    pub qrbox: u32,
    /// `None` waits for the camera indefinitely.
    pub start_timeout: Option<Duration>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            viewport: "scanner".into(),
            facing_mode: "environment".into(),
            fps: 10,
            qrbox: 250,
            start_timeout: None,
        }
    }
}

/// Bounds on the terminal registry.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    /// A terminal not seen for this long is logged out and forgotten.
    pub idle_timeout: Duration,
    pub max_open: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(8 * 60 * 60),
            max_open: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub database_url: Option<String>,
    pub demo: DemoConfig,
    pub scanner: ScannerConfig,
    pub terminals: TerminalConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = ScannerConfig::default();
        let scanner = ScannerConfig {
            viewport: std::env::var("SCANNER_VIEWPORT").unwrap_or(defaults.viewport),
            facing_mode: std::env::var("CAMERA_FACING_MODE").unwrap_or(defaults.facing_mode),
            fps: env_parse("SCAN_FPS").unwrap_or(defaults.fps),
            qrbox: env_parse("SCAN_QRBOX").unwrap_or(defaults.qrbox),
            start_timeout: env_parse::<u64>("CAMERA_START_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        let demo_defaults = DemoConfig::default();
        let demo = DemoConfig {
            email: std::env::var("DEMO_EMAIL").unwrap_or(demo_defaults.email),
            password: std::env::var("DEMO_PASSWORD").unwrap_or(demo_defaults.password),
        };
        if !is_valid_email(&demo.email) {
            anyhow::bail!("DEMO_EMAIL is not a valid email: {}", demo.email);
        }

        let terminal_defaults = TerminalConfig::default();
        let terminals = TerminalConfig {
            idle_timeout: env_parse::<u64>("TERMINAL_IDLE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(terminal_defaults.idle_timeout),
            max_open: env_parse::<usize>("MAX_TERMINALS")
                .filter(|n| *n > 0)
                .unwrap_or(terminal_defaults.max_open),
        };

        let port = env_parse("APP_PORT")
            .or_else(|| env_parse("PORT"))
            .unwrap_or(3000);

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            static_dir: std::env::var("STATIC_DIR")
                .unwrap_or_else(|_| "public".into())
                .into(),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            demo,
            scanner,
            terminals,
        })
    }
}
