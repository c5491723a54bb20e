//! # Scan session
//!
//! Lifecycle of one camera-open → decode → camera-close cycle.
//!
//! ```text
//! Idle → Starting → Active → (Decoded | Failed | Stopped) → Idle
//! ```
//!
//! At most one decoder holds the camera at any time: a new start first awaits
//! the teardown of the previous session. The first decoded string of a session
//! is handed out once; everything after it is dropped with the event queue.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::decoder::{CameraConfig, DecodeEvent, DecodeSink, Decoder, DecoderError, DecoderFactory, ScanConfig};
use crate::{config::ScannerConfig, punches::repo_types::PunchType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Starting,
    Active,
    Decoded,
    Failed,
    Stopped,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
            Self::Decoded => "DECODED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Log in first.")]
    NotAuthenticated,
    #[error("Could not start camera: {0}")]
    CameraStart(DecoderError),
    #[error("scan stopped before the camera was ready")]
    Cancelled,
}

/// Outcome of releasing the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    Released,
    /// Release failed; the session was forced idle anyway.
    Absorbed(String),
}

/// The one decoded payload of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCompleted {
    pub mode: PunchType,
    pub text: String,
}

/// Interrupts a pending camera start from outside the session's owner.
#[derive(Debug, Clone)]
pub struct StartCanceller(Arc<Notify>);

impl StartCanceller {
    /// Cancels the start in flight, if any. Has no effect on later starts.
    pub fn cancel(&self) {
        self.0.notify_waiters();
    }
}

struct Live {
    generation: u64,
    decoder: Box<dyn Decoder>,
    mode: PunchType,
    sink: DecodeSink,
    events: mpsc::UnboundedReceiver<DecodeEvent>,
}

pub struct ScanSession {
    factory: Arc<dyn DecoderFactory>,
    config: ScannerConfig,
    state: ScanState,
    live: Option<Live>,
    viewport_visible: bool,
    cancel: Arc<Notify>,
    /// Bumped on every start; relayed events must carry the live value.
    generation: u64,
}

impl ScanSession {
    pub fn new(factory: Arc<dyn DecoderFactory>, config: ScannerConfig) -> Self {
        Self {
            factory,
            config,
            state: ScanState::Idle,
            live: None,
            viewport_visible: false,
            cancel: Arc::new(Notify::new()),
            generation: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn viewport_visible(&self) -> bool {
        self.viewport_visible
    }

    pub fn mode(&self) -> Option<PunchType> {
        self.live.as_ref().map(|l| l.mode)
    }

    /// Identifies the running scan to clients relaying decode events.
    pub fn generation(&self) -> Option<u64> {
        self.live.as_ref().map(|l| l.generation)
    }

    pub fn canceller(&self) -> StartCanceller {
        StartCanceller(self.cancel.clone())
    }

    /// Feeds the running decoder's queue; `None` when no session is live.
    #[cfg(test)]
    pub fn sink(&self) -> Option<DecodeSink> {
        self.live.as_ref().map(|l| l.sink.clone())
    }

    fn transition(&mut self, next: ScanState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "scan state");
            self.state = next;
        }
    }

    /// Opens the camera for a `mode` punch, replacing any running session.
    ///
    /// Callers are responsible for the authentication check.
    pub async fn start(&mut self, mode: PunchType) -> Result<(), ScanError> {
        if self.live.is_some() || matches!(self.state, ScanState::Starting | ScanState::Active) {
            self.stop().await;
        }

        self.generation += 1;
        let generation = self.generation;
        self.transition(ScanState::Starting);
        self.viewport_visible = true;

        let camera = CameraConfig {
            facing_mode: self.config.facing_mode.clone(),
        };
        let scan = ScanConfig {
            fps: self.config.fps,
            qrbox: self.config.qrbox,
        };
        let mut decoder = self.factory.create(&self.config.viewport);
        let (sink, events) = DecodeSink::channel();

        let cancel = self.cancel.clone();
        let cancelled = cancel.notified();
        let timeout = self.config.start_timeout;
        let started = {
            let open = decoder.start(&camera, &scan, sink.clone());
            let bounded = async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, open)
                        .await
                        .unwrap_or(Err(DecoderError::TimedOut(limit))),
                    None => open.await,
                }
            };
            tokio::select! {
                res = bounded => res,
                _ = cancelled => Err(DecoderError::Cancelled),
            }
        };

        match started {
            Ok(()) => {
                self.live = Some(Live {
                    generation,
                    decoder,
                    mode,
                    sink,
                    events,
                });
                self.transition(ScanState::Active);
                info!(%mode, generation, "camera started");
                Ok(())
            }
            Err(e) => {
                // the engine may hold the camera after a timeout or cancel
                if let Err(release) = decoder.stop().await {
                    debug!(error = %release, "release after failed start");
                }
                decoder.clear();
                self.viewport_visible = false;
                if matches!(e, DecoderError::Cancelled) {
                    self.transition(ScanState::Stopped);
                    self.transition(ScanState::Idle);
                    info!(%mode, "camera start cancelled");
                    return Err(ScanError::Cancelled);
                }
                self.transition(ScanState::Failed);
                warn!(%mode, error = %e, "camera start failed");
                self.transition(ScanState::Idle);
                Err(ScanError::CameraStart(e))
            }
        }
    }

    /// Drains pending engine events. Returns the first decoded payload and
    /// tears the session down; decode errors are skipped.
    pub async fn poll(&mut self) -> Option<ScanCompleted> {
        if self.state != ScanState::Active {
            return None;
        }
        let live = self.live.as_mut()?;

        let mut decoded = None;
        while let Ok(event) = live.events.try_recv() {
            match event {
                DecodeEvent::Decoded(text) => {
                    decoded = Some(ScanCompleted {
                        mode: live.mode,
                        text,
                    });
                    break;
                }
                DecodeEvent::Error(msg) => debug!(%msg, "decode noise"),
            }
        }

        let completed = decoded?;
        self.transition(ScanState::Decoded);
        self.teardown().await;
        Some(completed)
    }

    /// Pushes one engine event into the live session and polls it.
    ///
    /// Events addressed to an earlier scan are dropped, so a late frame from
    /// a finished scan cannot complete the next one.
    pub async fn deliver(&mut self, generation: u64, event: DecodeEvent) -> Option<ScanCompleted> {
        let live = self.live.as_ref()?;
        if live.generation != generation {
            debug!(live = live.generation, stale = generation, "event for a finished scan dropped");
            return None;
        }
        live.sink.send(event);
        self.poll().await
    }

    /// Releases the camera. Safe to call in any state.
    pub async fn stop(&mut self) -> Release {
        if self.live.is_none() {
            self.viewport_visible = false;
            self.transition(ScanState::Idle);
            return Release::Released;
        }
        self.transition(ScanState::Stopped);
        self.teardown().await
    }

    async fn teardown(&mut self) -> Release {
        let release = match self.live.take() {
            Some(mut live) => match live.decoder.stop().await {
                Ok(()) => {
                    live.decoder.clear();
                    Release::Released
                }
                Err(e) => {
                    warn!(error = %e, "camera release failed; forcing idle");
                    Release::Absorbed(e.to_string())
                }
            },
            None => Release::Released,
        };
        self.viewport_visible = false;
        self.transition(ScanState::Idle);
        release
    }
}
