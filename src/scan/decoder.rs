use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Camera selection handed to the decoding engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraConfig {
    pub facing_mode: String,
}

/// Decode rate and region of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanConfig {
    pub fps: u32,
    pub qrbox: u32,
}

/// What the engine reports while the camera is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Decoded(String),
    /// No code in frame, unreadable frame, etc.
    Error(String),
}

/// Write end of a scan session's event queue.
///
/// Sends after the session is gone are dropped silently.
#[derive(Debug, Clone)]
pub struct DecodeSink(mpsc::UnboundedSender<DecodeEvent>);

impl DecodeSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DecodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Returns `false` if nobody is listening anymore.
    pub fn send(&self, event: DecodeEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("{0}")]
    Camera(String),
    #[error("camera did not start within {0:?}")]
    TimedOut(Duration),
    #[error("camera start cancelled")]
    Cancelled,
}

/// A QR decoding engine bound to one camera viewport.
#[async_trait]
pub trait Decoder: Send {
    /// Opens the camera and begins delivering events into `sink`.
    async fn start(
        &mut self,
        camera: &CameraConfig,
        scan: &ScanConfig,
        sink: DecodeSink,
    ) -> Result<(), DecoderError>;

    /// Stops decoding and releases the camera.
    async fn stop(&mut self) -> Result<(), DecoderError>;

    /// Clears whatever the engine drew into the viewport.
    fn clear(&mut self);
}

pub trait DecoderFactory: Send + Sync {
    fn create(&self, viewport: &str) -> Box<dyn Decoder>;
}
