//! Decoder for browser terminals.
//!
//! The camera and the frame loop run client-side; decoded text is posted to
//! the API and pushed into the session's sink by the controller. On the
//! server the engine only has to mark the viewport as live.

use async_trait::async_trait;
use tracing::debug;

use super::decoder::{CameraConfig, DecodeSink, Decoder, DecoderError, DecoderFactory, ScanConfig};

pub struct RelayDecoder {
    viewport: String,
    sink: Option<DecodeSink>,
}

#[async_trait]
impl Decoder for RelayDecoder {
    async fn start(
        &mut self,
        camera: &CameraConfig,
        scan: &ScanConfig,
        sink: DecodeSink,
    ) -> Result<(), DecoderError> {
        if self.sink.is_some() {
            return Err(DecoderError::Camera(format!(
                "viewport {} already has a running scanner",
                self.viewport
            )));
        }
        debug!(viewport = %self.viewport, facing = %camera.facing_mode, fps = scan.fps, qrbox = scan.qrbox, "relay scanner started");
        self.sink = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DecoderError> {
        if self.sink.take().is_none() {
            return Err(DecoderError::Camera("scanner is not running".into()));
        }
        debug!(viewport = %self.viewport, "relay scanner stopped");
        Ok(())
    }

    fn clear(&mut self) {
        self.sink = None;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelayFactory;

impl DecoderFactory for RelayFactory {
    fn create(&self, viewport: &str) -> Box<dyn Decoder> {
        Box::new(RelayDecoder {
            viewport: viewport.to_string(),
            sink: None,
        })
    }
}
