use axum::{routing::post, Json, Router};
use tracing::{debug, instrument, warn};

use super::{
    decoder::DecodeEvent,
    dto::{DecodeErrorRequest, DecodedRequest, StartScanRequest},
    session::{Release, ScanError},
};
use crate::{
    auth::extractors::AuthTerminal, error::ApiError, state::AppState,
    terminal::dto::ActionResponse,
};

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/start", post(start_scan))
        .route("/scan/stop", post(stop_scan))
        .route("/scan/decode", post(decoded))
        .route("/scan/decode-error", post(decode_error))
}

#[instrument(skip(terminal))]
pub async fn start_scan(
    terminal: AuthTerminal,
    Json(body): Json<StartScanRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut controller = terminal.handle.controller.lock().await;
    match controller.start_scan(body.mode).await {
        Ok(()) => {}
        Err(ScanError::NotAuthenticated) => return Err(ApiError::NotAuthenticated),
        // reported through the view's status
        Err(e) => debug!(error = %e, "scan did not start"),
    }
    let punch = controller.pump().await?;
    Ok(Json(ActionResponse {
        view: controller.view(),
        punch,
    }))
}

#[instrument(skip(terminal))]
pub async fn stop_scan(
    terminal: AuthTerminal,
) -> Result<Json<ActionResponse>, ApiError> {
    terminal.handle.canceller.cancel();
    let mut controller = terminal.handle.controller.lock().await;
    if let Release::Absorbed(reason) = controller.stop_scan().await {
        warn!(%reason, "camera release failed");
    }
    Ok(Json(ActionResponse {
        view: controller.view(),
        punch: None,
    }))
}

#[instrument(skip(terminal, body))]
pub async fn decoded(
    terminal: AuthTerminal,
    Json(body): Json<DecodedRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut controller = terminal.handle.controller.lock().await;
    let text = body.text.unwrap_or_default();
    let punch = controller.relay(body.scan, DecodeEvent::Decoded(text)).await?;
    if punch.is_none() {
        debug!(scan = body.scan, "decode ignored; scan not running");
    }
    Ok(Json(ActionResponse {
        view: controller.view(),
        punch,
    }))
}

#[instrument(skip(terminal, body))]
pub async fn decode_error(
    terminal: AuthTerminal,
    Json(body): Json<DecodeErrorRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut controller = terminal.handle.controller.lock().await;
    controller
        .relay(body.scan, DecodeEvent::Error(body.message))
        .await?;
    Ok(Json(ActionResponse {
        view: controller.view(),
        punch: None,
    }))
}
