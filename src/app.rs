use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use crate::state::AppState;
use crate::{auth, punches, scan, terminal};

pub fn build_app(state: AppState) -> Router {
    let assets = state.config.static_dir.clone();
    let index = ServeFile::new(assets.join("index.html"));

    Router::new()
        .nest("/api/v1",
              Router::new()
                  .merge(auth::router())
                  .merge(terminal::router())
                  .merge(scan::router())
                  .merge(punches::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .route_service("/", index)
        .fallback_service(ServeDir::new(assets))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("punchclock listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod app_tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::*;
    use crate::storage::MemoryStore;

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/v1/login",
            None,
            Some(json!({"email": "demo@demo.be", "password": "demo"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/login",
            None,
            Some(json!({"email": "demo@demo.be", "password": "letmein"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["error"]["message"],
            "Invalid demo login. Use demo@demo.be / demo."
        );
    }

    #[tokio::test]
    async fn scan_without_token_is_not_authenticated() {
        let app = build_app(AppState::fake());
        let (status, _) = call(&app, "POST", "/api/v1/scan/start", None, Some(json!({"mode": "IN"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let bogus = uuid::Uuid::new_v4().to_string();
        let (status, _) = call(&app, "GET", "/api/v1/punches", Some(&bogus), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn fresh_user_sees_no_records_message() {
        let app = build_app(AppState::fake());
        let token = login(&app).await;
        let (status, body) = call(&app, "GET", "/api/v1/punches", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ledger"]["status"], "empty");
        assert_eq!(body["message"], "No records yet.");
    }

    #[tokio::test]
    async fn scan_decode_records_one_punch() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = login(&app).await;

        let (_, body) = call(&app, "POST", "/api/v1/scan/start", Some(&token), Some(json!({"mode": "IN"}))).await;
        assert_eq!(body["scan"], "active");
        assert_eq!(body["viewport_visible"], true);
        let scan = body["scan_id"].as_u64().unwrap();

        let (_, body) = call(&app, "POST", "/api/v1/scan/decode-error", Some(&token), Some(json!({"scan": scan, "message": "no code"}))).await;
        assert_eq!(body["scan"], "active");

        let (_, body) = call(&app, "POST", "/api/v1/scan/decode", Some(&token), Some(json!({"scan": scan, "text": "ENTRANCE"}))).await;
        assert_eq!(body["punch"]["type"], "IN");
        assert_eq!(body["punch"]["location"], "ENTRANCE");
        assert_eq!(body["scan"], "idle");

        // same code seen in a later frame
        let (_, body) = call(&app, "POST", "/api/v1/scan/decode", Some(&token), Some(json!({"scan": scan, "text": "ENTRANCE"}))).await;
        assert!(body.get("punch").is_none());

        let (_, body) = call(&app, "GET", "/api/v1/punches", Some(&token), None).await;
        assert_eq!(body["ledger"]["status"], "entries");
        assert_eq!(body["ledger"]["punches"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn late_decode_after_next_start_is_dropped() {
        let app = build_app(AppState::fake());
        let token = login(&app).await;

        let (_, body) = call(&app, "POST", "/api/v1/scan/start", Some(&token), Some(json!({"mode": "IN"}))).await;
        let in_scan = body["scan_id"].as_u64().unwrap();
        let (_, body) = call(&app, "POST", "/api/v1/scan/decode", Some(&token), Some(json!({"scan": in_scan, "text": "ENTRANCE"}))).await;
        assert_eq!(body["punch"]["type"], "IN");

        let (_, body) = call(&app, "POST", "/api/v1/scan/start", Some(&token), Some(json!({"mode": "OUT"}))).await;
        assert_ne!(body["scan_id"].as_u64().unwrap(), in_scan);

        // duplicate frame of the IN scan, delivered late
        let (status, body) = call(&app, "POST", "/api/v1/scan/decode", Some(&token), Some(json!({"scan": in_scan, "text": "ENTRANCE"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("punch").is_none());
        assert_eq!(body["scan"], "active");
        assert_eq!(body["mode"], "OUT");

        let (_, body) = call(&app, "GET", "/api/v1/punches", Some(&token), None).await;
        let punches = body["ledger"]["punches"].as_array().unwrap();
        assert_eq!(punches.len(), 1);
        assert_eq!(punches[0]["type"], "IN");
    }

    #[tokio::test]
    async fn decode_without_scan_id_is_rejected() {
        let app = build_app(AppState::fake());
        let token = login(&app).await;
        call(&app, "POST", "/api/v1/scan/start", Some(&token), Some(json!({"mode": "IN"}))).await;
        let (status, _) = call(&app, "POST", "/api/v1/scan/decode", Some(&token), Some(json!({"text": "ENTRANCE"}))).await;
        assert!(status.is_client_error());

        let (_, body) = call(&app, "GET", "/api/v1/punches", Some(&token), None).await;
        assert_eq!(body["ledger"]["status"], "empty");
    }

    #[tokio::test]
    async fn empty_credentials_get_the_demo_hint() {
        let app = build_app(AppState::fake());
        for payload in [json!({}), json!({"email": "", "password": ""}), json!({"email": "demo@demo.be"})] {
            let (status, body) = call(&app, "POST", "/api/v1/login", None, Some(payload)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                body["error"]["message"],
                "Invalid demo login. Use demo@demo.be / demo."
            );
        }
    }

    #[tokio::test]
    async fn repeated_logins_stay_within_terminal_limit() {
        let fake = AppState::fake();
        let mut config = (*fake.config).clone();
        config.terminals.max_open = 4;
        let state = AppState::from_parts(
            Arc::new(config),
            Arc::new(MemoryStore::new()),
            fake.decoders.clone(),
            fake.clock.clone(),
        );
        let app = build_app(state.clone());

        let mut last = String::new();
        for _ in 0..20 {
            last = login(&app).await;
        }
        assert_eq!(state.terminals.count().await, 4);
        let (status, _) = call(&app, "GET", "/api/v1/me", Some(&last), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_closes_terminal() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = login(&app).await;
        call(&app, "POST", "/api/v1/scan/start", Some(&token), Some(json!({"mode": "OUT"}))).await;

        let (status, _) = call(&app, "POST", "/api/v1/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.terminals.count().await, 0);

        let (status, _) = call(&app, "GET", "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn entry_document_is_served() {
        let app = build_app(AppState::fake());
        let res = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let ct = res.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(ct.starts_with("text/html"));

        for (path, kind) in [
            ("/app.js", "javascript"),
            ("/sw.js", "javascript"),
            ("/style.css", "text/css"),
            ("/manifest.webmanifest", ""),
        ] {
            let res = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK, "{path}");
            let ct = res.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
            assert!(ct.contains(kind), "{path}: {ct}");
        }
    }
}
