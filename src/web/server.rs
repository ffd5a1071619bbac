use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::api::reporter as reporter_handlers;
use super::api_doc::ApiDoc;
use super::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/reporter/start", post(reporter_handlers::start))
        .route("/api/reporter/stop", post(reporter_handlers::stop))
        .route("/api/reporter/status", get(reporter_handlers::status))
        .route(
            "/api/reporter/interval",
            put(reporter_handlers::set_interval),
        )
        .route(
            "/api/reporter/location",
            post(reporter_handlers::push_location),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    bind_addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::reporter::{Reporter, ReporterStatus};
    use crate::source::PushSource;
    use crate::store::MemoryStore;
    use crate::transport::HttpTransport;

    const MOSCOW: &str = r#"{"latitude":55.75,"longitude":37.61,"accuracy":5}"#;
    const OUT_OF_RANGE: &str = r#"{"latitude":123.0,"longitude":37.61,"accuracy":5}"#;

    const CONFIG: &str = r#"
collector: { url: "http://127.0.0.1:9/api/location" }
store: { path: unused.json }
location:
  source: { kind: push }
  distance_filter_m: 0
  interval: 0s
  fastest_interval: 0s
api_keys:
  - { key: admin, name: operator, permissions: [control, view_status, push_location] }
  - { key: viewer, name: dashboard, permissions: [view_status] }
"#;

    fn state() -> AppState {
        let config = Config::from_str(CONFIG).expect("config");
        let push = Arc::new(PushSource::new());
        let transport = HttpTransport::new(
            config.collector_url().expect("url"),
            config.collector.timeout,
        )
        .expect("transport");
        let reporter = Reporter::new(
            push.clone(),
            Arc::new(transport),
            Arc::new(MemoryStore::new()),
            config.location.watch_options(),
            config.reporting.default_interval_seconds,
        )
        .expect("reporter");

        AppState {
            config: Arc::new(config),
            reporter: Arc::new(Mutex::new(reporter)),
            push: Some(push),
        }
    }

    fn request(method: &str, uri: &str, key: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        request.expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("parse body")
    }

    #[tokio::test]
    async fn status_requires_api_key() {
        let app = build_router(state());

        let response = app
            .clone()
            .oneshot(request("GET", "/api/reporter/status", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "missing_api_key");

        let response = app
            .oneshot(request("GET", "/api/reporter/status", Some("nope"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "unknown_api_key");
    }

    #[tokio::test]
    async fn viewer_cannot_control() {
        let app = build_router(state());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/start", Some("viewer"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "missing_permission");
        assert_eq!(body["message"], "control");

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/location", Some("viewer"), Some(MOSCOW)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["message"], "push_location");

        let response = app
            .oneshot(request("GET", "/api/reporter/status", Some("viewer"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let status: serde_json::Value = json_body(response).await;
        assert_eq!(status["mode"], "Inactive");
        assert_eq!(status["interval_seconds"], 30);
    }

    #[tokio::test]
    async fn start_push_and_stop() {
        let state = state();
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/location", Some("admin"), Some(MOSCOW)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/start", Some("admin"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let mode = json_body(response).await;
        assert!(mode["Active"]["session_id"].is_string());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/location", Some("admin"), Some(MOSCOW)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["accepted"], true);

        // Let the worker pick the sample up.
        let mut status: Option<ReporterStatus> = None;
        for _ in 0..100 {
            let current = state.reporter.lock().await.status();
            if current.latest_sample.is_some() {
                status = Some(current);
                break;
            }
            tokio::task::yield_now().await;
        }
        let sample = status.expect("sample observed").latest_sample.expect("sample");
        assert_eq!(sample.latitude, 55.75);

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/stop", Some("admin"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!("Inactive"));
        assert!(!state.push.as_ref().expect("push").is_subscribed());
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let app = build_router(state());

        let response = app
            .clone()
            .oneshot(request("PUT", "/api/reporter/interval", Some("admin"), Some(r#"{"seconds":0}"#)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/start", Some("admin"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reporter/location", Some("admin"), Some(OUT_OF_RANGE)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request("PUT", "/api/reporter/interval", Some("admin"), Some(r#"{"seconds":45}"#)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let status = json_body(response).await;
        assert_eq!(status["interval_seconds"], 45);
        assert!(status["mode"]["Active"].is_object());
    }

    #[tokio::test]
    async fn push_is_disabled_without_push_source() {
        let mut state = state();
        state.push = None;
        let app = build_router(state);

        let response = app
            .oneshot(request("POST", "/api/reporter/location", Some("admin"), Some(MOSCOW)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let app = build_router(state());
        let response = app
            .oneshot(request("GET", "/api-doc/openapi.json", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/api/reporter/status"].is_object());
    }
}
