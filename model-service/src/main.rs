//! Flood Risk Model Service
//!
//! Serves flood-risk predictions from the artifacts written by the `train`
//! binary.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FLOOD MODEL SERVICE                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │ /predict  │  │ /api/     │  │ /health                 │ │
//! │  │ (tensor)  │  │ predict/  │  │ /api/engine/status      │ │
//! │  │           │  │ run       │  │                         │ │
//! │  └─────┬─────┘  └─────┬─────┘  └────────────┬────────────┘ │
//! │        └──────────────┼──────────────────────┘              │
//! │                       ▼                                     │
//! │          ┌─────────────────────────┐                       │
//! │          │ InferencePipeline (Arc) │                       │
//! │          └─────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod handlers;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flood_risk_core::{ArtifactStore, InferencePipeline};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "flood_model_service=debug,flood_risk_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();

    let store = ArtifactStore::from_env();

    tracing::info!("Flood Model Service starting ({})...", config.environment);
    if !config.is_production() {
        tracing::info!("Artifacts: {}", store.dir().display());
    }

    // Artifacts are loaded once; a failed load leaves the service up in
    // model-unavailable mode
    let pipeline = InferencePipeline::load(&store);
    if !pipeline.is_ready() {
        tracing::warn!("Model not loaded; /predict will return errors until artifacts are trained");
    }

    // Build application state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/api/predict/run", post(handlers::gateway::run))
        .route("/api/engine/status", get(handlers::health::engine_status))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use flood_risk_core::{
        constants::SEQ_LEN,
        logic::model::{FeatureScaler, ModelConfig, RiskModel},
        FeatureVector,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_config() -> config::Config {
        config::Config {
            port: 0,
            environment: "test".to_string(),
        }
    }

    fn ready_app() -> Router {
        let scaler = FeatureScaler::fit(&[
            FeatureVector::new(0.0, 20.0, 40.0, 990.0),
            FeatureVector::new(20.0, 35.0, 100.0, 1030.0),
        ])
        .unwrap();
        let model = RiskModel::new(ModelConfig { lstm_units: 8, dense_units: 4, ..Default::default() }, 42);
        create_router(AppState {
            pipeline: Arc::new(InferencePipeline::new(scaler, model)),
            config: test_config(),
        })
    }

    fn offline_app() -> Router {
        create_router(AppState {
            pipeline: Arc::new(InferencePipeline::unavailable("artifacts not found")),
            config: test_config(),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn send_raw(app: Router, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn window(row: [f32; 4]) -> Value {
        json!(vec![row.to_vec(); SEQ_LEN])
    }

    #[tokio::test]
    async fn test_health_reports_model_state() {
        let (status, body) = send(offline_app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], false);

        let (_, body) = send(ready_app(), "GET", "/health", None).await;
        assert_eq!(body["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_predict_missing_features() {
        for body in [json!({}), json!({ "features": null }), json!({ "features": [] })] {
            let (status, body) = send(ready_app(), "POST", "/predict", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({ "error": "No features provided" }));
        }
    }

    #[tokio::test]
    async fn test_predict_unreadable_body_is_json_400() {
        let (status, body) = send_raw(ready_app(), "/predict", Some("application/json"), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());

        let valid = json!({ "features": [window([0.0, 20.0, 40.0, 990.0])] }).to_string();
        let (status, body) = send_raw(ready_app(), "/predict", None, &valid).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let request = json!({ "features": [window([0.0, 20.0, 40.0, 990.0])] });
        let (status, body) = send(offline_app(), "POST", "/predict", Some(request)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Model not loaded: artifacts not found");
    }

    #[tokio::test]
    async fn test_predict_shape_errors() {
        let short = json!({ "features": [[[1.0, 2.0, 3.0, 4.0]]] });
        let (status, body) = send(ready_app(), "POST", "/predict", Some(short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("timesteps"));

        let flat = json!({ "features": [1.0, 2.0, 3.0, 4.0] });
        let (status, _) = send(ready_app(), "POST", "/predict", Some(flat)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_batch() {
        let request = json!({
            "features": [window([0.0, 20.0, 40.0, 990.0]), window([15.0, 26.0, 95.0, 1000.0])]
        });
        let (status, body) = send(ready_app(), "POST", "/predict", Some(request)).await;

        assert_eq!(status, StatusCode::OK);
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(body["probability"], predictions[0]["probability"]);
        assert_eq!(body["category"], predictions[0]["category"]);

        let p = body["probability"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&p));
        assert!(["Aman", "Siaga", "Awas"].contains(&body["category"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_gateway_fallback_when_offline() {
        let heavy = json!({ "features": [[{ "rainfall": 30 }, { "rainfall": 25 }]] });
        let (status, body) = send(offline_app(), "POST", "/api/predict/run", Some(heavy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({
            "result": 1,
            "category": "Siaga (Fallback)",
            "probability": 85.0,
            "note": "Model offline"
        }));

        let light = json!({ "features": [[{ "rainfall": 2 }]] });
        let (_, body) = send(offline_app(), "POST", "/api/predict/run", Some(light)).await;
        assert_eq!(body["result"], 0);
        assert_eq!(body["category"], "Aman (Fallback)");
    }

    #[tokio::test]
    async fn test_gateway_unreadable_body_falls_back() {
        for (content_type, body) in [(Some("application/json"), "{not json"), (None, "{\"features\": []}")] {
            let (status, body) = send_raw(ready_app(), "/api/predict/run", content_type, body).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["result"], 0);
            assert_eq!(body["category"], "Aman (Fallback)");
            assert_eq!(body["note"], "Model offline");
        }
    }

    #[tokio::test]
    async fn test_gateway_fallback_on_short_window() {
        // A loaded model still rejects a window shorter than SEQ_LEN
        let request = json!({ "features": [[{ "rainfall": 60 }]] });
        let (_, body) = send(ready_app(), "POST", "/api/predict/run", Some(request)).await;
        assert_eq!(body["category"], "Siaga (Fallback)");
        assert_eq!(body["note"], "Model offline");
    }

    #[tokio::test]
    async fn test_gateway_uses_model() {
        let readings: Vec<Value> = (0..SEQ_LEN)
            .map(|_| json!({ "rainfall": 3.0, "temp": 27.5, "humidity": 82.0, "pressure": 1008.0 }))
            .collect();
        let (status, body) = send(ready_app(), "POST", "/api/predict/run", Some(json!({ "features": [readings] }))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("note").is_none());
        let category = body["category"].as_str().unwrap();
        let expected = if category == "Aman" { 0 } else { 1 };
        assert_eq!(body["result"], expected);
    }

    #[tokio::test]
    async fn test_engine_status() {
        let app = ready_app();
        let request = json!({ "features": [window([1.0, 28.0, 75.0, 1010.0])] });
        let (status, _) = send(app.clone(), "POST", "/predict", Some(request)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, "GET", "/api/engine/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["inference_count"], 1);
        assert_eq!(body["seq_len"], SEQ_LEN);
    }
}
