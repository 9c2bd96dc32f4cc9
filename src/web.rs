//! HTTP surface of the prediction service.
//!
//! Two front doors share one pipeline: a JSON API for programmatic
//! callers and a form page for humans. Both run the same adapt,
//! standardize, score path; only the response rendering differs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::MedvError;
use crate::features::{RawFeatures, FEATURE_COUNT};
use crate::state::AppState;

/// Marker in the form page replaced with the outcome fragment.
const RESULT_MARKER: &str = "<!--RESULT-->";

#[derive(Serialize)]
pub struct PredictResponse {
    success: bool,
    prediction: f64,
    formatted: String,
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Form UI
        .route("/", get(home).post(form_predict))
        // JSON API
        .route("/api/predict", post(api_predict))
        // Health and status
        .route("/health", get(health))
        .route("/api/status", get(api_status))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}

async fn home(State(st): State<Arc<AppState>>) -> Html<String> {
    Html(render_form_page(&st.form_page, ""))
}

#[axum::debug_handler]
async fn api_predict(
    State(st): State<Arc<AppState>>,
    body: String,
) -> Result<Json<PredictResponse>, MedvError> {
    let parsed: Value = serde_json::from_str(&body)
        .map_err(|_| MedvError::validation("body", "request body is not valid JSON"))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| MedvError::validation("body", "request body must be a JSON object"))?;

    let raw = RawFeatures::from_json(object).inspect_err(|e| {
        warn!(error = %e, "rejected prediction request");
    })?;
    let prediction = st.pipeline.predict(&raw)?;
    info!(fields = raw.len(), prediction, "prediction served");

    Ok(Json(PredictResponse {
        success: true,
        prediction,
        formatted: format!("{prediction:.2}"),
    }))
}

#[axum::debug_handler]
async fn form_predict(
    State(st): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let outcome = RawFeatures::from_form(&fields).and_then(|raw| st.pipeline.predict(&raw));
    match outcome {
        Ok(prediction) => {
            info!(prediction, "form prediction served");
            let fragment = format!(
                r#"<p class="result">Predicted median value: <strong>{prediction:.2}</strong> (in $1000s)</p>"#
            );
            Html(render_form_page(&st.form_page, &fragment)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "form prediction failed");
            // Error text is built from field names and static messages,
            // never from request values, so it embeds directly.
            let fragment = format!(r#"<p class="error">{e}</p>"#);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_form_page(&st.form_page, &fragment)),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn api_status(State(st): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
        "features": FEATURE_COUNT,
        "model": {
            "trees": st.pipeline.tree_count(),
            "learning_rate": st.pipeline.learning_rate(),
        },
        "artifacts": {
            "scaler": st.config.scaler_path.display().to_string(),
            "model": st.config.model_path.display().to_string(),
        },
        "started_at": st.started_at.to_rfc3339(),
        "uptime_seconds": st.uptime_seconds(),
    }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

fn render_form_page(page: &str, fragment: &str) -> String {
    page.replace(RESULT_MARKER, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_the_marker() {
        let page = format!("<body>{RESULT_MARKER}</body>");
        assert_eq!(render_form_page(&page, "<p>42</p>"), "<body><p>42</p></body>");
        assert_eq!(render_form_page(&page, ""), "<body></body>");
    }

    #[test]
    fn predict_response_shape_is_stable() {
        let body = serde_json::to_value(PredictResponse {
            success: true,
            prediction: 24.019,
            formatted: "24.02".to_string(),
        })
        .unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["prediction"], json!(24.019));
        assert_eq!(body["formatted"], json!("24.02"));
    }
}
