//! HTTP endpoint the design-tool plugin talks to

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use critique_core::{AnalyzePayload, ErrorResponse, ProbeResponse};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::service::AnalysisService;

/// Build the router: `POST /` and `POST /analyze`
pub fn router(service: Arc<AnalysisService>) -> Router {
    Router::new()
        .route(
            "/",
            post(analyze)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/analyze",
            post(analyze)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Bind and serve until Ctrl-C
pub async fn serve(service: Arc<AnalysisService>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Listening for analysis requests");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

async fn analyze(State(service): State<Arc<AnalysisService>>, body: Bytes) -> Response {
    let payload: AnalyzePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Rejected malformed request body");
            return failure(format!("Invalid request body: {}", e));
        }
    };

    if payload.test {
        return Json(ProbeResponse::now()).into_response();
    }

    match service.handle(&payload).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(error = %e, "Analysis request failed");
            failure(e.to_string())
        }
    }
}

fn failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
        .into_response()
}
