//! Read-only endpoints: health, metrics, latest output, API docs

use crate::app::AppState;
use crate::libs::openapi::ApiDoc;
use crate::models::types::{ErrorBody, HealthStatus, LatestKtx2};
use crate::utils::metrics::Metrics;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use tracing::error;
use utoipa::OpenApi;

fn error_body(message: &str) -> ErrorBody {
    ErrorBody {
        error: message.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api-docs/openapi.json",
    tag = "docs",
    responses(
        (status = 200, description = "Generated OpenAPI document", content_type = "application/json")
    )
)]
pub async fn openapi_json() -> web::Json<utoipa::openapi::OpenApi> {
    web::Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/api-docs",
    tag = "docs",
    responses(
        (status = 200, description = "Interactive API reference", content_type = "text/html")
    )
)]
pub async fn scalar_docs() -> HttpResponse {
    crate::libs::scalar::scalar_page()
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthStatus)
    )
)]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Prometheus text exposition"),
        (status = 500, description = "Encoding failed", body = ErrorBody)
    )
)]
pub async fn metrics_handler() -> HttpResponse {
    // Collectors register lazily; make sure a fresh process still lists them.
    Metrics::init();

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut body) {
        error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().json(error_body("Failed to encode metrics"));
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(body)
}

#[utoipa::path(
    get,
    path = "/latest-ktx2",
    tag = "compression",
    responses(
        (status = 200, description = "Most recently written KTX2 file", body = LatestKtx2),
        (status = 404, description = "No KTX2 output exists", body = ErrorBody),
        (status = 500, description = "Preview directory unreadable", body = ErrorBody)
    )
)]
pub async fn latest_ktx2(data: web::Data<AppState>) -> HttpResponse {
    match data.scratch.latest_ktx2().await {
        Ok(Some(latest)) => HttpResponse::Ok().json(LatestKtx2 {
            url: format!("/preview/{}", latest.relative_path),
            filename: latest.filename,
        }),
        Ok(None) => HttpResponse::NotFound().json(error_body("No KTX2 files found")),
        Err(e) => {
            error!(error = %e, "Error getting latest KTX2");
            HttpResponse::InternalServerError().json(error_body("Failed to get latest KTX2 file"))
        }
    }
}
