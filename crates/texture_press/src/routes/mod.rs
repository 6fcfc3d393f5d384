//! HTTP routing

pub mod api;
pub mod compress;

use crate::config::{MetricsConfig, StorageConfig};
use actix_web::web;

/// Registers every route. Static directories come last so they never shadow the API.
pub fn configure(cfg: &mut web::ServiceConfig, storage: &StorageConfig, metrics: &MetricsConfig) {
    cfg.route("/compress", web::post().to(compress::compress))
        .route("/latest-ktx2", web::get().to(api::latest_ktx2))
        .route("/health", web::get().to(api::health_check))
        .route(crate::libs::scalar::OPENAPI_URL, web::get().to(api::openapi_json))
        .route("/api-docs", web::get().to(api::scalar_docs));

    if metrics.enabled {
        cfg.route(&metrics.path, web::get().to(api::metrics_handler));
    }

    cfg.service(actix_files::Files::new("/uploads", &storage.uploads_dir))
        .service(actix_files::Files::new("/preview", &storage.preview_dir))
        .service(actix_files::Files::new("/", &storage.public_dir).index_file("index.html"));
}
