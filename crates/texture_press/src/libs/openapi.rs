//! OpenAPI specification and documentation

use utoipa::OpenApi;

use crate::models::types::{
    CompressResponse, CompressedFile, ErrorBody, HealthStatus, LatestKtx2, TextureType,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "texture-press",
        description = "Converts uploaded images to Basis Universal textures (.basis / .ktx2)"
    ),
    paths(
        crate::routes::compress::compress,
        crate::routes::api::latest_ktx2,
        crate::routes::api::health_check,
        crate::routes::api::metrics_handler,
        crate::routes::api::openapi_json,
        crate::routes::api::scalar_docs,
    ),
    components(schemas(
        CompressResponse,
        CompressedFile,
        TextureType,
        LatestKtx2,
        ErrorBody,
        HealthStatus,
        crate::routes::compress::CompressForm,
    )),
    tags(
        (name = "compression", description = "Image to GPU texture conversion"),
        (name = "health", description = "Liveness"),
        (name = "metrics", description = "Prometheus metrics"),
        (name = "docs", description = "API documentation"),
    )
)]
pub struct ApiDoc;
