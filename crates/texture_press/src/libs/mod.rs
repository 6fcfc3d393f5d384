//! Third-party integrations: OpenAPI document and the Scalar viewer

pub mod openapi;
pub mod scalar;
