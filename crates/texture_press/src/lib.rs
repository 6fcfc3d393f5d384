//! texture-press
//!
//! HTTP front for the `basisu` command-line compressor: accepts an image upload,
//! runs the compressor once per container format (`.basis` and `.ktx2`), identifies
//! the outputs by magic number and serves them for preview.

pub mod app;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

// External library integrations
pub mod libs;

pub use app::AppState;
pub use config::Config;
pub use models::error::{CompressError, InputError, ResolutionError, ToolError};
pub use models::types::{
    CompressedArtifact, CompressionMode, CompressionRequest, TextureType, UploadedFile,
};
