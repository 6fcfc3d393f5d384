use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything that can end a `/compress` request.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Compression failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Compression failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Compression failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// Short label used for the `errors_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            CompressError::Input(_) => "input",
            CompressError::Tool(_) => "tool",
            CompressError::Resolution(_) => "resolution",
            CompressError::Io(_) => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Unsupported file format. Please use PNG, JPG, WebP, or GIF.")]
    UnsupportedFormat,

    #[error("File is too large. Maximum size is {limit} bytes.")]
    FileTooLarge { limit: u64 },

    #[error("Image dimensions must be multiples of 4. Current: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid output name: {0}")]
    InvalidName(String),

    #[error("Failed to read image: {0}")]
    UndecodableImage(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start compressor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("compressor exited with {}: {}", exit_label(.code), .stderr.trim())]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("compressor timed out after {0:?}")]
    Timeout(Duration),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No compressed files found")]
    NoCompressedFiles,
}

/// Sweep failures. Logged by callers, never surfaced to clients.
#[derive(Debug, Error)]
pub enum HousekeepingError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid retention window: {0}")]
    InvalidRetention(String),
}

impl ResponseError for CompressError {
    fn status_code(&self) -> StatusCode {
        match self {
            CompressError::Input(
                InputError::MissingFile
                | InputError::UnsupportedFormat
                | InputError::FileTooLarge { .. }
                | InputError::InvalidName(_)
                | InputError::MalformedUpload(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_render_verbatim() {
        let err = CompressError::from(InputError::InvalidDimensions {
            width: 10,
            height: 7,
        });
        assert_eq!(
            err.to_string(),
            "Image dimensions must be multiples of 4. Current: 10x7"
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn tool_and_resolution_errors_are_wrapped() {
        let tool = CompressError::from(ToolError::NonZeroExit {
            code: Some(1),
            stderr: "bad input\n".to_string(),
        });
        assert_eq!(
            tool.to_string(),
            "Compression failed: compressor exited with status 1: bad input"
        );

        let resolution = CompressError::from(ResolutionError::NoCompressedFiles);
        assert_eq!(
            resolution.to_string(),
            "Compression failed: No compressed files found"
        );
        assert_eq!(resolution.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_file_is_a_bad_request() {
        let err = CompressError::from(InputError::MissingFile);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No file uploaded");
        assert_eq!(err.kind(), "input");
    }
}
