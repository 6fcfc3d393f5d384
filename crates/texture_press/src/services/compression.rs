//! One compression request from persisted upload to renamed artifacts

use crate::config::Config;
use crate::models::error::{CompressError, InputError};
use crate::models::types::{CompressedArtifact, CompressionRequest, UploadedFile};
use crate::services::command_builder::CommandBuilder;
use crate::services::housekeeping::ScratchSpace;
use crate::services::image_validator::{self, SourceFormat};
use crate::services::invoker::CompressorInvoker;
use crate::services::output_resolver::OutputResolver;
use crate::utils::metrics::get_metrics;
use crate::utils::padding::pad_to_multiple_of_four;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{field, info, instrument, warn, Span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub request_id: Uuid,
    pub artifacts: Vec<CompressedArtifact>,
    /// Size of the upload as received, before any padding or transcoding.
    pub original_size: u64,
    /// Wall time spent inside both compressor runs.
    pub compressor_time: Duration,
}

#[derive(Debug, Clone)]
pub struct CompressionSettings {
    pub upload_max_age: Duration,
    pub preview_max_age: Duration,
    pub auto_pad: bool,
}

impl From<&Config> for CompressionSettings {
    fn from(config: &Config) -> Self {
        Self {
            upload_max_age: config.housekeeping.upload_max_age,
            preview_max_age: config.housekeeping.preview_max_age,
            auto_pad: config.uploads.auto_pad,
        }
    }
}

/// Result of the work done inside one request directory.
struct Staged {
    original_size: u64,
    artifacts: Vec<CompressedArtifact>,
    compressor_time: Duration,
}

pub struct CompressionService {
    scratch: Arc<ScratchSpace>,
    builder: CommandBuilder,
    invoker: CompressorInvoker,
    resolver: OutputResolver,
    settings: CompressionSettings,
}

impl CompressionService {
    pub fn new(
        scratch: Arc<ScratchSpace>,
        builder: CommandBuilder,
        invoker: CompressorInvoker,
        settings: CompressionSettings,
    ) -> Self {
        Self {
            scratch,
            builder,
            invoker,
            resolver: OutputResolver::new(),
            settings,
        }
    }

    pub fn from_config(config: &Config, scratch: Arc<ScratchSpace>) -> Self {
        Self::new(
            scratch,
            CommandBuilder::new(config.compressor.resolved_binary()),
            CompressorInvoker::new(config.compressor.timeout),
            CompressionSettings::from(config),
        )
    }

    /// Both sweeps. Failures are logged and never abort the caller.
    pub async fn housekeeping(&self) {
        match self.scratch.sweep_uploads(self.settings.upload_max_age).await {
            Ok(removed) => get_metrics().record_housekeeping("uploads", removed),
            Err(e) => warn!(error = %e, "Error cleaning up old uploads"),
        }
        match self.scratch.sweep_previews(self.settings.preview_max_age).await {
            Ok(removed) => get_metrics().record_housekeeping("preview", removed),
            Err(e) => warn!(error = %e, "Error cleaning up old previews"),
        }
    }

    /// Compresses `upload` into `.basis` and `.ktx2` inside a fresh request directory.
    ///
    /// The upload is deleted whatever the outcome; the request directory is kept
    /// only on success.
    #[instrument(
        skip(self, upload, request),
        fields(upload = %upload.stored_name, mode = %request.mode, request_id = field::Empty)
    )]
    pub async fn compress(
        &self,
        upload: &UploadedFile,
        request: &CompressionRequest,
    ) -> Result<CompressionOutcome, CompressError> {
        self.housekeeping().await;

        let request_id = Uuid::new_v4();
        Span::current().record("request_id", field::display(request_id));
        let result = match self.scratch.create_request_dir(request_id).await {
            Ok(dir) => self.run(upload, request, &dir).await,
            Err(e) => Err(e.into()),
        };

        self.scratch.remove_file(&upload.path).await;

        match result {
            Ok(Staged {
                original_size,
                artifacts,
                compressor_time,
            }) => {
                info!(
                    count = artifacts.len(),
                    compressor_ms = compressor_time.as_millis() as u64,
                    "Compression succeeded"
                );
                Ok(CompressionOutcome {
                    request_id,
                    artifacts,
                    original_size,
                    compressor_time,
                })
            }
            Err(e) => {
                self.scratch.discard_request_dir(request_id).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        upload: &UploadedFile,
        request: &CompressionRequest,
        dir: &Path,
    ) -> Result<Staged, CompressError> {
        let original_size = fs::metadata(&upload.path).await?.len();
        let format = image_validator::detect_file_format(&upload.path).await?;

        let stem = Path::new(&upload.stored_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());

        let source = self.stage_input(upload, format, dir, &stem).await?;
        let input_file = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let commands = self.builder.build_pair(request, &input_file);
        let invoked = self.invoker.run_all(&commands, dir).await;
        self.scratch.remove_file(&source).await;
        let compressor_time = invoked?;

        let artifacts = self.resolver.resolve(dir, &stem, &request.name).await?;
        for artifact in &artifacts {
            get_metrics().record_artifact(artifact.texture_type.extension(), artifact.size);
        }
        Ok(Staged {
            original_size,
            artifacts,
            compressor_time,
        })
    }

    /// Places the compressor input in `dir`: padded if enabled, PNG if the
    /// compressor cannot read the upload, otherwise a plain copy. Dimensions are
    /// validated on whatever ends up there.
    async fn stage_input(
        &self,
        upload: &UploadedFile,
        format: SourceFormat,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, CompressError> {
        let png_target = dir.join(format!("{}.png", stem));

        if self.settings.auto_pad {
            let bytes = fs::read(&upload.path).await?;
            let padded = tokio::task::spawn_blocking(move || pad_to_multiple_of_four(&bytes))
                .await
                .map_err(|e| std::io::Error::other(format!("Task join error: {}", e)))?
                .map_err(|e| InputError::UndecodableImage(e.to_string()))?;
            if padded.changed {
                info!(width = padded.width, height = padded.height, "Padded image to multiples of 4");
                fs::write(&png_target, &padded.bytes).await?;
                return Ok(png_target);
            }
        }

        let (width, height) = image_validator::dimensions(&upload.path).await?;
        image_validator::validate_dimensions(width, height)?;

        if format.needs_transcode() {
            image_validator::transcode_to_png(&upload.path, &png_target).await?;
            return Ok(png_target);
        }

        let target = dir.join(format!("{}.{}", stem, format.extension()));
        fs::copy(&upload.path, &target).await?;
        Ok(target)
    }
}
