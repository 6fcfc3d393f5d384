//! Application initialization and setup

use crate::config::Config;
use crate::services::compression::CompressionService;
use crate::services::housekeeping::ScratchSpace;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handler state.
pub struct AppState {
    pub config: Arc<Config>,
    pub scratch: Arc<ScratchSpace>,
    pub compression: Arc<CompressionService>,
}

impl AppState {
    /// Creates the scratch directories and wires the compression pipeline.
    pub async fn initialize(config: Config) -> std::io::Result<Self> {
        let scratch = Arc::new(ScratchSpace::new(
            config.storage.uploads_dir.clone(),
            config.storage.preview_dir.clone(),
        ));
        scratch.ensure_dirs().await?;

        let binary = config.compressor.resolved_binary();
        if binary.components().count() > 1 && !binary.exists() {
            warn!(
                binary = %binary.display(),
                "Compressor binary not found; /compress will fail until it is installed"
            );
        }

        let compression = Arc::new(CompressionService::from_config(&config, Arc::clone(&scratch)));
        info!(
            uploads = %config.storage.uploads_dir.display(),
            preview = %config.storage.preview_dir.display(),
            "Scratch directories ready"
        );

        Ok(Self {
            config: Arc::new(config),
            scratch,
            compression,
        })
    }

    /// Periodic sweeps on top of the ones run at the start of every request.
    pub fn spawn_housekeeping(&self) {
        let compression = Arc::clone(&self.compression);
        let period = self.config.housekeeping.sweep_interval;
        if period.is_zero() {
            return;
        }
        actix_web::rt::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                compression.housekeeping().await;
            }
        });
    }
}
