//! Scratch directories: per-request output dirs and age-based sweeps

use crate::models::error::HousekeepingError;
use crate::models::types::TextureType;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Most recent `.ktx2` output, relative to the preview root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestOutput {
    pub filename: String,
    pub relative_path: String,
}

pub struct ScratchSpace {
    uploads: PathBuf,
    preview: PathBuf,
}

impl ScratchSpace {
    pub fn new(uploads: PathBuf, preview: PathBuf) -> Self {
        Self { uploads, preview }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.uploads).await?;
        fs::create_dir_all(&self.preview).await?;
        Ok(())
    }

    pub fn request_dir(&self, request_id: Uuid) -> PathBuf {
        self.preview.join(request_id.to_string())
    }

    /// Creates an empty directory owned by a single request.
    pub async fn create_request_dir(&self, request_id: Uuid) -> std::io::Result<PathBuf> {
        let path = self.request_dir(request_id);
        if fs::try_exists(&path).await? {
            fs::remove_dir_all(&path).await?;
        }
        fs::create_dir_all(&path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            fs::set_permissions(&path, perms).await?;
        }

        info!("Created request directory at {}", path.display());
        Ok(path)
    }

    /// Best-effort removal of a request's directory.
    pub async fn discard_request_dir(&self, request_id: Uuid) {
        let path = self.request_dir(request_id);
        match fs::remove_dir_all(&path).await {
            Ok(()) => info!("Removed request directory {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove request directory {}: {}", path.display(), e),
        }
    }

    /// Best-effort removal of a single file.
    pub async fn remove_file(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to delete {}: {}", path.display(), e);
            }
        }
    }

    /// Deletes uploaded files last modified more than `max_age` ago.
    pub async fn sweep_uploads(&self, max_age: Duration) -> Result<usize, HousekeepingError> {
        self.sweep_uploads_at(max_age, Utc::now()).await
    }

    pub async fn sweep_uploads_at(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, HousekeepingError> {
        let cleaned = sweep(&self.uploads, cutoff(now, max_age)?, EntryKind::Files).await?;
        if cleaned > 0 {
            info!("Deleted {} old uploads", cleaned);
        }
        Ok(cleaned)
    }

    /// Deletes request directories last modified more than `max_age` ago.
    pub async fn sweep_previews(&self, max_age: Duration) -> Result<usize, HousekeepingError> {
        self.sweep_previews_at(max_age, Utc::now()).await
    }

    pub async fn sweep_previews_at(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, HousekeepingError> {
        let cleaned = sweep(&self.preview, cutoff(now, max_age)?, EntryKind::Any).await?;
        if cleaned > 0 {
            info!("Deleted {} old preview directories", cleaned);
        }
        Ok(cleaned)
    }

    /// Newest `.ktx2` across all request directories, by modification time.
    pub async fn latest_ktx2(&self) -> Result<Option<LatestOutput>, HousekeepingError> {
        let mut latest: Option<(DateTime<Utc>, LatestOutput)> = None;
        let mut dirs = match fs::read_dir(&self.preview).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_dir_error(&self.preview)(e)),
        };

        while let Some(dir) = dirs.next_entry().await.map_err(read_dir_error(&self.preview))? {
            if !dir.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Some((modified, filename)) = newest_ktx2_in(&dir.path()).await? else {
                continue;
            };
            if latest.as_ref().is_some_and(|(seen, _)| *seen >= modified) {
                continue;
            }

            let relative_path = format!("{}/{}", dir.file_name().to_string_lossy(), filename);
            latest = Some((
                modified,
                LatestOutput {
                    filename,
                    relative_path,
                },
            ));
        }

        Ok(latest.map(|(_, output)| output))
    }
}

fn read_dir_error(path: &Path) -> impl FnOnce(std::io::Error) -> HousekeepingError {
    let path = path.to_path_buf();
    move |source| HousekeepingError::ReadDir { path, source }
}

/// Newest `.ktx2` directly inside `dir`. A directory removed mid-scan (a failed
/// request being discarded, or a sweep) counts as empty.
async fn newest_ktx2_in(dir: &Path) -> Result<Option<(DateTime<Utc>, String)>, HousekeepingError> {
    let mut files = match fs::read_dir(dir).await {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_dir_error(dir)(e)),
    };

    let mut newest: Option<(DateTime<Utc>, String)> = None;
    loop {
        let file = match files.next_entry().await {
            Ok(Some(file)) => file,
            Ok(None) => break,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(read_dir_error(dir)(e)),
        };
        if TextureType::from_path(&file.path()) != Some(TextureType::Ktx2) {
            continue;
        }
        let Ok(modified) = file.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        let modified: DateTime<Utc> = modified.into();
        if newest.as_ref().is_some_and(|(seen, _)| *seen >= modified) {
            continue;
        }
        newest = Some((modified, file.file_name().to_string_lossy().into_owned()));
    }
    Ok(newest)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Files,
    Any,
}

fn cutoff(now: DateTime<Utc>, max_age: Duration) -> Result<DateTime<Utc>, HousekeepingError> {
    let max_age = chrono::Duration::from_std(max_age)
        .map_err(|e| HousekeepingError::InvalidRetention(e.to_string()))?;
    Ok(now - max_age)
}

async fn sweep(
    root: &Path,
    cutoff: DateTime<Utc>,
    kind: EntryKind,
) -> Result<usize, HousekeepingError> {
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|source| HousekeepingError::ReadDir {
            path: root.to_path_buf(),
            source,
        })?;

    let mut cleaned = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(HousekeepingError::ReadDir {
                    path: root.to_path_buf(),
                    source,
                })
            }
        };

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to stat {:?}: {}", entry.path(), e);
                continue;
            }
        };
        if kind == EntryKind::Files && !metadata.is_file() {
            continue;
        }

        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let modified: DateTime<Utc> = modified.into();
        if modified >= cutoff {
            continue;
        }

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(entry.path()).await
        } else {
            fs::remove_file(entry.path()).await
        };
        match removed {
            Ok(()) => cleaned += 1,
            Err(e) => error!("Failed to remove {:?}: {}", entry.path(), e),
        }
    }

    Ok(cleaned)
}
