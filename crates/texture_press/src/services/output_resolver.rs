//! Identifies compressor outputs by their magic number and gives them canonical names
//!
//! The compressor's choice of extension is not trusted: each candidate's first four
//! bytes decide whether it is a `.basis` or a `.ktx2` container.

use crate::models::error::{CompressError, ResolutionError};
use crate::models::types::{CompressedArtifact, TextureType};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{info, instrument, warn};

/// Reads the first four bytes of `path` as a little-endian `u32`.
///
/// Returns `None` for files shorter than four bytes.
pub async fn sniff_magic(path: &Path) -> std::io::Result<Option<u32>> {
    let mut file = fs::File::open(path).await?;
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            return Ok(None);
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(header)))
}

/// Resolved type for a file whose extension says `by_extension`.
///
/// A known signature always wins; anything else leaves the extension's answer in place.
pub fn classify(by_extension: TextureType, magic: Option<u32>) -> TextureType {
    magic
        .and_then(TextureType::from_magic)
        .unwrap_or(by_extension)
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    by_extension: TextureType,
    resolved: TextureType,
}

#[derive(Debug, Clone, Default)]
pub struct OutputResolver;

impl OutputResolver {
    pub fn new() -> Self {
        Self
    }

    /// Finds `{stem}*.basis` / `{stem}*.ktx2` in `dir`, keeps at most one file per
    /// resolved type and renames the survivors to `{requested_name}.{type}`.
    ///
    /// Candidates are visited in name order. The first one of a type is kept unless a
    /// later one's extension matches its resolved type, in which case the later one
    /// replaces it. Discarded candidates are deleted.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn resolve(
        &self,
        dir: &Path,
        stem: &str,
        requested_name: &str,
    ) -> Result<Vec<CompressedArtifact>, CompressError> {
        let candidates = self.scan(dir, stem).await?;
        if candidates.is_empty() {
            return Err(ResolutionError::NoCompressedFiles.into());
        }

        let mut kept: BTreeMap<TextureType, Candidate> = BTreeMap::new();
        let mut discarded = Vec::new();
        for candidate in candidates {
            let replaces = candidate.by_extension == candidate.resolved;
            if kept.contains_key(&candidate.resolved) && !replaces {
                discarded.push(candidate.path);
            } else if let Some(previous) = kept.insert(candidate.resolved, candidate) {
                discarded.push(previous.path);
            }
        }

        for path in discarded {
            info!(file = %path.display(), "Discarding duplicate compressor output");
            if let Err(e) = fs::remove_file(&path).await {
                warn!(file = %path.display(), error = %e, "Failed to delete duplicate output");
            }
        }

        // Two phases so a kept file never overwrites another kept file that
        // currently sits at its target name.
        let mut staged = Vec::with_capacity(kept.len());
        for (texture_type, candidate) in kept {
            let staging = dir.join(format!(".{}.{}.part", requested_name, texture_type));
            fs::rename(&candidate.path, &staging).await?;
            staged.push((texture_type, staging));
        }

        let mut artifacts = Vec::with_capacity(staged.len());
        for (texture_type, staging) in staged {
            let target = dir.join(format!("{}.{}", requested_name, texture_type));
            fs::rename(&staging, &target).await?;
            let size = fs::metadata(&target).await?.len();
            artifacts.push(CompressedArtifact {
                path: target,
                texture_type,
                size,
            });
        }

        info!(count = artifacts.len(), "Resolved compressed files");
        Ok(artifacts)
    }

    async fn scan(&self, dir: &Path, stem: &str) -> Result<Vec<Candidate>, CompressError> {
        let mut entries = fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(stem) || !entry.file_type().await?.is_file() {
                continue;
            }
            if TextureType::from_path(Path::new(name)).is_some() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut candidates = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(by_extension) = TextureType::from_path(&path) else {
                continue;
            };
            let magic = sniff_magic(&path).await?;
            let resolved = classify(by_extension, magic);

            let magic_hex = magic.map(|m| format!("0x{:08x}", m)).unwrap_or_default();
            match (magic.and_then(TextureType::from_magic), resolved == by_extension) {
                (None, _) if magic.is_none() => {
                    warn!(file = %path.display(), "File too short to identify, keeping extension type")
                }
                (None, _) => {
                    warn!(file = %path.display(), magic = %magic_hex, "Unknown format, keeping extension type")
                }
                (Some(_), true) => {
                    info!(file = %path.display(), magic = %magic_hex, format = %resolved, "Confirmed format")
                }
                (Some(_), false) => {
                    info!(file = %path.display(), magic = %magic_hex, format = %resolved, "Correcting format from extension")
                }
            }

            candidates.push(Candidate {
                path,
                by_extension,
                resolved,
            });
        }
        Ok(candidates)
    }
}
