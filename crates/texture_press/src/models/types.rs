use crate::models::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

pub const DEFAULT_QUALITY: u32 = 128;
pub const DEFAULT_RDO_QUALITY: f64 = 1.0;
pub const DEFAULT_LAMBDA: u32 = 500;
pub const DEFAULT_LEVEL: u32 = 3;

/// Output name used when neither the form nor the upload provides a usable one.
pub const FALLBACK_NAME: &str = "texture";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionMode {
    Etc1s,
    Uastc,
    UastcRdo,
    Hdr4x4,
    Hdr6x6,
    Hdr6x6i,
    /// Anything the compressor front does not know; compressed as ETC1S at default quality.
    Unrecognized(String),
}

impl CompressionMode {
    pub fn as_str(&self) -> &str {
        match self {
            CompressionMode::Etc1s => "etc1s",
            CompressionMode::Uastc => "uastc",
            CompressionMode::UastcRdo => "uastc_rdo",
            CompressionMode::Hdr4x4 => "hdr_4x4",
            CompressionMode::Hdr6x6 => "hdr_6x6",
            CompressionMode::Hdr6x6i => "hdr_6x6i",
            CompressionMode::Unrecognized(other) => other,
        }
    }
}

impl From<&str> for CompressionMode {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "etc1s" => CompressionMode::Etc1s,
            "uastc" => CompressionMode::Uastc,
            "uastc_rdo" => CompressionMode::UastcRdo,
            "hdr_4x4" => CompressionMode::Hdr4x4,
            "hdr_6x6" => CompressionMode::Hdr6x6,
            "hdr_6x6i" => CompressionMode::Hdr6x6i,
            other => CompressionMode::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `/compress` form. Which numeric fields matter depends on `mode`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionRequest {
    pub mode: CompressionMode,
    pub quality: Option<u32>,
    pub rdo_quality: Option<f64>,
    pub lambda: Option<u32>,
    pub level: Option<u32>,
    pub generate_mipmaps: bool,
    pub name: String,
}

impl CompressionRequest {
    pub fn new(mode: CompressionMode, name: impl Into<String>) -> Self {
        Self {
            mode,
            quality: None,
            rdo_quality: None,
            lambda: None,
            level: None,
            generate_mipmaps: false,
            name: name.into(),
        }
    }

    /// Builds a request from multipart text fields.
    ///
    /// Numbers that fail to parse are treated as absent so the mode default applies.
    /// `name` falls back to the upload's file stem.
    pub fn from_fields(
        fields: &HashMap<String, String>,
        original_stem: &str,
    ) -> Result<Self, InputError> {
        let field = |key: &str| fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let name = match field("name") {
            Some(name) => validate_output_name(name)?,
            None => validate_output_name(original_stem)
                .unwrap_or_else(|_| FALLBACK_NAME.to_string()),
        };

        Ok(Self {
            mode: CompressionMode::from(field("mode").unwrap_or("etc1s")),
            quality: field("quality").and_then(|v| v.parse().ok()),
            rdo_quality: field("rdoQuality")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite()),
            lambda: field("lambda").and_then(|v| v.parse().ok()),
            level: field("level").and_then(|v| v.parse().ok()),
            generate_mipmaps: field("generateMipmaps") == Some("true"),
            name,
        })
    }
}

/// Output names become file names inside the request directory, so they must
/// not carry path components.
pub fn validate_output_name(name: &str) -> Result<String, InputError> {
    let name = name.trim();
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.len() > 200
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());

    if invalid {
        return Err(InputError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}

/// GPU texture container written by the compressor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TextureType {
    Basis,
    Ktx2,
}

impl TextureType {
    /// First four bytes of a `.basis` file ("sB" signature + version), little-endian.
    pub const BASIS_MAGIC: u32 = 0x3173_4273;
    /// First four bytes of the KTX 2.0 identifier, little-endian.
    pub const KTX2_MAGIC: u32 = 0x5854_4BAB;

    pub const ALL: [TextureType; 2] = [TextureType::Basis, TextureType::Ktx2];

    pub fn extension(self) -> &'static str {
        match self {
            TextureType::Basis => "basis",
            TextureType::Ktx2 => "ktx2",
        }
    }

    /// The compressor flag that selects this container.
    pub fn flag(self) -> &'static str {
        match self {
            TextureType::Basis => "-basis",
            TextureType::Ktx2 => "-ktx2",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "basis" => Some(TextureType::Basis),
            "ktx2" => Some(TextureType::Ktx2),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            Self::BASIS_MAGIC => Some(TextureType::Basis),
            Self::KTX2_MAGIC => Some(TextureType::Ktx2),
            _ => None,
        }
    }
}

impl fmt::Display for TextureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A resolved compressor output, already renamed to `{name}.{type}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    pub path: PathBuf,
    pub texture_type: TextureType,
    pub size: u64,
}

impl CompressedArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// An upload persisted to the scratch uploads directory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// Name chosen by the client.
    pub original_name: String,
    /// Unique name on disk, `{millis}-{suffix}{ext}`.
    pub stored_name: String,
    pub size: u64,
}

impl UploadedFile {
    pub fn original_stem(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressedFile {
    pub download_url: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub texture_type: TextureType,
    /// Human readable, e.g. `"1.5 KB"`.
    pub size: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub success: bool,
    pub files: Vec<CompressedFile>,
    pub original_size: String,
    pub original_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LatestKtx2 {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(CompressionMode::from("uastc_rdo"), CompressionMode::UastcRdo);
        assert_eq!(CompressionMode::from("hdr_6x6i"), CompressionMode::Hdr6x6i);
        assert_eq!(CompressionMode::from(""), CompressionMode::Etc1s);
        assert_eq!(
            CompressionMode::from("astc"),
            CompressionMode::Unrecognized("astc".to_string())
        );
    }

    #[test]
    fn request_from_fields_reads_every_option() {
        let request = CompressionRequest::from_fields(
            &fields(&[
                ("mode", "hdr_6x6"),
                ("quality", "100"),
                ("rdoQuality", "2.5"),
                ("lambda", "250"),
                ("level", "4"),
                ("generateMipmaps", "true"),
                ("name", "brick"),
            ]),
            "upload",
        )
        .unwrap();

        assert_eq!(request.mode, CompressionMode::Hdr6x6);
        assert_eq!(request.quality, Some(100));
        assert_eq!(request.rdo_quality, Some(2.5));
        assert_eq!(request.lambda, Some(250));
        assert_eq!(request.level, Some(4));
        assert!(request.generate_mipmaps);
        assert_eq!(request.name, "brick");
    }

    #[test]
    fn request_defaults() {
        let request =
            CompressionRequest::from_fields(&fields(&[("quality", "abc")]), "photo").unwrap();
        assert_eq!(request.mode, CompressionMode::Etc1s);
        assert_eq!(request.quality, None);
        assert!(!request.generate_mipmaps);
        assert_eq!(request.name, "photo");

        let request =
            CompressionRequest::from_fields(&fields(&[("generateMipmaps", "yes")]), "").unwrap();
        assert!(!request.generate_mipmaps);
        assert_eq!(request.name, FALLBACK_NAME);
    }

    #[test]
    fn names_with_path_components_are_rejected() {
        for bad in ["../etc/passwd", "a/b", "a\\b", ".hidden", "   "] {
            assert!(validate_output_name(bad).is_err(), "{bad} should be rejected");
        }
        assert_eq!(validate_output_name(" my texture ").unwrap(), "my texture");

        let err = CompressionRequest::from_fields(&fields(&[("name", "../x")]), "ok").unwrap_err();
        assert!(matches!(err, InputError::InvalidName(_)));
    }

    #[test]
    fn texture_type_lookup() {
        assert_eq!(
            TextureType::from_magic(0x58544BAB),
            Some(TextureType::Ktx2)
        );
        assert_eq!(
            TextureType::from_magic(0x31734273),
            Some(TextureType::Basis)
        );
        assert_eq!(TextureType::from_magic(0), None);
        assert_eq!(
            TextureType::from_path(Path::new("a/b.ktx2")),
            Some(TextureType::Ktx2)
        );
        assert_eq!(TextureType::from_path(Path::new("b.png")), None);
        assert!(TextureType::Basis < TextureType::Ktx2);
    }

    #[test]
    fn compressed_file_serializes_camel_case() {
        let file = CompressedFile {
            download_url: "/preview/x/a.ktx2".to_string(),
            filename: "a.ktx2".to_string(),
            texture_type: TextureType::Ktx2,
            size: "1 KB".to_string(),
            size_bytes: 1024,
        };
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["downloadUrl"], "/preview/x/a.ktx2");
        assert_eq!(value["type"], "ktx2");
        assert_eq!(value["sizeBytes"], 1024);
    }
}
