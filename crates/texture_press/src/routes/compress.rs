//! `POST /compress`

use crate::app::AppState;
use crate::models::error::{CompressError, InputError};
use crate::models::types::{CompressResponse, CompressedFile, CompressionRequest, ErrorBody, UploadedFile};
use crate::services::housekeeping::ScratchSpace;
use crate::utils::format::format_file_size;
use crate::utils::metrics::get_metrics;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Text fields are small; anything larger is a malformed request.
const MAX_TEXT_FIELD: usize = 4 * 1024;

/// Documents the multipart body for the OpenAPI schema.
#[allow(dead_code)]
#[derive(serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressForm {
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    /// Output base name; defaults to the uploaded file's stem.
    name: Option<String>,
    /// etc1s | uastc | uastc_rdo | hdr_4x4 | hdr_6x6 | hdr_6x6i
    mode: Option<String>,
    quality: Option<u32>,
    rdo_quality: Option<f64>,
    lambda: Option<u32>,
    level: Option<u32>,
    /// "true" or "false"
    generate_mipmaps: Option<String>,
}

#[utoipa::path(
    post,
    path = "/compress",
    tag = "compression",
    request_body(content = CompressForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image compressed", body = CompressResponse),
        (status = 400, description = "Missing or unusable upload", body = ErrorBody),
        (status = 500, description = "Invalid dimensions or compressor failure", body = ErrorBody)
    )
)]
pub async fn compress(
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, CompressError> {
    let started = Instant::now();
    let result = handle(&data, payload).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(_) => get_metrics().record_success(elapsed),
        Err(e) => {
            error!(error = %e, "Compression request failed");
            get_metrics().record_failure(e.kind(), elapsed);
        }
    }
    result
}

async fn handle(data: &AppState, payload: Multipart) -> Result<HttpResponse, CompressError> {
    let max_size = data.config.uploads.max_file_size;
    let (upload, fields) = read_form(payload, &data.scratch, max_size).await?;

    let Some(upload) = upload else {
        return Err(InputError::MissingFile.into());
    };

    let request = match CompressionRequest::from_fields(&fields, &upload.original_stem()) {
        Ok(request) => request,
        Err(e) => {
            data.scratch.remove_file(&upload.path).await;
            return Err(e.into());
        }
    };

    info!(
        upload = %upload.stored_name,
        original = %upload.original_name,
        size = upload.size,
        mode = %request.mode,
        name = %request.name,
        "Received compression request"
    );

    let outcome = data.compression.compress(&upload, &request).await?;

    let original_stem = upload.original_stem();
    let files = outcome
        .artifacts
        .iter()
        .map(|artifact| CompressedFile {
            download_url: format!("/preview/{}/{}", outcome.request_id, artifact.file_name()),
            filename: format!("{}.{}", original_stem, artifact.texture_type),
            texture_type: artifact.texture_type,
            size: format_file_size(artifact.size),
            size_bytes: artifact.size,
        })
        .collect();

    Ok(HttpResponse::Ok().json(CompressResponse {
        success: true,
        files,
        original_size: format_file_size(outcome.original_size),
        original_image: upload.stored_name,
    }))
}

/// Streams the image to the uploads directory and collects the text fields.
async fn read_form(
    mut payload: Multipart,
    scratch: &ScratchSpace,
    max_size: u64,
) -> Result<(Option<UploadedFile>, HashMap<String, String>), CompressError> {
    let mut upload: Option<UploadedFile> = None;
    let mut fields = HashMap::new();

    loop {
        let field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(scratch, upload.as_ref()).await;
                return Err(InputError::MalformedUpload(e.to_string()).into());
            }
        };

        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => continue,
        };

        let result = match filename {
            Some(filename) if name == IMAGE_FIELD && upload.is_none() => {
                persist_upload(field, scratch, &filename, max_size)
                    .await
                    .map(|file| upload = Some(file))
            }
            Some(_) => drain(field).await,
            None => read_text(field).await.map(|value| {
                fields.insert(name, value);
            }),
        };

        if let Err(e) = result {
            discard(scratch, upload.as_ref()).await;
            return Err(e);
        }
    }

    Ok((upload, fields))
}

async fn persist_upload(
    mut field: Field,
    scratch: &ScratchSpace,
    original_name: &str,
    max_size: u64,
) -> Result<UploadedFile, CompressError> {
    let stored_name = stored_name_for(original_name);
    let path = scratch.uploads_dir().join(&stored_name);
    let mut file = fs::File::create(&path).await?;

    let mut size: u64 = 0;
    let written: Result<(), CompressError> = async {
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| InputError::MalformedUpload(e.to_string()))?
        {
            size += chunk.len() as u64;
            if size > max_size {
                return Err(InputError::FileTooLarge { limit: max_size }.into());
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    drop(file);
    if let Err(e) = written {
        scratch.remove_file(&path).await;
        return Err(e);
    }

    Ok(UploadedFile {
        path,
        original_name: original_name.to_string(),
        stored_name,
        size,
    })
}

/// `{millis}-{random}{.ext}`, keeping the client's extension when it is plain ASCII.
fn stored_name_for(original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", millis, &suffix[..12], ext)
}

async fn read_text(mut field: Field) -> Result<String, CompressError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| InputError::MalformedUpload(e.to_string()))?
    {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD {
            return Err(InputError::MalformedUpload("form field too large".to_string()).into());
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf)
        .map_err(|_| InputError::MalformedUpload("form field is not UTF-8".to_string()).into())
}

async fn drain(mut field: Field) -> Result<(), CompressError> {
    while field
        .try_next()
        .await
        .map_err(|e| InputError::MalformedUpload(e.to_string()))?
        .is_some()
    {}
    Ok(())
}

async fn discard(scratch: &ScratchSpace, upload: Option<&UploadedFile>) {
    if let Some(upload) = upload {
        scratch.remove_file(&upload.path).await;
    }
}
