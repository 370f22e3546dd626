use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use pdfmesh_common::{PdfMeshError, Result, UploadResponse, UploadedFile};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Upload limits and destination.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
    pub max_file_size_mb: u64,
}

impl UploadConfig {
    fn max_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Streams every file part of a multipart upload to `upload_dir`.
///
/// Parts without a file name are ignored. A file larger than the limit fails
/// the whole request with `PayloadTooLarge`; its partial file is removed.
/// Files already written before the failure stay on disk.
pub async fn save_uploads(mut multipart: Multipart, config: &UploadConfig) -> Result<UploadResponse> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(raw_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let file_name = sanitize_file_name(&raw_name)
            .ok_or_else(|| PdfMeshError::InvalidRequest(format!("Invalid file name '{}'", raw_name)))?;

        let path = config.upload_dir.join(&file_name);
        let size = match write_field(field, &path, config.max_bytes()).await {
            Ok(Some(size)) => size,
            Ok(None) => {
                remove_partial(&path).await;
                return Err(PdfMeshError::PayloadTooLarge {
                    file_name,
                    max_mb: config.max_file_size_mb,
                });
            }
            Err(e) => {
                remove_partial(&path).await;
                return Err(e);
            }
        };

        info!("Stored upload {} ({} bytes)", path.display(), size);
        files.push(UploadedFile {
            filename: file_name,
            size_mb: size as f64 / (1024.0 * 1024.0),
            path: path.display().to_string(),
        });
    }

    if files.is_empty() {
        return Err(PdfMeshError::InvalidRequest("No files uploaded".to_string()));
    }
    Ok(UploadResponse::new(files))
}

/// Writes one part to `path`. Returns `None` as soon as it exceeds `max_bytes`.
async fn write_field(mut field: Field<'_>, path: &Path, max_bytes: u64) -> Result<Option<u64>> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > max_bytes {
            return Ok(None);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(Some(size))
}

async fn remove_partial(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

fn multipart_error(err: MultipartError) -> PdfMeshError {
    PdfMeshError::InvalidRequest(format!("Malformed multipart body: {}", err.body_text()))
}

/// Keeps only the final path component of a client-supplied name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}
