use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::extract::Multipart;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::{
    config::AppConfig,
    dto::uploads::{CleanupReport, ImageInfo, UploadedImage, UploadedImageList},
    error::{AppError, AppResult},
    response::ApiResponse,
};

const MAX_FILES: usize = 10;
const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted content types and the extension each one is stored under.
const ALLOWED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

fn ext_for_mime(mime: &str) -> Option<&'static str> {
    ALLOWED.iter().find(|(m, _)| *m == mime).map(|(_, e)| *e)
}

fn is_allowed_ext(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    ext == "jpeg" || ALLOWED.iter().any(|(_, e)| *e == ext)
}

/// Both the declared content type and the client filename's extension must
/// be allowed, and they must name the same format. A `.txt` sent as
/// `image/png` is rejected no matter which half looks valid.
fn validated_extension(mime: &str, original_name: &str) -> AppResult<&'static str> {
    let Some(ext) = ext_for_mime(mime) else {
        return Err(AppError::BadRequest(format!(
            "Unsupported image type: {mime}"
        )));
    };
    let claimed = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let claimed = if claimed == "jpeg" { "jpg" } else { claimed.as_str() };
    if claimed != ext {
        return Err(AppError::BadRequest(format!(
            "File extension does not match content type {mime}"
        )));
    }
    Ok(ext)
}

/// Filenames from the client never make it into a path: they may only
/// contain a single component, no separators and no parent references.
fn sanitize_filename(name: &str) -> AppResult<&str> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(AppError::BadRequest("Invalid filename".into()));
    }
    Ok(name)
}

fn generated_name(ext: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    format!("images-{}-{:09}.{}", millis, suffix, ext)
}

fn public_url(filename: &str) -> String {
    format!("/uploads/products/{}", filename)
}

fn mime_for_ext(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

pub async fn save_images(
    config: &AppConfig,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<Vec<UploadedImage>>> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let mut saved = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("images") {
            continue;
        }
        if saved.len() >= MAX_FILES {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_FILES} images per upload"
            )));
        }

        let mime = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let ext = validated_extension(&mime, &original_name)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if data.len() > MAX_FILE_BYTES {
            return Err(AppError::BadRequest("Image exceeds 5 MB".into()));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("Empty upload".into()));
        }

        let filename = generated_name(ext);
        let path = config.upload_dir.join(&filename);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let size = data.len() as u64;
        saved.push(UploadedImage {
            url: public_url(&filename),
            filename,
            original_name,
            size,
            mimetype: mime,
        });
    }

    if saved.is_empty() {
        return Err(AppError::BadRequest("No images in request".into()));
    }

    tracing::info!(count = saved.len(), "images uploaded");
    Ok(ApiResponse::success("Images uploaded", saved, None))
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}

async fn read_image_info(path: &PathBuf, filename: String) -> AppResult<ImageInfo> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(ImageInfo {
        url: public_url(&filename),
        size: meta.len(),
        mimetype: mime_for_ext(path).to_string(),
        modified: modified_time(&meta),
        filename,
    })
}

pub async fn list_images(config: &AppConfig) -> AppResult<ApiResponse<UploadedImageList>> {
    let mut images = Vec::new();

    let mut dir = match tokio::fs::read_dir(&config.upload_dir).await {
        Ok(dir) => dir,
        // No uploads yet is an empty list, not an error.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let count = 0;
            return Ok(ApiResponse::success(
                "Images",
                UploadedImageList { images, count },
                None,
            ));
        }
        Err(e) => return Err(AppError::Internal(anyhow::anyhow!(e))),
    };

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !is_allowed_ext(ext) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        images.push(read_image_info(&path, filename.to_string()).await?);
    }

    images.sort_by(|a, b| b.modified.cmp(&a.modified));

    let count = images.len();
    Ok(ApiResponse::success(
        "Images",
        UploadedImageList { images, count },
        None,
    ))
}

pub async fn image_info(
    config: &AppConfig,
    filename: &str,
) -> AppResult<ApiResponse<ImageInfo>> {
    let filename = sanitize_filename(filename)?;
    let path = config.upload_dir.join(filename);

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !is_allowed_ext(ext) {
        return Err(AppError::BadRequest("Not an image".into()));
    }
    if !tokio::fs::try_exists(&path)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    {
        return Err(AppError::NotFound);
    }

    let info = read_image_info(&path, filename.to_string()).await?;
    Ok(ApiResponse::success("Image", info, None))
}

pub async fn delete_image(
    config: &AppConfig,
    filename: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let filename = sanitize_filename(filename)?;
    let path = config.upload_dir.join(filename);

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !is_allowed_ext(ext) {
        return Err(AppError::BadRequest("Not an image".into()));
    }

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound);
        }
        Err(e) => return Err(AppError::Internal(anyhow::anyhow!(e))),
    }

    tracing::info!(%filename, "image deleted");
    Ok(ApiResponse::success("Image deleted", serde_json::json!({}), None))
}

/// Removes images whose modification time is older than 30 days.
pub async fn cleanup_old_images(config: &AppConfig) -> AppResult<ApiResponse<CleanupReport>> {
    let cutoff = Utc::now() - Duration::days(30);
    let mut deleted_count = 0;

    let mut dir = match tokio::fs::read_dir(&config.upload_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ApiResponse::success(
                "Cleanup finished",
                CleanupReport { deleted_count },
                None,
            ));
        }
        Err(e) => return Err(AppError::Internal(anyhow::anyhow!(e))),
    };

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !is_allowed_ext(ext) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if modified_time(&meta) < cutoff {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(error = %err, path = %path.display(), "cleanup skip");
                continue;
            }
            deleted_count += 1;
        }
    }

    tracing::info!(deleted_count, "upload cleanup finished");
    Ok(ApiResponse::success(
        "Cleanup finished",
        CleanupReport { deleted_count },
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_maps_to_extensions() {
        assert_eq!(ext_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_for_mime("image/webp"), Some("webp"));
        assert_eq!(ext_for_mime("application/pdf"), None);
    }

    #[test]
    fn extension_must_agree_with_declared_type() {
        assert_eq!(validated_extension("image/png", "photo.png").unwrap(), "png");
        // jpg and jpeg are the same format.
        assert_eq!(validated_extension("image/jpeg", "photo.jpeg").unwrap(), "jpg");
        assert_eq!(validated_extension("image/jpeg", "photo.JPG").unwrap(), "jpg");

        assert!(validated_extension("image/png", "malware.txt").is_err());
        assert!(validated_extension("image/png", "photo.jpg").is_err());
        assert!(validated_extension("image/png", "noext").is_err());
        assert!(validated_extension("application/pdf", "doc.pdf").is_err());
    }

    #[test]
    fn filenames_with_path_tricks_are_rejected() {
        assert!(sanitize_filename("ok.jpg").is_ok());
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("a/b.jpg").is_err());
        assert!(sanitize_filename(".hidden").is_err());
        assert!(sanitize_filename("").is_err());
    }

    #[test]
    fn generated_names_carry_the_extension() {
        let name = generated_name("png");
        assert!(name.starts_with("images-"));
        assert!(name.ends_with(".png"));
    }
}
