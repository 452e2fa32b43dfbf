use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImageList {
    pub images: Vec<ImageInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageInfo {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub mimetype: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted_count: usize,
}
