use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get, post},
};

use crate::{
    dto::uploads::{CleanupReport, ImageInfo, UploadedImage, UploadedImageList},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    services::upload_service,
    state::AppState,
};

// 10 files x 5 MB plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = 60 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", post(upload_images))
        .route("/images", get(list_images))
        .route("/images/{filename}", get(image_info))
        .route("/images/{filename}", delete(delete_image))
        .route("/cleanup", post(cleanup))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[utoipa::path(
    post,
    path = "/api/upload/images",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored images", body = ApiResponse<Vec<UploadedImage>>),
        (status = 400, description = "Too many files, too large, or wrong type"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn upload_images(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Vec<UploadedImage>>>> {
    ensure_admin(&user)?;
    Ok(Json(
        upload_service::save_images(&state.config, multipart).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/upload/images",
    responses(
        (status = 200, description = "Stored images, newest first", body = ApiResponse<UploadedImageList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn list_images(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UploadedImageList>>> {
    ensure_admin(&user)?;
    Ok(Json(upload_service::list_images(&state.config).await?))
}

#[utoipa::path(
    get,
    path = "/api/upload/images/{filename}",
    params(
        ("filename" = String, Path, description = "Stored image filename")
    ),
    responses(
        (status = 200, description = "Image metadata", body = ApiResponse<ImageInfo>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such image"),
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn image_info(
    State(state): State<AppState>,
    user: AuthUser,
    Path(filename): Path<String>,
) -> AppResult<Json<ApiResponse<ImageInfo>>> {
    ensure_admin(&user)?;
    Ok(Json(
        upload_service::image_info(&state.config, &filename).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/upload/images/{filename}",
    params(
        ("filename" = String, Path, description = "Stored image filename")
    ),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such image"),
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(filename): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    Ok(Json(
        upload_service::delete_image(&state.config, &filename).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/upload/cleanup",
    responses(
        (status = 200, description = "Old images removed", body = ApiResponse<CleanupReport>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn cleanup(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CleanupReport>>> {
    ensure_admin(&user)?;
    Ok(Json(
        upload_service::cleanup_old_images(&state.config).await?,
    ))
}
