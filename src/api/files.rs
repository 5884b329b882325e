use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::ax_state::AppState;
use crate::models::file::{FileRef, UploadType};

/// 列出用户某一上传来源下的文件
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Path((user_id, upload_type)): Path<(Uuid, UploadType)>,
) -> Result<Json<Vec<FileRef>>, ApiError> {
    let store = state.store.clone();
    let files = tokio::task::spawn_blocking(move || store.list(user_id, upload_type))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(files))
}

/// 上传原始字节，文件名先规范化；同名文件已存在时返回 409
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path((user_id, upload_type, file_name)): Path<(Uuid, UploadType, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<FileRef>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("上传内容为空".into()));
    }
    let store = state.store.clone();
    let file = tokio::task::spawn_blocking(move || {
        store.store(user_id, upload_type, &file_name, &body)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;
    info!("用户 {} 上传文件 {}", user_id, file.full_path);
    Ok((StatusCode::CREATED, Json(file)))
}

/// 删除一个已存储文件；已加载进会话的表不受影响
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((user_id, upload_type, file_name)): Path<(Uuid, UploadType, String)>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.clone();
    let file = tokio::task::spawn_blocking(move || store.delete(user_id, upload_type, &file_name))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    info!("用户 {} 删除文件 {}", user_id, file.full_path);
    Ok(StatusCode::NO_CONTENT)
}
