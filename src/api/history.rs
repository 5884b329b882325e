use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::builder::find_session;
use crate::api::error::ApiError;
use crate::ax_state::AppState;
use crate::core::history::{HistoryEvent, HistoryFilter};

/// 会话执行历史，最新在前；支持 ?action_type=query_failed&errors_only=true
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<Vec<HistoryEvent>>, ApiError> {
    let handle = find_session(&state, id)?;
    let session = handle.lock().await;
    Ok(Json(session.history.list(&filter)))
}

pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let handle = find_session(&state, id)?;
    handle.lock().await.history.clear();
    info!("会话 {} 历史已清空", id);
    Ok(StatusCode::NO_CONTENT)
}
