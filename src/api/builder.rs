use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::ax_state::{AppState, Session};
use crate::core::compiler::compile;
use crate::core::loader::load_table;
use crate::models::context::{
    AddFilterRequest, AddTableRequest, CreateSessionRequest, SetAggregateRequest,
    SetColumnsRequest, SetLimitRequest, SetOrderRequest,
};
use crate::models::query::{common_columns, FilterPredicate, JoinEdge, QueryModel};
use crate::models::table::{Column, Table};

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl From<&Table> for TableSummary {
    fn from(table: &Table) -> Self {
        Self {
            name: table.name().to_string(),
            columns: table.columns().to_vec(),
            row_count: table.rows.len(),
        }
    }
}

pub(crate) fn find_session(state: &AppState, id: Uuid) -> Result<Arc<Mutex<Session>>, ApiError> {
    state
        .session(id)
        .ok_or_else(|| ApiError::NotFound(format!("会话不存在: {}", id)))
}

fn session_view(id: Uuid, session: &Session) -> Value {
    let tables: Vec<TableSummary> = session.tables.values().map(TableSummary::from).collect();
    json!({
        "id": id,
        "user_id": session.user_id,
        "model": session.model,
        "tables": tables,
        "history_len": session.history.len(),
    })
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> (StatusCode, Json<Value>) {
    let id = Uuid::new_v4();
    let session = Session::new(payload.user_id, &state.config);
    let view = session_view(id, &session);
    state.insert_session(id, session);
    info!("新建会话 {} (用户 {})", id, payload.user_id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let handle = find_session(&state, id)?;
    let session = handle.lock().await;
    Ok(Json(session_view(id, &session)))
}

/// 结束会话，模型与已加载的表一并丢弃
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.remove_session(id) {
        return Err(ApiError::NotFound(format!("会话不存在: {}", id)));
    }
    info!("会话 {} 已结束", id);
    Ok(StatusCode::NO_CONTENT)
}

/// 从存储读取文件并加载为表，加入会话模型
///
/// 返回表结构、前几行预览，以及与前一张表的共有列（可作为 JOIN 候选）
pub async fn add_table(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddTableRequest>,
) -> Result<Json<Value>, ApiError> {
    let handle = find_session(&state, id)?;
    let user_id = handle.lock().await.user_id;

    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let file = store
            .find(user_id, payload.upload_type, &payload.file_name)?
            .ok_or_else(|| ApiError::NotFound(format!("文件不存在: {}", payload.file_name)))?;
        load_table(&file, &store).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let mut session = handle.lock().await;
    let mut added = Vec::with_capacity(loaded.len());
    for (name, table) in loaded {
        let previous = session
            .model
            .tables()
            .iter()
            .rev()
            .find(|t| t.name != name)
            .cloned();
        let candidates = previous
            .map(|p| common_columns(&p, &table.schema))
            .unwrap_or_default();
        added.push(json!({
            "table": TableSummary::from(&table),
            "preview": table.preview(state.config.preview_rows),
            "join_candidates": candidates,
        }));
        session.model.add_table(table.schema.clone());
        session.tables.insert(name, table);
    }

    Ok(Json(json!({
        "added": added,
        "model": session.model,
    })))
}

pub async fn remove_table(
    State(state): State<Arc<AppState>>,
    Path((id, table)): Path<(Uuid, String)>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    if !session.model.remove_table(&table) {
        return Err(ApiError::NotFound(format!("表不存在: {}", table)));
    }
    session.tables.remove(&table);
    info!("会话 {} 移除表 {}", id, table);
    Ok(Json(session.model.clone()))
}

pub async fn set_columns(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetColumnsRequest>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.set_columns(payload.columns)?;
    Ok(Json(session.model.clone()))
}

pub async fn set_join(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(edge): Json<JoinEdge>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.set_join_edge(index, edge)?;
    Ok(Json(session.model.clone()))
}

pub async fn clear_join(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.clear_join_edge(index)?;
    Ok(Json(session.model.clone()))
}

pub async fn add_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddFilterRequest>,
) -> Result<Json<QueryModel>, ApiError> {
    let predicate = FilterPredicate::new(payload.column, payload.operator, payload.value)?;
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.add_filter(predicate)?;
    Ok(Json(session.model.clone()))
}

pub async fn remove_filter(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.remove_filter(index)?;
    Ok(Json(session.model.clone()))
}

pub async fn set_aggregate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAggregateRequest>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.set_aggregate(payload.column, payload.function)?;
    Ok(Json(session.model.clone()))
}

pub async fn set_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetOrderRequest>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.set_order(payload.column, payload.direction)?;
    Ok(Json(session.model.clone()))
}

pub async fn set_limit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetLimitRequest>,
) -> Result<Json<QueryModel>, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    session.model.set_limit(payload.limit)?;
    Ok(Json(session.model.clone()))
}

/// 只编译不执行，供前端展示生成的 SQL
pub async fn compile_sql(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let handle = find_session(&state, id)?;
    let session = handle.lock().await;
    let sql = compile(&session.model).inspect_err(|e| warn!("编译失败: {}", e))?;
    Ok(Json(json!({ "sql": sql })))
}
