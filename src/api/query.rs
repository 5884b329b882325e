use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::builder::find_session;
use crate::api::error::ApiError;
use crate::ax_state::{AppState, Session};
use crate::core::compiler::compile;
use crate::core::history::{HistoryEvent, HistorySink};
use crate::core::sanitize::clean_sql_output;
use crate::infra::engine::SqlEngine;
use crate::models::context::{CustomQueryRequest, OutputFormat, RunParams};
use crate::models::result::QueryOutcome;

/// 编译当前模型并执行
///
/// 编译失败直接返回，不写历史；执行成功或失败都会记录
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<RunParams>,
) -> Result<Response, ApiError> {
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    let sql = compile(&session.model).inspect_err(|e| warn!("编译失败: {}", e))?;
    info!("执行可视化查询: {}", sql);
    let outcome = execute_and_record(&state.engine, &mut session, &sql).await?;
    render(outcome, params.format)
}

/// 执行用户手写的 SQL，先剥掉 markdown 代码块包裹
pub async fn custom_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<RunParams>,
    Json(payload): Json<CustomQueryRequest>,
) -> Result<Response, ApiError> {
    let sql = clean_sql_output(&payload.sql);
    if sql.is_empty() {
        return Err(ApiError::BadRequest("SQL 不能为空".into()));
    }
    let handle = find_session(&state, id)?;
    let mut session = handle.lock().await;
    info!("执行自定义查询: {}", sql);
    let outcome = execute_and_record(&state.engine, &mut session, &sql).await?;
    render(outcome, params.format)
}

async fn execute_and_record(
    engine: &SqlEngine,
    session: &mut Session,
    sql: &str,
) -> Result<QueryOutcome, ApiError> {
    match engine.execute(sql, &session.tables).await {
        Ok(outcome) => {
            session.history.record(HistoryEvent::executed(sql));
            Ok(outcome)
        }
        Err(e) => {
            session.history.record(HistoryEvent::failed(sql, e.to_string()));
            Err(e.into())
        }
    }
}

fn render(outcome: QueryOutcome, format: OutputFormat) -> Result<Response, ApiError> {
    match (outcome, format) {
        (QueryOutcome::Rows(table), OutputFormat::Csv) => {
            let body = table
                .to_csv()
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"query_result.csv\"",
                    ),
                ],
                body,
            )
                .into_response())
        }
        // 非查询语句没有表格可导出，始终返回 JSON
        (outcome, _) => Ok(Json(outcome).into_response()),
    }
}
