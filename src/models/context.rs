use serde::Deserialize;
use uuid::Uuid;

use crate::models::file::UploadType;
use crate::models::query::{AggregateFunction, ColumnRef, FilterOperator, SortDirection};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AddTableRequest {
    pub file_name: String, // 存储中的文件名（已规范化）
    pub upload_type: UploadType,
}

#[derive(Debug, Deserialize)]
pub struct SetColumnsRequest {
    pub columns: Vec<ColumnRef>,
}

#[derive(Debug, Deserialize)]
pub struct AddFilterRequest {
    pub column: ColumnRef,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAggregateRequest {
    pub column: ColumnRef,
    #[serde(default)]
    pub function: Option<AggregateFunction>,
}

#[derive(Debug, Deserialize)]
pub struct SetOrderRequest {
    #[serde(default)]
    pub column: Option<ColumnRef>,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Deserialize)]
pub struct SetLimitRequest {
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct CustomQueryRequest {
    pub sql: String,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    pub format: OutputFormat,
}
