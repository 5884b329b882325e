use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
    Boolean,
}

impl ColumnType {
    /// 注册到 SQLite 时的声明类型
    ///
    /// NUMERIC 亲和让整数值保持 INTEGER 存储；BOOLEAN 同为 NUMERIC 亲和，
    /// 声明类型会随结果列带回，用于把 0/1 还原成布尔值
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Number => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::String | ColumnType::Date => "TEXT",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    /// 带时间部分的日期，列类型仍为 Date
    DateTime(NaiveDateTime),
}

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Text(s) => json!(s),
            Cell::Number(n) => json!(n),
            Cell::Bool(b) => json!(b),
            Cell::Date(d) => json!(d.to_string()),
            Cell::DateTime(dt) => json!(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    /// 数值为整数且在 i64 范围内时返回整数形式
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Some(*n as i64),
            _ => None,
        }
    }
}

/// 列结构，不含数据。查询模型只持有它
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns
                .into_iter()
                .map(|(name, column_type)| Column {
                    name: name.into(),
                    column_type,
                })
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// 内存中的表：一个上传文件对应一张
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.schema.columns
    }

    pub fn preview(&self, n: usize) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| row.iter().map(Cell::to_json).collect())
            .collect()
    }
}
