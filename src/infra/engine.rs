use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};
use sqlx::{Column, Connection, Executor, Statement};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::core::sanitize::sanitize_identifier;
use crate::error::ExecutionError;
use crate::infra::utils::sqlite_row_to_json;
use crate::models::result::{QueryOutcome, ResultTable};
use crate::models::table::{Cell, Table, DATETIME_FORMAT};

/// 嵌入式执行适配器：每次执行开一个私有的内存库，注册表后原样执行 SQL
#[derive(Debug, Clone)]
pub struct SqlEngine {
    timeout: Duration,
}

impl SqlEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    pub async fn execute(
        &self,
        sql: &str,
        tables: &BTreeMap<String, Table>,
    ) -> Result<QueryOutcome, ExecutionError> {
        let deadline = Instant::now() + self.timeout;
        let timed_out = || ExecutionError::Timeout {
            secs: self.timeout.as_secs(),
            sql: sql.to_string(),
        };
        // 连接上的进度回调到期即中断语句；外层超时只兜底回调来不及触发的情况
        let guarded = tokio::time::timeout(self.timeout + INTERRUPT_GRACE, run(sql, tables, deadline));
        match guarded.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) if Instant::now() >= deadline => {
                warn!("查询超时被中断 ({:?})", self.timeout);
                Err(timed_out())
            }
            Ok(Err(e)) => {
                warn!("查询失败: {}", e);
                Err(e)
            }
            Err(_) => {
                warn!("查询超时 ({:?})", self.timeout);
                Err(timed_out())
            }
        }
    }
}

const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

/// SQLite 每执行这么多条虚拟机指令回调一次进度处理器
const PROGRESS_OPS: i32 = 1000;

/// 以 SELECT / WITH 开头的语句返回结果集，其余只执行
pub fn returns_rows(sql: &str) -> bool {
    let head: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    matches!(head.to_ascii_uppercase().as_str(), "SELECT" | "WITH")
}

async fn run(
    sql: &str,
    tables: &BTreeMap<String, Table>,
    deadline: Instant,
) -> Result<QueryOutcome, ExecutionError> {
    let engine_err = |e: sqlx::Error| ExecutionError::Engine {
        message: e.to_string(),
        sql: sql.to_string(),
    };

    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .map_err(engine_err)?;
    // 回调返回 false 时 SQLite 以 SQLITE_INTERRUPT 终止当前语句，注册阶段的 INSERT 同样受限
    conn.lock_handle()
        .await
        .map_err(engine_err)?
        .set_progress_handler(PROGRESS_OPS, move || Instant::now() < deadline);

    for table in tables.values() {
        register(&mut conn, table, sql).await?;
    }

    if returns_rows(sql) {
        // 先 prepare 拿列名，空结果也能带上表头
        let columns: Vec<String> = (&mut conn)
            .prepare(sql)
            .await
            .map_err(engine_err)?
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = sqlx::query(sql)
            .fetch_all(&mut conn)
            .await
            .map_err(engine_err)?;
        let result = ResultTable {
            columns,
            rows: rows.iter().map(sqlite_row_to_json).collect(),
        };
        info!("查询成功，返回 {} 行", result.row_count());
        Ok(QueryOutcome::Rows(result))
    } else {
        let done = (&mut conn).execute(sql).await.map_err(engine_err)?;
        info!("语句执行成功，影响 {} 行", done.rows_affected());
        Ok(QueryOutcome::Statement {
            rows_affected: done.rows_affected(),
        })
    }
}

async fn register(
    conn: &mut SqliteConnection,
    table: &Table,
    sql: &str,
) -> Result<(), ExecutionError> {
    let register_err = |message: String| ExecutionError::Register {
        table: table.name().to_string(),
        message,
        sql: sql.to_string(),
    };

    let name = sanitize_identifier(table.name()).map_err(|e| register_err(e.to_string()))?;
    let mut names = Vec::with_capacity(table.columns().len());
    let mut defs = Vec::with_capacity(table.columns().len());
    for col in table.columns() {
        let col_name = sanitize_identifier(&col.name).map_err(|e| register_err(e.to_string()))?;
        names.push(col_name);
        defs.push(format!("{} {}", col_name, col.column_type.sql_type()));
    }

    let ddl = format!("CREATE TABLE {} ({})", name, defs.join(", "));
    (&mut *conn)
        .execute(ddl.as_str())
        .await
        .map_err(|e| register_err(e.to_string()))?;

    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        name,
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    );
    let mut tx = conn.begin().await.map_err(|e| register_err(e.to_string()))?;
    for row in &table.rows {
        let query = row.iter().fold(sqlx::query(&insert), bind_cell);
        query
            .execute(&mut *tx)
            .await
            .map_err(|e| register_err(e.to_string()))?;
    }
    tx.commit().await.map_err(|e| register_err(e.to_string()))?;

    debug!("表 {} 已注册 ({} 行)", name, table.rows.len());
    Ok(())
}

fn bind_cell<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    cell: &'q Cell,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match cell {
        Cell::Null => query.bind(None::<String>),
        Cell::Text(s) => query.bind(s.as_str()),
        Cell::Number(n) => match cell.as_integer() {
            Some(i) => query.bind(i),
            None => query.bind(*n),
        },
        Cell::Bool(b) => query.bind(*b),
        Cell::Date(d) => query.bind(d.to_string()),
        Cell::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
    }
}
