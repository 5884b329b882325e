use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// SQLite 列可能没有声明类型（表达式、聚合），按值的实际存储类型转换；
/// 声明为 BOOLEAN 的列还原为布尔值
pub fn sqlite_row_to_json(row: &SqliteRow) -> Vec<Value> {
    let mut values = Vec::with_capacity(row.len());

    for idx in 0..row.len() {
        let raw = match row.try_get_raw(idx) {
            Ok(raw) => raw,
            Err(_) => {
                values.push(Value::Null);
                continue;
            }
        };
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_uppercase();
        // 直接引用表列时带回声明类型，BOOLEAN 列以 0/1 存储
        let declared_bool = row.column(idx).type_info().name() == "BOOLEAN";

        let val = match type_name.as_str() {
            "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" if declared_bool => {
                json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None).map(|v| v != 0))
            }
            "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
                json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None))
            }
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None))
            }
            "BLOB" => {
                let v: Option<Vec<u8>> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|bytes| bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()))
            }
            _ => {
                // TEXT / DATE / DATETIME 等一律按字符串
                json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None))
            }
        };
        values.push(val);
    }

    values
}
