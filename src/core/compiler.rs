use tracing::debug;

use crate::core::sanitize::sanitize_identifier;
use crate::error::CompileError;
use crate::models::query::{ColumnRef, FilterOperator, FilterPredicate, JoinEdge, QueryModel};
use crate::models::table::ColumnType;

/// 将查询模型确定性地翻译为 SQL 文本，不执行、不缓存
pub fn compile(model: &QueryModel) -> Result<String, CompileError> {
    validate(model)?;

    let mut select_parts = Vec::with_capacity(model.columns().len());
    let mut group_by = Vec::new();

    // 有聚合时，未聚合的列全部进入 GROUP BY
    if model.aggregates().is_empty() {
        select_parts.extend(model.columns().iter().map(render_column));
    } else {
        for col in model.columns() {
            let rendered = render_column(col);
            match model.aggregates().get(col) {
                Some(func) => select_parts.push(format!(
                    "{}({}) AS {}_{}",
                    func.as_sql(),
                    rendered,
                    func.as_sql().to_lowercase(),
                    col.column
                )),
                None => {
                    select_parts.push(rendered.clone());
                    group_by.push(rendered);
                }
            }
        }
    }

    let projection = if select_parts.is_empty() {
        "*".to_string()
    } else {
        select_parts.join(", ")
    };

    // validate 已保证至少一张表
    let base = &model.tables()[0].name;
    let mut sql = format!("SELECT {} FROM {}", projection, base);

    for edge in model.joins().iter().flatten() {
        sql.push(' ');
        sql.push_str(&render_join(edge));
    }

    if !model.filters().is_empty() {
        let predicates: Vec<String> = model
            .filters()
            .iter()
            .map(|f| render_predicate(model, f))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if !group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_by.join(", "));
    }

    if let Some(order) = model.order() {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            render_column(&order.column),
            order.direction.as_sql()
        ));
    }

    sql.push_str(&format!(" LIMIT {}", model.limit()));

    debug!(sql = %sql, "查询编译完成");
    Ok(sql)
}

fn validate(model: &QueryModel) -> Result<(), CompileError> {
    if model.tables().is_empty() {
        return Err(CompileError::NoTables);
    }
    for table in model.tables() {
        sanitize_identifier(&table.name)?;
    }

    for col in model.columns() {
        check_column(model, col)?;
    }

    for (index, slot) in model.joins().iter().enumerate() {
        let edge = slot.as_ref().ok_or(CompileError::MissingJoin { index })?;
        for table in [&edge.left_table, &edge.right_table] {
            sanitize_identifier(table)?;
            if model.table(table).is_none() {
                return Err(CompileError::JoinTableNotSelected(table.clone()));
            }
        }
        if let Some(cols) = &edge.columns {
            check_column(model, &ColumnRef::qualified(&edge.left_table, &cols.left))?;
            check_column(
                model,
                &ColumnRef::qualified(&edge.right_table, cols.right_column()),
            )?;
        }
    }

    for filter in model.filters() {
        check_column(model, &filter.column)?;
    }

    for col in model.aggregates().keys() {
        check_column(model, col)?;
        if !model.columns().contains(col) {
            return Err(CompileError::AggregateNotSelected(col.to_string()));
        }
    }

    if let Some(order) = model.order() {
        check_column(model, &order.column)?;
    }
    Ok(())
}

fn check_column(model: &QueryModel, col: &ColumnRef) -> Result<(), CompileError> {
    if let Some(table) = &col.table {
        sanitize_identifier(table)?;
    }
    sanitize_identifier(&col.column)?;
    if !model.resolves(col) {
        return Err(CompileError::UnknownColumn(col.to_string()));
    }
    Ok(())
}

fn render_column(col: &ColumnRef) -> String {
    col.to_string()
}

fn render_join(edge: &JoinEdge) -> String {
    match &edge.columns {
        Some(cols) => format!(
            "{} {} ON {}.{} = {}.{}",
            edge.operator.as_sql(),
            edge.right_table,
            edge.left_table,
            cols.left,
            edge.right_table,
            cols.right_column()
        ),
        None => format!("{} {}", edge.operator.as_sql(), edge.right_table),
    }
}

fn render_predicate(model: &QueryModel, filter: &FilterPredicate) -> String {
    let col = render_column(&filter.column);
    let value = filter.value.as_deref().unwrap_or_default();
    let column_type = model.column_type(&filter.column);
    match filter.operator {
        FilterOperator::IsNull | FilterOperator::IsNotNull => {
            format!("{} {}", col, filter.operator.as_sql())
        }
        FilterOperator::In => {
            let items: Vec<String> = value
                .split(',')
                .map(|v| match boolean_keyword(v, column_type) {
                    Some(kw) => kw.to_string(),
                    None => quote_literal(v.trim()),
                })
                .collect();
            format!("{} IN ({})", col, items.join(", "))
        }
        FilterOperator::Like => format!("{} LIKE {}", col, quote_literal(&format!("%{}%", value))),
        op => {
            let literal = match (boolean_keyword(value, column_type), numeric_literal(value)) {
                (Some(kw), _) => kw.to_string(),
                (None, Some(n)) => n.to_string(),
                (None, None) => quote_literal(value),
            };
            format!("{} {} {}", col, op.as_sql(), literal)
        }
    }
}

/// 布尔列以 0/1 存储，true/false（大小写不敏感）必须输出为关键字才能匹配
fn boolean_keyword(value: &str, column_type: Option<ColumnType>) -> Option<&'static str> {
    if column_type != Some(ColumnType::Boolean) {
        return None;
    }
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some("TRUE"),
        "false" => Some("FALSE"),
        _ => None,
    }
}

/// 能解析为有限浮点数则原样不加引号输出。启发式：邮编等数字样式的文本也会被当作数值
fn numeric_literal(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(trimmed),
        _ => None,
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
