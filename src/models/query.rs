use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ModelError;
use crate::models::table::{ColumnType, TableSchema};

pub const DEFAULT_LIMIT: u64 = 100;

/// 列引用，table 为空时按裸列名渲染
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}", t, self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinOperator {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinOperator::Inner => "INNER JOIN",
            JoinOperator::Left => "LEFT JOIN",
            JoinOperator::Right => "RIGHT JOIN",
            JoinOperator::Full => "FULL JOIN",
            JoinOperator::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JoinColumns {
    pub left: String,
    /// 为空表示与左列同名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
}

impl JoinColumns {
    pub fn right_column(&self) -> &str {
        self.right.as_deref().unwrap_or(&self.left)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub left_table: String,
    pub right_table: String,
    pub operator: JoinOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<JoinColumns>,
}

impl JoinEdge {
    pub fn on(
        left_table: impl Into<String>,
        right_table: impl Into<String>,
        operator: JoinOperator,
        column: impl Into<String>,
    ) -> Self {
        Self {
            left_table: left_table.into(),
            right_table: right_table.into(),
            operator,
            columns: Some(JoinColumns {
                left: column.into(),
                right: None,
            }),
        }
    }

    pub fn on_columns(
        left_table: impl Into<String>,
        right_table: impl Into<String>,
        operator: JoinOperator,
        left_column: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left_table: left_table.into(),
            right_table: right_table.into(),
            operator,
            columns: Some(JoinColumns {
                left: left_column.into(),
                right: Some(right_column.into()),
            }),
        }
    }

    pub fn cross(left_table: impl Into<String>, right_table: impl Into<String>) -> Self {
        Self {
            left_table: left_table.into(),
            right_table: right_table.into(),
            operator: JoinOperator::Cross,
            columns: None,
        }
    }

    fn touches(&self, table: &str) -> bool {
        self.left_table == table || self.right_table == table
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::In => "IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    pub column: ColumnRef,
    pub operator: FilterOperator,
    /// IN 时为逗号分隔列表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FilterPredicate {
    /// 取值有无必须与运算符一致
    pub fn new(
        column: ColumnRef,
        operator: FilterOperator,
        value: Option<String>,
    ) -> Result<Self, ModelError> {
        let value = value.filter(|v| !v.is_empty());
        match (operator.takes_value(), &value) {
            (true, None) => Err(ModelError::MissingFilterValue {
                operator: operator.as_sql().to_string(),
            }),
            (false, Some(_)) => Err(ModelError::UnexpectedFilterValue {
                operator: operator.as_sql().to_string(),
            }),
            _ => Ok(Self {
                column,
                operator,
                value,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// 可视化查询的聚合根。每个会话一份，不持久化
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct QueryModel {
    tables: Vec<TableSchema>,
    columns: Vec<ColumnRef>,
    /// 长度恒为 max(表数 - 1, 0)，第 i 个连接第 i 与 i+1 张表
    joins: Vec<Option<JoinEdge>>,
    filters: Vec<FilterPredicate>,
    #[serde(serialize_with = "serialize_aggregates")]
    aggregates: BTreeMap<ColumnRef, AggregateFunction>,
    order: Option<OrderSpec>,
    limit: u64,
}

#[derive(Serialize)]
struct AggregateEntry<'a> {
    column: &'a ColumnRef,
    function: AggregateFunction,
}

// JSON 对象键只能是字符串，按条目列表输出
fn serialize_aggregates<S>(
    aggregates: &BTreeMap<ColumnRef, AggregateFunction>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(
        aggregates
            .iter()
            .map(|(column, function)| AggregateEntry {
                column,
                function: *function,
            }),
    )
}

impl Default for QueryModel {
    fn default() -> Self {
        Self::with_default_limit(DEFAULT_LIMIT)
    }
}

impl QueryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_limit(limit: u64) -> Self {
        Self {
            tables: Vec::new(),
            columns: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            aggregates: BTreeMap::new(),
            order: None,
            limit: limit.max(1),
        }
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn joins(&self) -> &[Option<JoinEdge>] {
        &self.joins
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    pub fn aggregates(&self) -> &BTreeMap<ColumnRef, AggregateFunction> {
        &self.aggregates
    }

    pub fn order(&self) -> Option<&OrderSpec> {
        self.order.as_ref()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// 按引用解析列类型；裸列名取第一张包含它的表
    pub fn column_type(&self, col: &ColumnRef) -> Option<ColumnType> {
        match &col.table {
            Some(t) => self.table(t)?.column(&col.column).map(|c| c.column_type),
            None => self
                .tables
                .iter()
                .find_map(|t| t.column(&col.column))
                .map(|c| c.column_type),
        }
    }

    pub fn resolves(&self, col: &ColumnRef) -> bool {
        self.column_type(col).is_some()
    }

    /// 已存在同名表时替换其结构，保持位置不变
    pub fn add_table(&mut self, schema: TableSchema) {
        if let Some(existing) = self.tables.iter_mut().find(|t| t.name == schema.name) {
            *existing = schema;
            self.prune_unresolved();
            return;
        }
        self.tables.push(schema);
        if self.tables.len() > 1 {
            self.joins.push(None);
        }
    }

    /// 移除表并级联清理引用它的 JOIN、过滤、聚合、排序与列
    pub fn remove_table(&mut self, name: &str) -> bool {
        let Some(pos) = self.tables.iter().position(|t| t.name == name) else {
            return false;
        };
        self.tables.remove(pos);

        if !self.joins.is_empty() {
            // pos-1 与 pos 两条边都接触被删表，合并为一个空位
            let right = pos.min(self.joins.len() - 1);
            self.joins.remove(right);
            if pos > 0 && pos < self.tables.len() {
                self.joins[pos - 1] = None;
            }
        }
        for slot in self.joins.iter_mut() {
            if slot.as_ref().is_some_and(|e| e.touches(name)) {
                *slot = None;
            }
        }

        self.prune_unresolved();
        true
    }

    fn prune_unresolved(&mut self) {
        let model = self.clone();
        self.columns.retain(|c| model.resolves(c));
        self.aggregates.retain(|c, _| self.columns.contains(c));
        self.filters.retain(|f| model.resolves(&f.column));
        if self.order.as_ref().is_some_and(|o| !model.resolves(&o.column)) {
            self.order = None;
        }
        for (i, slot) in self.joins.iter_mut().enumerate() {
            let valid = slot.as_ref().is_none_or(|edge| {
                edge_fits(edge, &model.tables[i], &model.tables[i + 1]).is_ok()
            });
            if !valid {
                *slot = None;
            }
        }
    }

    pub fn select_column(&mut self, col: ColumnRef) -> Result<(), ModelError> {
        if !self.resolves(&col) {
            return Err(ModelError::UnknownColumn(col.to_string()));
        }
        if !self.columns.contains(&col) {
            self.columns.push(col);
        }
        Ok(())
    }

    pub fn deselect_column(&mut self, col: &ColumnRef) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c != col);
        self.aggregates.remove(col);
        before != self.columns.len()
    }

    /// 整体替换选择列，任一列无法解析则不做修改
    pub fn set_columns(&mut self, columns: Vec<ColumnRef>) -> Result<(), ModelError> {
        if let Some(bad) = columns.iter().find(|c| !self.resolves(c)) {
            return Err(ModelError::UnknownColumn(bad.to_string()));
        }
        let mut deduped: Vec<ColumnRef> = Vec::with_capacity(columns.len());
        for c in columns {
            if !deduped.contains(&c) {
                deduped.push(c);
            }
        }
        self.columns = deduped;
        let selected = &self.columns;
        self.aggregates.retain(|c, _| selected.contains(c));
        Ok(())
    }

    pub fn set_join_edge(&mut self, index: usize, edge: JoinEdge) -> Result<(), ModelError> {
        if index >= self.joins.len() {
            return Err(ModelError::JoinIndexOutOfRange {
                index,
                slots: self.joins.len(),
            });
        }
        edge_fits(&edge, &self.tables[index], &self.tables[index + 1]).map_err(|e| match e {
            EdgeMismatch::Tables => ModelError::JoinTablesMismatch {
                index,
                expected_left: self.tables[index].name.clone(),
                expected_right: self.tables[index + 1].name.clone(),
            },
            EdgeMismatch::MissingColumns => ModelError::MissingJoinColumns {
                operator: edge.operator.as_sql().to_string(),
            },
            EdgeMismatch::Column(c) => ModelError::UnknownColumn(c),
        })?;
        self.joins[index] = Some(edge);
        Ok(())
    }

    pub fn clear_join_edge(&mut self, index: usize) -> Result<(), ModelError> {
        match self.joins.get_mut(index) {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(ModelError::JoinIndexOutOfRange {
                index,
                slots: self.joins.len(),
            }),
        }
    }

    pub fn add_filter(&mut self, filter: FilterPredicate) -> Result<(), ModelError> {
        if !self.resolves(&filter.column) {
            return Err(ModelError::UnknownColumn(filter.column.to_string()));
        }
        self.filters.push(filter);
        Ok(())
    }

    pub fn remove_filter(&mut self, index: usize) -> Result<FilterPredicate, ModelError> {
        if index >= self.filters.len() {
            return Err(ModelError::FilterIndexOutOfRange {
                index,
                len: self.filters.len(),
            });
        }
        Ok(self.filters.remove(index))
    }

    /// func 为 None 时移除该列的聚合
    pub fn set_aggregate(
        &mut self,
        col: ColumnRef,
        func: Option<AggregateFunction>,
    ) -> Result<(), ModelError> {
        match func {
            None => {
                self.aggregates.remove(&col);
                Ok(())
            }
            Some(f) => {
                if !self.columns.contains(&col) {
                    return Err(ModelError::ColumnNotSelected(col.to_string()));
                }
                self.aggregates.insert(col, f);
                Ok(())
            }
        }
    }

    pub fn set_order(
        &mut self,
        col: Option<ColumnRef>,
        direction: SortDirection,
    ) -> Result<(), ModelError> {
        match col {
            None => self.order = None,
            Some(c) => {
                if !self.resolves(&c) {
                    return Err(ModelError::UnknownColumn(c.to_string()));
                }
                self.order = Some(OrderSpec {
                    column: c,
                    direction,
                });
            }
        }
        Ok(())
    }

    pub fn set_limit(&mut self, n: i64) -> Result<(), ModelError> {
        if n <= 0 {
            return Err(ModelError::InvalidLimit(n));
        }
        self.limit = n as u64;
        Ok(())
    }
}

/// 两张相邻表之间共有的列，按左表列顺序
pub fn common_columns(left: &TableSchema, right: &TableSchema) -> Vec<String> {
    left.columns
        .iter()
        .filter(|c| right.has_column(&c.name))
        .map(|c| c.name.clone())
        .collect()
}

enum EdgeMismatch {
    Tables,
    MissingColumns,
    Column(String),
}

fn edge_fits(edge: &JoinEdge, left: &TableSchema, right: &TableSchema) -> Result<(), EdgeMismatch> {
    if edge.left_table != left.name || edge.right_table != right.name {
        return Err(EdgeMismatch::Tables);
    }
    match (&edge.columns, edge.operator) {
        (None, JoinOperator::Cross) => Ok(()),
        (None, _) => Err(EdgeMismatch::MissingColumns),
        (Some(cols), _) => {
            if !left.has_column(&cols.left) {
                return Err(EdgeMismatch::Column(format!("{}.{}", left.name, cols.left)));
            }
            if !right.has_column(cols.right_column()) {
                return Err(EdgeMismatch::Column(format!(
                    "{}.{}",
                    right.name,
                    cols.right_column()
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSchema {
        TableSchema::new(
            "orders",
            [
                ("id", ColumnType::Number),
                ("customer_id", ColumnType::Number),
                ("total", ColumnType::Number),
            ],
        )
    }

    fn customers() -> TableSchema {
        TableSchema::new(
            "customers",
            [("customer_id", ColumnType::Number), ("region", ColumnType::String)],
        )
    }

    fn regions() -> TableSchema {
        TableSchema::new(
            "regions",
            [("region", ColumnType::String), ("manager", ColumnType::String)],
        )
    }

    #[test]
    fn test_add_table_keeps_join_slots_in_step() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        assert!(m.joins().is_empty());
        m.add_table(customers());
        m.add_table(regions());
        assert_eq!(m.joins().len(), 2);
        // 重复添加不产生新表
        m.add_table(customers());
        assert_eq!(m.tables().len(), 3);
        assert_eq!(m.joins().len(), 2);
    }

    #[test]
    fn test_remove_table_drops_touching_join() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.add_table(customers());
        m.set_join_edge(0, JoinEdge::on("orders", "customers", JoinOperator::Inner, "customer_id"))
            .unwrap();
        assert!(m.remove_table("customers"));
        assert_eq!(m.tables().len(), 1);
        assert!(m.joins().is_empty());
    }

    #[test]
    fn test_remove_middle_table_leaves_empty_slot() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.add_table(customers());
        m.add_table(regions());
        m.set_join_edge(0, JoinEdge::on("orders", "customers", JoinOperator::Inner, "customer_id"))
            .unwrap();
        m.set_join_edge(1, JoinEdge::on("customers", "regions", JoinOperator::Left, "region"))
            .unwrap();
        m.remove_table("customers");
        assert_eq!(m.joins(), &[None]);
    }

    #[test]
    fn test_remove_first_table_keeps_later_edge() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.add_table(customers());
        m.add_table(regions());
        let edge = JoinEdge::on("customers", "regions", JoinOperator::Left, "region");
        m.set_join_edge(1, edge.clone()).unwrap();
        m.remove_table("orders");
        assert_eq!(m.joins(), &[Some(edge)]);
    }

    #[test]
    fn test_remove_table_cascades_to_filters_and_columns() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.add_table(customers());
        m.select_column(ColumnRef::bare("region")).unwrap();
        m.select_column(ColumnRef::bare("total")).unwrap();
        m.set_aggregate(ColumnRef::bare("total"), Some(AggregateFunction::Sum))
            .unwrap();
        m.add_filter(
            FilterPredicate::new(ColumnRef::bare("region"), FilterOperator::Eq, Some("EU".into()))
                .unwrap(),
        )
        .unwrap();
        m.set_order(Some(ColumnRef::bare("region")), SortDirection::Desc)
            .unwrap();

        m.remove_table("customers");
        assert_eq!(m.columns(), &[ColumnRef::bare("total")]);
        assert!(m.filters().is_empty());
        assert!(m.order().is_none());
        assert_eq!(m.aggregates().len(), 1);

        m.remove_table("orders");
        assert!(m.columns().is_empty());
        assert!(m.aggregates().is_empty());
    }

    #[test]
    fn test_set_join_edge_validates_position_and_columns() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.add_table(customers());
        assert_eq!(
            m.set_join_edge(1, JoinEdge::cross("orders", "customers")),
            Err(ModelError::JoinIndexOutOfRange { index: 1, slots: 1 })
        );
        assert!(matches!(
            m.set_join_edge(0, JoinEdge::cross("customers", "orders")),
            Err(ModelError::JoinTablesMismatch { index: 0, .. })
        ));
        assert_eq!(
            m.set_join_edge(0, JoinEdge::on("orders", "customers", JoinOperator::Inner, "total")),
            Err(ModelError::UnknownColumn("customers.total".into()))
        );
        let no_cols = JoinEdge {
            operator: JoinOperator::Left,
            ..JoinEdge::cross("orders", "customers")
        };
        assert!(matches!(
            m.set_join_edge(0, no_cols),
            Err(ModelError::MissingJoinColumns { .. })
        ));
        assert!(m.set_join_edge(0, JoinEdge::cross("orders", "customers")).is_ok());
    }

    #[test]
    fn test_filter_value_must_match_operator() {
        let col = ColumnRef::bare("total");
        assert!(matches!(
            FilterPredicate::new(col.clone(), FilterOperator::Gt, None),
            Err(ModelError::MissingFilterValue { .. })
        ));
        assert!(matches!(
            FilterPredicate::new(col.clone(), FilterOperator::Eq, Some(String::new())),
            Err(ModelError::MissingFilterValue { .. })
        ));
        assert!(matches!(
            FilterPredicate::new(col.clone(), FilterOperator::IsNull, Some("x".into())),
            Err(ModelError::UnexpectedFilterValue { .. })
        ));
        assert!(FilterPredicate::new(col, FilterOperator::IsNotNull, None).is_ok());
    }

    #[test]
    fn test_filters_preserve_order_and_remove_by_index() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        for v in ["1", "2", "3"] {
            m.add_filter(
                FilterPredicate::new(ColumnRef::bare("id"), FilterOperator::Eq, Some(v.into()))
                    .unwrap(),
            )
            .unwrap();
        }
        let removed = m.remove_filter(1).unwrap();
        assert_eq!(removed.value.as_deref(), Some("2"));
        let left: Vec<_> = m.filters().iter().map(|f| f.value.clone().unwrap()).collect();
        assert_eq!(left, vec!["1", "3"]);
        assert!(matches!(
            m.remove_filter(5),
            Err(ModelError::FilterIndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_set_aggregate_requires_selected_column() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        assert_eq!(
            m.set_aggregate(ColumnRef::bare("total"), Some(AggregateFunction::Sum)),
            Err(ModelError::ColumnNotSelected("total".into()))
        );
        m.select_column(ColumnRef::bare("total")).unwrap();
        m.set_aggregate(ColumnRef::bare("total"), Some(AggregateFunction::Sum))
            .unwrap();
        m.set_aggregate(ColumnRef::bare("total"), None).unwrap();
        assert!(m.aggregates().is_empty());
    }

    #[test]
    fn test_deselect_drops_aggregate() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        m.select_column(ColumnRef::bare("total")).unwrap();
        m.set_aggregate(ColumnRef::bare("total"), Some(AggregateFunction::Max))
            .unwrap();
        assert!(m.deselect_column(&ColumnRef::bare("total")));
        assert!(m.aggregates().is_empty());
    }

    #[test]
    fn test_set_limit_rejects_non_positive() {
        let mut m = QueryModel::new();
        assert_eq!(m.limit(), DEFAULT_LIMIT);
        assert_eq!(m.set_limit(0), Err(ModelError::InvalidLimit(0)));
        assert_eq!(m.set_limit(-3), Err(ModelError::InvalidLimit(-3)));
        m.set_limit(25).unwrap();
        assert_eq!(m.limit(), 25);
    }

    #[test]
    fn test_select_unknown_column_rejected() {
        let mut m = QueryModel::new();
        m.add_table(orders());
        assert_eq!(
            m.select_column(ColumnRef::qualified("customers", "region")),
            Err(ModelError::UnknownColumn("customers.region".into()))
        );
        assert!(m.set_columns(vec![ColumnRef::bare("id"), ColumnRef::bare("nope")]).is_err());
        assert!(m.columns().is_empty());
    }

    #[test]
    fn test_common_columns() {
        assert_eq!(common_columns(&orders(), &customers()), vec!["customer_id"]);
        assert!(common_columns(&orders(), &regions()).is_empty());
    }
}
