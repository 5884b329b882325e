use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use tabsql_backend::core::compiler::compile;
use tabsql_backend::core::history::{ActionType, HistoryEvent, HistoryFilter, HistorySink, SessionHistory};
use tabsql_backend::core::loader::{load_table, load_tables};
use tabsql_backend::error::{CompileError, ExecutionError, LoadError};
use tabsql_backend::infra::engine::SqlEngine;
use tabsql_backend::infra::storage::LocalStore;
use tabsql_backend::models::file::UploadType;
use tabsql_backend::models::query::{
    AggregateFunction, ColumnRef, FilterOperator, FilterPredicate, JoinEdge, JoinOperator,
    QueryModel, SortDirection,
};
use tabsql_backend::models::result::QueryOutcome;
use tabsql_backend::models::table::Table;

const ORDERS: &str = "id,customer_id,region,total\n1,10,EU,10\n2,11,EU,5.5\n3,10,US,7\n";
const CUSTOMERS: &str = "customer_id,name\n10,Ann\n11,Bob\n";
const MEMBERS: &str =
    "id,active,joined\n1,true,2024-01-02\n2,false,2024-03-05\n3,TRUE,2024-02-10 08:30:00\n";

fn load_fixtures(store: &LocalStore, user: Uuid) -> BTreeMap<String, Table> {
    let orders = store
        .store(user, UploadType::Pc, "Orders.CSV", ORDERS.as_bytes())
        .unwrap();
    let customers = store
        .store(user, UploadType::Pc, "customers.csv", CUSTOMERS.as_bytes())
        .unwrap();
    let mut tables = load_table(&orders, store).unwrap();
    tables.extend(load_table(&customers, store).unwrap());
    tables
}

#[tokio::test]
async fn test_store_load_compile_execute() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let user = Uuid::new_v4();
    let tables = load_fixtures(&store, user);
    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["customers", "orders"]);

    let mut model = QueryModel::new();
    model.add_table(tables["orders"].schema.clone());
    model.add_table(tables["customers"].schema.clone());
    model
        .set_columns(vec![
            ColumnRef::qualified("orders", "region"),
            ColumnRef::qualified("orders", "total"),
        ])
        .unwrap();
    model
        .set_join_edge(
            0,
            JoinEdge::on("orders", "customers", JoinOperator::Inner, "customer_id"),
        )
        .unwrap();
    model
        .add_filter(
            FilterPredicate::new(
                ColumnRef::qualified("orders", "total"),
                FilterOperator::Gt,
                Some("6".into()),
            )
            .unwrap(),
        )
        .unwrap();
    model
        .set_aggregate(
            ColumnRef::qualified("orders", "total"),
            Some(AggregateFunction::Sum),
        )
        .unwrap();
    model
        .set_order(
            Some(ColumnRef::qualified("orders", "region")),
            SortDirection::Asc,
        )
        .unwrap();

    let sql = compile(&model).unwrap();
    assert_eq!(
        sql,
        "SELECT orders.region, SUM(orders.total) AS sum_total FROM orders \
         INNER JOIN customers ON orders.customer_id = customers.customer_id \
         WHERE orders.total > 6 GROUP BY orders.region ORDER BY orders.region ASC LIMIT 100"
    );

    let engine = SqlEngine::new(Duration::from_secs(10));
    let QueryOutcome::Rows(result) = engine.execute(&sql, &tables).await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(result.columns, vec!["region", "sum_total"]);
    assert_eq!(
        result.rows,
        vec![vec![json!("EU"), json!(10)], vec![json!("US"), json!(7)]]
    );
}

#[tokio::test]
async fn test_history_records_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let tables = load_fixtures(&store, Uuid::new_v4());
    let engine = SqlEngine::new(Duration::from_secs(10));
    let mut history = SessionHistory::with_capacity(10);

    let ok_sql = "SELECT name FROM customers ORDER BY name ASC LIMIT 100";
    engine.execute(ok_sql, &tables).await.unwrap();
    history.record(HistoryEvent::executed(ok_sql));

    let bad_sql = "SELECT nope FROM customers";
    let err = engine.execute(bad_sql, &tables).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Engine { .. }));
    assert_eq!(err.sql(), bad_sql);
    history.record(HistoryEvent::failed(bad_sql, err.to_string()));

    let all = history.list(&HistoryFilter::default());
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].action_type, ActionType::QueryFailed);
    assert_eq!(all[1].content, ok_sql);
}

#[tokio::test]
async fn test_removing_joined_table_cascades() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let mut tables = load_fixtures(&store, Uuid::new_v4());

    let mut model = QueryModel::new();
    model.add_table(tables["orders"].schema.clone());
    model.add_table(tables["customers"].schema.clone());
    model
        .set_columns(vec![
            ColumnRef::qualified("orders", "id"),
            ColumnRef::qualified("customers", "name"),
        ])
        .unwrap();
    assert_eq!(compile(&model), Err(CompileError::MissingJoin { index: 0 }));

    assert!(model.remove_table("customers"));
    tables.remove("customers");
    let sql = compile(&model).unwrap();
    assert_eq!(sql, "SELECT orders.id FROM orders LIMIT 100");

    let engine = SqlEngine::new(Duration::from_secs(10));
    let QueryOutcome::Rows(result) = engine.execute(&sql, &tables).await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(result.row_count(), 3);
}

fn load_members(store: &LocalStore) -> BTreeMap<String, Table> {
    let members = store
        .store(Uuid::new_v4(), UploadType::Pc, "members.csv", MEMBERS.as_bytes())
        .unwrap();
    load_table(&members, store).unwrap()
}

fn members_model(tables: &BTreeMap<String, Table>, filter: FilterPredicate) -> QueryModel {
    let mut model = QueryModel::new();
    model.add_table(tables["members"].schema.clone());
    model
        .set_columns(vec![
            ColumnRef::qualified("members", "id"),
            ColumnRef::qualified("members", "active"),
        ])
        .unwrap();
    model.add_filter(filter).unwrap();
    model
        .set_order(Some(ColumnRef::qualified("members", "id")), SortDirection::Asc)
        .unwrap();
    model
}

#[tokio::test]
async fn test_boolean_filter_matches_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let tables = load_members(&store);

    let model = members_model(
        &tables,
        FilterPredicate::new(
            ColumnRef::qualified("members", "active"),
            FilterOperator::Eq,
            Some("true".into()),
        )
        .unwrap(),
    );
    let sql = compile(&model).unwrap();
    assert_eq!(
        sql,
        "SELECT members.id, members.active FROM members \
         WHERE members.active = TRUE ORDER BY members.id ASC LIMIT 100"
    );

    let engine = SqlEngine::new(Duration::from_secs(10));
    let QueryOutcome::Rows(result) = engine.execute(&sql, &tables).await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(
        result.rows,
        vec![vec![json!(1), json!(true)], vec![json!(3), json!(true)]]
    );
}

#[tokio::test]
async fn test_date_filter_compares_iso_text() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let tables = load_members(&store);

    let model = members_model(
        &tables,
        FilterPredicate::new(
            ColumnRef::qualified("members", "joined"),
            FilterOperator::Gte,
            Some("2024-02-01".into()),
        )
        .unwrap(),
    );
    let sql = compile(&model).unwrap();
    assert!(sql.contains("WHERE members.joined >= '2024-02-01'"), "{sql}");

    let engine = SqlEngine::new(Duration::from_secs(10));
    let QueryOutcome::Rows(result) = engine.execute(&sql, &tables).await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(
        result.rows,
        vec![vec![json!(2), json!(false)], vec![json!(3), json!(true)]]
    );

    // 带时间的值按原样保存
    let QueryOutcome::Rows(result) = engine
        .execute("SELECT joined FROM members WHERE id = 3", &tables)
        .await
        .unwrap()
    else {
        panic!("expected rows");
    };
    assert_eq!(result.rows, vec![vec![json!("2024-02-10 08:30:00")]]);
}

#[test]
fn test_bad_file_does_not_abort_others() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let user = Uuid::new_v4();
    let good = store
        .store(user, UploadType::Pc, "orders.csv", ORDERS.as_bytes())
        .unwrap();
    let unsupported = store
        .store(user, UploadType::Pc, "notes.txt", b"hello")
        .unwrap();
    let mut missing = good.clone();
    missing.file_name = "gone.csv".into();
    missing.full_path = format!("{}/pc/gone.csv", user);

    let (tables, failures) = load_tables(&[unsupported, good, missing], &store);
    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["orders"]);
    assert_eq!(failures.len(), 2);
    assert!(matches!(failures[0], LoadError::UnsupportedFormat { .. }));
    assert!(matches!(failures[1], LoadError::Retrieval { .. }));
}
