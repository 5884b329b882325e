pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
pub mod models;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{builder, files, history, query};

pub mod ax_state {
    use dashmap::DashMap;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;
    use tracing::info;
    use uuid::Uuid;

    use crate::config::AppConfig;
    use crate::core::history::SessionHistory;
    use crate::infra::engine::SqlEngine;
    use crate::infra::storage::LocalStore;
    use crate::models::query::QueryModel;
    use crate::models::table::Table;

    /// 单个用户的构建会话：模型、已加载的表、执行历史
    #[derive(Debug)]
    pub struct Session {
        pub user_id: Uuid,
        pub model: QueryModel,
        pub tables: BTreeMap<String, Table>,
        pub history: SessionHistory,
    }

    impl Session {
        pub fn new(user_id: Uuid, config: &AppConfig) -> Self {
            Self {
                user_id,
                model: QueryModel::with_default_limit(config.default_limit),
                tables: BTreeMap::new(),
                history: SessionHistory::with_capacity(config.history_capacity),
            }
        }
    }

    #[derive(Debug)]
    struct SessionEntry {
        session: Arc<Mutex<Session>>,
        last_active: Instant,
    }

    pub struct AppState {
        pub store: LocalStore,
        pub engine: SqlEngine,
        pub config: AppConfig,
        sessions: DashMap<Uuid, SessionEntry>,
    }

    impl AppState {
        pub fn new(config: AppConfig) -> Self {
            Self {
                store: LocalStore::new(config.storage_root.clone()),
                engine: SqlEngine::new(config.query_timeout),
                sessions: DashMap::new(),
                config,
            }
        }

        pub fn insert_session(&self, id: Uuid, session: Session) {
            self.sessions.insert(
                id,
                SessionEntry {
                    session: Arc::new(Mutex::new(session)),
                    last_active: Instant::now(),
                },
            );
        }

        /// 取出会话句柄并刷新活跃时间，随后立即释放 DashMap 的分片锁
        pub fn session(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
            self.sessions.get_mut(&id).map(|mut entry| {
                entry.last_active = Instant::now();
                Arc::clone(&entry.session)
            })
        }

        pub fn remove_session(&self, id: Uuid) -> bool {
            self.sessions.remove(&id).is_some()
        }

        pub fn session_count(&self) -> usize {
            self.sessions.len()
        }

        /// 移除空闲超过 `idle` 的会话；仍被请求持有的会话保留到下一轮
        pub fn evict_idle(&self, idle: Duration) -> usize {
            let before = self.sessions.len();
            self.sessions.retain(|_, entry| {
                entry.last_active.elapsed() < idle || Arc::strong_count(&entry.session) > 1
            });
            before.saturating_sub(self.sessions.len())
        }
    }

    /// 后台定期清理空闲会话，扫描间隔不超过一分钟
    pub fn spawn_session_reaper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
        let idle = state.config.session_idle;
        let every = idle.min(Duration::from_secs(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = state.evict_idle(idle);
                if evicted > 0 {
                    info!(
                        "清理空闲会话 {} 个，剩余 {} 个",
                        evicted,
                        state.session_count()
                    );
                }
            }
        })
    }

}

pub fn router(state: Arc<ax_state::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/users/{user_id}/files/{upload_type}",
            get(files::list_files),
        )
        .route(
            "/api/users/{user_id}/files/{upload_type}/{file_name}",
            put(files::upload_file).delete(files::delete_file),
        )
        .route("/api/sessions", post(builder::create_session))
        .route(
            "/api/sessions/{id}",
            get(builder::get_session).delete(builder::end_session),
        )
        .route("/api/sessions/{id}/tables", post(builder::add_table))
        .route(
            "/api/sessions/{id}/tables/{table}",
            delete(builder::remove_table),
        )
        .route("/api/sessions/{id}/columns", put(builder::set_columns))
        .route(
            "/api/sessions/{id}/joins/{index}",
            put(builder::set_join).delete(builder::clear_join),
        )
        .route("/api/sessions/{id}/filters", post(builder::add_filter))
        .route(
            "/api/sessions/{id}/filters/{index}",
            delete(builder::remove_filter),
        )
        .route("/api/sessions/{id}/aggregates", put(builder::set_aggregate))
        .route("/api/sessions/{id}/order", put(builder::set_order))
        .route("/api/sessions/{id}/limit", put(builder::set_limit))
        .route("/api/sessions/{id}/sql", get(builder::compile_sql))
        .route("/api/sessions/{id}/run", post(query::run_query))
        .route("/api/sessions/{id}/query", post(query::custom_query))
        .route(
            "/api/sessions/{id}/history",
            get(history::get_history).delete(history::clear_history),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
