use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tabsql_backend::ax_state::{spawn_session_reaper, AppState};
use tabsql_backend::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::fs::create_dir_all(&config.storage_root)?;
    info!(
        "存储目录: {}，查询超时 {:?}，默认 LIMIT {}，会话空闲上限 {:?}",
        config.storage_root.display(),
        config.query_timeout,
        config.default_limit,
        config.session_idle
    );

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config));
    spawn_session_reaper(Arc::clone(&state));
    let app = tabsql_backend::router(state);

    info!("🚀 TabSQL Backend 运行在 http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
