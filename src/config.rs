use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::history::DEFAULT_HISTORY_CAPACITY;
use crate::models::query::DEFAULT_LIMIT;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage_root: PathBuf,
    pub query_timeout: Duration,
    pub default_limit: u64,
    pub history_capacity: usize,
    pub preview_rows: usize,
    pub session_idle: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            storage_root: PathBuf::from("./storage"),
            query_timeout: Duration::from_secs(30),
            default_limit: DEFAULT_LIMIT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            preview_rows: 5,
            session_idle: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    /// 先加载 .env，再读 TABSQL_* 环境变量，未设置的取默认值
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timeout_secs: u64 = parse_var(&lookup, "TABSQL_QUERY_TIMEOUT_SECS")?
            .unwrap_or(defaults.query_timeout.as_secs());
        let default_limit: u64 =
            parse_var(&lookup, "TABSQL_DEFAULT_LIMIT")?.unwrap_or(defaults.default_limit);
        let idle_secs: u64 = parse_var(&lookup, "TABSQL_SESSION_IDLE_SECS")?
            .unwrap_or(defaults.session_idle.as_secs());
        if timeout_secs == 0 {
            anyhow::bail!("TABSQL_QUERY_TIMEOUT_SECS 必须大于 0");
        }
        if default_limit == 0 {
            anyhow::bail!("TABSQL_DEFAULT_LIMIT 必须大于 0");
        }
        if idle_secs == 0 {
            anyhow::bail!("TABSQL_SESSION_IDLE_SECS 必须大于 0");
        }

        Ok(Self {
            bind_addr: parse_var(&lookup, "TABSQL_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            storage_root: lookup("TABSQL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            query_timeout: Duration::from_secs(timeout_secs),
            default_limit,
            history_capacity: parse_var(&lookup, "TABSQL_HISTORY_CAPACITY")?
                .unwrap_or(defaults.history_capacity),
            preview_rows: parse_var(&lookup, "TABSQL_PREVIEW_ROWS")?.unwrap_or(defaults.preview_rows),
            session_idle: Duration::from_secs(idle_secs),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("环境变量 {} 的值无效: {}", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.default_limit, 100);
        assert_eq!(cfg.query_timeout, Duration::from_secs(30));
        assert_eq!(cfg.session_idle, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("TABSQL_BIND_ADDR", "127.0.0.1:8080"),
            ("TABSQL_STORAGE_ROOT", "/tmp/tabsql"),
            ("TABSQL_QUERY_TIMEOUT_SECS", "5"),
            ("TABSQL_DEFAULT_LIMIT", "25"),
            ("TABSQL_HISTORY_CAPACITY", "10"),
            ("TABSQL_SESSION_IDLE_SECS", "600"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.storage_root, PathBuf::from("/tmp/tabsql"));
        assert_eq!(cfg.query_timeout, Duration::from_secs(5));
        assert_eq!(cfg.default_limit, 25);
        assert_eq!(cfg.history_capacity, 10);
        assert_eq!(cfg.session_idle, Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("TABSQL_DEFAULT_LIMIT", "abc")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("TABSQL_DEFAULT_LIMIT", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("TABSQL_QUERY_TIMEOUT_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("TABSQL_SESSION_IDLE_SECS", "0")])).is_err());
    }
}
