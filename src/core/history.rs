use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    QueryExecuted,
    QueryFailed,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEvent {
    pub fn executed(sql: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action_type: ActionType::QueryExecuted,
            content: sql.into(),
            error: None,
        }
    }

    pub fn failed(sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action_type: ActionType::QueryFailed,
            content: sql.into(),
            error: Some(error.into()),
        }
    }
}

/// 执行结果的接收方，只写不读
pub trait HistorySink {
    fn record(&mut self, event: HistoryEvent);
}

/// 会话内的有界历史，超出容量丢弃最旧的记录
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: VecDeque<HistoryEvent>,
    capacity: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct HistoryFilter {
    pub action_type: Option<ActionType>,
    #[serde(default)]
    pub errors_only: bool,
}

impl SessionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最新的在前
    pub fn list(&self, filter: &HistoryFilter) -> Vec<HistoryEvent> {
        self.entries
            .iter()
            .rev()
            .filter(|e| filter.action_type.is_none_or(|t| e.action_type == t))
            .filter(|e| !filter.errors_only || e.error.is_some())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl HistorySink for SessionHistory {
    fn record(&mut self, event: HistoryEvent) {
        debug!(action = ?event.action_type, "记录历史");
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }
}
