use thiserror::Error;

/// 标识符不合法，携带原始值
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("非法标识符: {0}")]
pub struct InvalidIdentifier(pub String);

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("文件不存在: {0}")]
    NotFound(String),

    #[error("非法文件路径: {0}")]
    InvalidPath(String),

    #[error("读取文件 {path} 失败: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("文件已存在: {0}，请先重命名或删除")]
    AlreadyExists(String),

    #[error("非法文件名: {0}")]
    InvalidFileName(String),

    #[error("文件不存在: {0}")]
    NotFound(String),

    #[error("存储写入失败 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 加载阶段错误，均带文件名
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("不支持的文件格式: {file}")]
    UnsupportedFormat { file: String },

    #[error("获取文件 {file} 失败: {source}")]
    Retrieval {
        file: String,
        #[source]
        source: RetrievalError,
    },

    #[error("解析文件 {file} 失败: {message}")]
    Parse { file: String, message: String },
}

impl LoadError {
    pub fn file(&self) -> &str {
        match self {
            LoadError::UnsupportedFormat { file }
            | LoadError::Retrieval { file, .. }
            | LoadError::Parse { file, .. } => file,
        }
    }
}

/// 查询模型变更被拒绝
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("LIMIT 必须为正整数, 实际为 {0}")]
    InvalidLimit(i64),

    #[error("列 {0} 不存在于已选择的表中")]
    UnknownColumn(String),

    #[error("列 {0} 未被选择")]
    ColumnNotSelected(String),

    #[error("JOIN 位置 {index} 越界 (共 {slots} 个)")]
    JoinIndexOutOfRange { index: usize, slots: usize },

    #[error("JOIN 位置 {index} 必须连接 {expected_left} 与 {expected_right}")]
    JoinTablesMismatch {
        index: usize,
        expected_left: String,
        expected_right: String,
    },

    #[error("{operator} JOIN 需要指定连接列")]
    MissingJoinColumns { operator: String },

    #[error("过滤条件位置 {index} 越界 (共 {len} 个)")]
    FilterIndexOutOfRange { index: usize, len: usize },

    #[error("运算符 {operator} 需要取值")]
    MissingFilterValue { operator: String },

    #[error("运算符 {operator} 不接受取值")]
    UnexpectedFilterValue { operator: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    #[error("列 {0} 不存在于已选择的表中")]
    UnknownColumn(String),

    #[error("聚合列 {0} 未出现在 SELECT 中")]
    AggregateNotSelected(String),

    #[error("第 {index} 个 JOIN 未配置")]
    MissingJoin { index: usize },

    #[error("JOIN 引用的表 {0} 未被选择")]
    JoinTableNotSelected(String),

    #[error("没有选择任何表")]
    NoTables,
}

/// 引擎执行失败，原样带回错误信息与 SQL
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("执行查询失败: {message}")]
    Engine { message: String, sql: String },

    #[error("注册表 {table} 失败: {message}")]
    Register {
        table: String,
        message: String,
        sql: String,
    },

    #[error("查询超时 ({secs} 秒)")]
    Timeout { secs: u64, sql: String },
}

impl ExecutionError {
    pub fn sql(&self) -> &str {
        match self {
            ExecutionError::Engine { sql, .. }
            | ExecutionError::Register { sql, .. }
            | ExecutionError::Timeout { sql, .. } => sql,
        }
    }
}
