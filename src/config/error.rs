// ==========================================
// 免疫接种预测引擎 - 配置层错误类型
// ==========================================
// 范围: 运行配置文件与支撑数据 (知识库) 加载
// 工具: thiserror 派生宏
// ==========================================

use std::path::PathBuf;
use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    // ===== 文件错误 =====
    #[error("配置文件读取失败 (path={path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件解析失败 (path={path}): {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ===== 内容错误 =====
    #[error("配置项无效 (key={key}): {message}")]
    InvalidValue { key: String, message: String },

    #[error("重复定义: {kind} '{name}'")]
    DuplicateEntry { kind: String, name: String },

    #[error("引用未定义: {kind} '{name}' (引用方: {referenced_by})")]
    UnknownReference {
        kind: String,
        name: String,
        referenced_by: String,
    },
}

impl ConfigError {
    pub fn invalid_value(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn duplicate(kind: &str, name: &str) -> Self {
        ConfigError::DuplicateEntry {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn unknown_reference(kind: &str, name: &str, referenced_by: &str) -> Self {
        ConfigError::UnknownReference {
            kind: kind.to_string(),
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        }
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
