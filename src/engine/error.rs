// ==========================================
// 免疫接种预测引擎 - 引擎层错误类型
// ==========================================
// 分类: 用法错误 / 配置不一致 / 内部不变量破坏
// 工具: thiserror 派生宏
// 约定: 只中止当前操作, 引擎内部不重试
// ==========================================

use crate::config::ConfigError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 用法错误 =====
    #[error("用法错误: {0}")]
    ImproperUsage(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 配置错误 =====
    #[error("配置不一致: {0}")]
    InconsistentConfiguration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // ===== 内部错误 =====
    #[error("内部错误: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn improper_usage(message: impl Into<String>) -> Self {
        EngineError::ImproperUsage(message.into())
    }

    pub fn inconsistent_configuration(message: impl Into<String>) -> Self {
        EngineError::InconsistentConfiguration(message.into())
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否为配置类错误 (修正配置后可重试)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EngineError::InconsistentConfiguration(_)
                | EngineError::Config(_)
        )
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
