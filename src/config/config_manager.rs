// ==========================================
// 免疫接种预测引擎 - 运行配置
// ==========================================
// 职责: 运行配置加载与覆写 (默认值 < 配置文件 < 环境变量)
// 配置项: 知识库目录 / CDS 版本 / 计划标识 / 日志格式 / 评估日期
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ==========================================
// 配置键常量 (环境变量名)
// ==========================================
pub mod config_keys {
    /// 知识库根目录
    pub const KNOWLEDGE_REPOSITORY: &str = "ICE_KNOWLEDGE_REPOSITORY";
    /// CDS 版本列表 (逗号分隔)
    pub const CDS_VERSIONS: &str = "ICE_CDS_VERSIONS";
    /// 计划标识
    pub const SCHEDULE_ID: &str = "ICE_SCHEDULE_ID";
    /// 是否输出 JSON 格式日志 (true/false)
    pub const LOG_JSON: &str = "ICE_LOG_JSON";
    /// 固定评估日期 (YYYY-MM-DD), 未设置时使用当天
    pub const EVALUATION_DATE: &str = "ICE_EVALUATION_DATE";
}

/// 默认 CDS 版本
pub const DEFAULT_CDS_VERSION: &str = "v1.0.0";

/// 默认计划标识
pub const DEFAULT_SCHEDULE_ID: &str = "default";

// ==========================================
// ForecastConfig - 运行配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// 知识库根目录
    #[serde(default = "default_knowledge_repository")]
    pub knowledge_repository: PathBuf,

    /// CDS 版本 (按顺序合并)
    #[serde(default = "default_cds_versions")]
    pub cds_versions: Vec<String>,

    /// 计划标识
    #[serde(default = "default_schedule_id")]
    pub schedule_id: String,

    /// 固定评估日期（可选; 未设置时使用当天）
    #[serde(default)]
    pub evaluation_date: Option<NaiveDate>,

    /// JSON 格式日志
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            knowledge_repository: default_knowledge_repository(),
            cds_versions: default_cds_versions(),
            schedule_id: default_schedule_id(),
            evaluation_date: None,
            log_json: false,
        }
    }
}

fn default_cds_versions() -> Vec<String> {
    vec![DEFAULT_CDS_VERSION.to_string()]
}

fn default_schedule_id() -> String {
    DEFAULT_SCHEDULE_ID.to_string()
}

/// 默认知识库目录: 用户数据目录下的应用目录
pub fn default_knowledge_repository() -> PathBuf {
    let mut path = PathBuf::from("./knowledge");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("immunization-forecast-dev").join("knowledge");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("immunization-forecast").join("knowledge");
        }
    }

    path
}

impl ForecastConfig {
    /// 加载配置: 默认值 -> 配置文件(可选) -> 环境变量
    ///
    /// # 参数
    /// - config_file: 配置文件路径 (None 时跳过)
    pub fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件读取, 缺失字段取默认值
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 按键读取覆写值 (空白值忽略)
    ///
    /// # 参数
    /// - lookup: 配置键 -> 值, 生产环境为环境变量
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = read(config_keys::KNOWLEDGE_REPOSITORY) {
            debug!(key = config_keys::KNOWLEDGE_REPOSITORY, value = %value, "配置覆写");
            self.knowledge_repository = PathBuf::from(value);
        }

        if let Some(value) = read(config_keys::CDS_VERSIONS) {
            debug!(key = config_keys::CDS_VERSIONS, value = %value, "配置覆写");
            self.cds_versions = value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = read(config_keys::SCHEDULE_ID) {
            self.schedule_id = value;
        }

        if let Some(value) = read(config_keys::LOG_JSON) {
            self.log_json = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::invalid_value(
                        config_keys::LOG_JSON,
                        format!("无法解析为布尔值: {}", value),
                    ))
                }
            };
        }

        if let Some(value) = read(config_keys::EVALUATION_DATE) {
            let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| {
                ConfigError::invalid_value(config_keys::EVALUATION_DATE, e.to_string())
            })?;
            self.evaluation_date = Some(date);
        }

        Ok(())
    }

    /// 基本校验
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cds_versions.is_empty() {
            return Err(ConfigError::invalid_value(
                config_keys::CDS_VERSIONS,
                "至少需要一个版本",
            ));
        }
        if self.schedule_id.trim().is_empty() {
            return Err(ConfigError::invalid_value(config_keys::SCHEDULE_ID, "不能为空"));
        }
        Ok(())
    }
}
