// ==========================================
// 免疫接种预测引擎 - 核心库
// ==========================================
// 职责: 按接种计划评估既往剂次, 生成下一剂推荐
// 系统定位: 临床决策支持 (结果供人工复核)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 运行配置与支撑数据
pub mod config;

// 引擎层 - 评估与推荐
pub mod engine;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    DoseStatus, EvaluationReason, RecommendationReason, RecommendationStatus, RecommendationType,
};

// 领域实体
pub use domain::{
    DiseaseImmunity, DoseRule, Recommendation, Season, SeriesRules, TargetDose, TimePeriod,
    Vaccine, VaccineComponent,
};

// 配置
pub use config::{ForecastConfig, SupportingData};

// 引擎
pub use engine::{
    EngineError, EngineResult, ForecastOrchestrator, ForecastRequest, ForecastResult, Schedule,
    SeasonConsistencyValidator, TargetSeries,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "免疫接种预测引擎";
