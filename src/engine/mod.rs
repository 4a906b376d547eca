// ==========================================
// 免疫接种预测引擎 - 引擎层
// ==========================================
// 职责: 接种计划、单系列评估上下文、季节一致性校验、预测编排
// 红线: 引擎单线程同步执行; 共享规则只读, 修改前复制
// ==========================================

pub mod error;
pub mod orchestrator;
pub mod schedule;
pub mod season_consistency;
pub mod target_series;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use orchestrator::{
    AdministeredDose, DoseEvaluation, ForecastOrchestrator, ForecastRecommendation,
    ForecastRequest, ForecastResult, SeriesForecast,
};
pub use schedule::Schedule;
pub use season_consistency::{SeasonConsistencyValidator, SeasonConsistencyViolation};
pub use target_series::{RecommendationBasis, TargetSeries};
