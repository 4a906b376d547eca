// ==========================================
// 免疫接种预测引擎 - 领域模型层
// ==========================================
// 职责: 剂次、推荐、规则、季节、疫苗等领域实体与类型
// 红线: 不含支撑数据加载逻辑,不含系列评估逻辑
// ==========================================

pub mod immunity;
pub mod recommendation;
pub mod rules;
pub mod season;
pub mod target_dose;
pub mod time_period;
pub mod types;
pub mod vaccine;

// 重导出核心类型
pub use immunity::DiseaseImmunity;
pub use recommendation::Recommendation;
pub use rules::{DoseRule, SeriesRules};
pub use season::Season;
pub use target_dose::{ReasonKind, TargetDose};
pub use time_period::{TimePeriod, TimePeriodParseError};
pub use types::{
    DoseStatus, EvaluationReason, IceConceptType, RecommendationReason, RecommendationStatus,
    RecommendationType,
};
pub use vaccine::{Vaccine, VaccineComponent};
