// ==========================================
// 免疫接种预测引擎 - 领域类型定义
// ==========================================
// 职责: 剂次状态、推荐状态、推荐类型、评估原因等封闭枚举
// 约定: 每个枚举值携带一个概念编码字符串 (cds list item name)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 剂次状态 (Dose Status)
// ==========================================
// NOT_EVALUATED -> {VALID, ACCEPTED, INVALID}, 可重新评估
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseStatus {
    #[default]
    NotEvaluated, // 未评估
    Valid,        // 有效
    Accepted,     // 接受(不计入但不惩罚)
    Invalid,      // 无效
}

impl DoseStatus {
    /// 是否视为有效剂次 (VALID / ACCEPTED)
    pub fn is_valid(&self) -> bool {
        matches!(self, DoseStatus::Valid | DoseStatus::Accepted)
    }

    /// 是否为评估终态
    pub fn is_evaluated(&self) -> bool {
        matches!(
            self,
            DoseStatus::Valid | DoseStatus::Accepted | DoseStatus::Invalid
        )
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoseStatus::NotEvaluated => write!(f, "NOT_EVALUATED"),
            DoseStatus::Valid => write!(f, "VALID"),
            DoseStatus::Accepted => write!(f, "ACCEPTED"),
            DoseStatus::Invalid => write!(f, "INVALID"),
        }
    }
}

// ==========================================
// 推荐状态 (Recommendation Status)
// ==========================================
// 前四个为预测过程的簿记状态, 不带概念编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    #[default]
    NotForecasted,
    EvaluationOfHistoryRequired,
    ForecastingInProgress,
    ForecastingComplete,
    Recommended,
    ConditionallyRecommended,
    NotRecommended,
    RecommendedInFuture,
}

impl RecommendationStatus {
    /// 对应的概念编码; 簿记状态返回 None
    pub fn cds_list_item_name(&self) -> Option<&'static str> {
        match self {
            RecommendationStatus::Recommended => Some("RECOMMENDATION_STATUS_CONCEPT.RECOMMENDED"),
            RecommendationStatus::ConditionallyRecommended => {
                Some("RECOMMENDATION_STATUS_CONCEPT.CONDITIONAL")
            }
            RecommendationStatus::NotRecommended => {
                Some("RECOMMENDATION_STATUS_CONCEPT.NOT_RECOMMENDED")
            }
            RecommendationStatus::RecommendedInFuture => {
                Some("RECOMMENDATION_STATUS_CONCEPT.FUTURE_RECOMMENDED")
            }
            _ => None,
        }
    }

    /// 按概念编码反查
    pub fn from_cds_list_item_name(name: &str) -> Option<Self> {
        [
            RecommendationStatus::Recommended,
            RecommendationStatus::ConditionallyRecommended,
            RecommendationStatus::NotRecommended,
            RecommendationStatus::RecommendedInFuture,
        ]
        .into_iter()
        .find(|s| s.cds_list_item_name() == Some(name))
    }

    /// 是否为四个标准推荐状态之一
    pub fn is_standard(&self) -> bool {
        self.cds_list_item_name().is_some()
    }

    /// 标准状态对应的通用推荐原因
    pub fn generic_reason(&self) -> Option<RecommendationReason> {
        match self {
            RecommendationStatus::ConditionallyRecommended => {
                Some(RecommendationReason::ConditionallyHighRisk)
            }
            RecommendationStatus::NotRecommended => Some(RecommendationReason::NotSpecified),
            RecommendationStatus::RecommendedInFuture => Some(RecommendationReason::InFuture),
            RecommendationStatus::Recommended => Some(RecommendationReason::DueNow),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationStatus::NotForecasted => write!(f, "NOT_FORECASTED"),
            RecommendationStatus::EvaluationOfHistoryRequired => {
                write!(f, "EVALUATION_OF_HISTORY_REQUIRED")
            }
            RecommendationStatus::ForecastingInProgress => write!(f, "FORECASTING_IN_PROGRESS"),
            RecommendationStatus::ForecastingComplete => write!(f, "FORECASTING_COMPLETE"),
            RecommendationStatus::Recommended => write!(f, "RECOMMENDED"),
            RecommendationStatus::ConditionallyRecommended => {
                write!(f, "CONDITIONALLY_RECOMMENDED")
            }
            RecommendationStatus::NotRecommended => write!(f, "NOT_RECOMMENDED"),
            RecommendationStatus::RecommendedInFuture => write!(f, "RECOMMENDED_IN_FUTURE"),
        }
    }
}

// ==========================================
// 推荐类型 (Recommendation Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Earliest,            // 最早可接种
    EarliestRecommended, // 推荐接种
    LatestRecommended,   // 逾期前最后一天
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationType::Earliest => write!(f, "EARLIEST"),
            RecommendationType::EarliestRecommended => write!(f, "EARLIEST_RECOMMENDED"),
            RecommendationType::LatestRecommended => write!(f, "LATEST_RECOMMENDED"),
        }
    }
}

// ==========================================
// 评估原因 (Evaluation Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
    AboveRecommendedAgeSeries,
    BelowMinimumAge,
    BelowMinimumInterval,
    BelowMinimumAgeFinalDose,
    BelowMinimumAgeVaccine,
    BelowMinimumIntervalPcvPpsv,
    BelowRecommendedAgeSeries,
    DuplicateSameDay,
    ExtraDose,
    InsufficientAntigen,
    InvalidAge,
    OutsideSeason,
    OutsideFluVaccineSeason,
    PriorToDateOfBirth,
    TooEarlyLiveVirus,
    VaccineNotAllowedForThisDose,
    VaccineNotMemberOfSeries,
}

impl EvaluationReason {
    pub fn cds_list_item_name(&self) -> &'static str {
        match self {
            EvaluationReason::AboveRecommendedAgeSeries => "EVALUATION_REASON_CONCEPT.ABOVE_REC_AGE_SERIES",
            EvaluationReason::BelowMinimumAge => "EVALUATION_REASON_CONCEPT.BELOW_MINIMUM_AGE_SERIES",
            EvaluationReason::BelowMinimumInterval => "EVALUATION_REASON_CONCEPT.BELOW_MINIMUM_INTERVAL",
            EvaluationReason::BelowMinimumAgeFinalDose => "EVALUATION_REASON_CONCEPT.BELOW_MINIMUM_AGE_FINAL_DOSE",
            EvaluationReason::BelowMinimumAgeVaccine => "EVALUATION_REASON_CONCEPT.BELOW_MINIMUM_AGE_VACCINE",
            EvaluationReason::BelowMinimumIntervalPcvPpsv => "EVALUATION_REASON_CONCEPT.BELOW_MIN_INTERVAL_PCV_PPSV",
            EvaluationReason::BelowRecommendedAgeSeries => "EVALUATION_REASON_CONCEPT.BELOW_REC_AGE_SERIES",
            EvaluationReason::DuplicateSameDay => "EVALUATION_REASON_CONCEPT.DUPLICATE_SAME_DAY",
            EvaluationReason::ExtraDose => "EVALUATION_REASON_CONCEPT.EXTRA_DOSE",
            EvaluationReason::InsufficientAntigen => "EVALUATION_REASON_CONCEPT.INSUFFICIENT_ANTIGEN",
            EvaluationReason::InvalidAge => "EVALUATION_REASON_CONCEPT.INVALID_AGE",
            EvaluationReason::OutsideSeason => "EVALUATION_REASON_CONCEPT.OUTSIDE_SEASON",
            EvaluationReason::OutsideFluVaccineSeason => "EVALUATION_REASON_CONCEPT.OUTSIDE_FLU_VAC_SEASON",
            EvaluationReason::PriorToDateOfBirth => "EVALUATION_REASON_CONCEPT.PRIOR_TO_DOB",
            EvaluationReason::TooEarlyLiveVirus => "EVALUATION_REASON_CONCEPT.TOO_EARLY_LIVE_VIRUS",
            EvaluationReason::VaccineNotAllowedForThisDose => "EVALUATION_REASON_CONCEPT.VACCINE_NOT_ALLOWED_FOR_THIS_DOSE",
            EvaluationReason::VaccineNotMemberOfSeries => "EVALUATION_REASON_CONCEPT.VACCINE_NOT_MEMBER_OF_SERIES",
        }
    }
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cds_list_item_name())
    }
}

// ==========================================
// 推荐原因 (Recommendation Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationReason {
    Complete,              // 系列已完成
    ConditionallyHighRisk, // 高风险人群条件推荐
    NotSpecified,          // 未说明的不推荐
    InFuture,              // 将来推荐
    DueNow,                // 当前应接种
}

impl RecommendationReason {
    pub fn cds_list_item_name(&self) -> &'static str {
        match self {
            RecommendationReason::Complete => "RECOMMENDATION_REASON_CONCEPT.COMPLETE",
            RecommendationReason::ConditionallyHighRisk => "RECOMMENDATION_REASON_CONCEPT.HIGH_RISK",
            RecommendationReason::NotSpecified => "RECOMMENDATION_REASON_CONCEPT.NOT_SPECIFIED",
            RecommendationReason::InFuture => "RECOMMENDATION_REASON_CONCEPT.FUTURE_RECOMMENDED",
            RecommendationReason::DueNow => "RECOMMENDATION_REASON_CONCEPT.DUE_NOW",
        }
    }
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cds_list_item_name())
    }
}

// ==========================================
// 概念类型 (ICE Concept Type)
// ==========================================
// 用于按 (类型, 编码) 查找本地列表项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IceConceptType {
    Disease,
    Vaccine,
    VaccineGroup,
}

impl fmt::Display for IceConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IceConceptType::Disease => write!(f, "DISEASE"),
            IceConceptType::Vaccine => write!(f, "VACCINE"),
            IceConceptType::VaccineGroup => write!(f, "VACCINE_GROUP"),
        }
    }
}
