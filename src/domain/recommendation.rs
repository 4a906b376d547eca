// ==========================================
// 免疫接种预测引擎 - 推荐
// ==========================================
// 职责: 单条候选或最终推荐 (日期/状态/原因/疫苗)
// 约束: 按内容判等, 合并进候选桶时据此去重
// ==========================================

use crate::domain::types::{RecommendationReason, RecommendationStatus};
use crate::domain::vaccine::Vaccine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recommendation {
    pub target_series_identifier: Uuid,
    #[serde(default)]
    pub recommendation_date: Option<NaiveDate>,
    pub recommendation_status: RecommendationStatus,
    #[serde(default)]
    pub recommendation_reason: Option<String>, // 概念编码
    #[serde(default)]
    pub recommended_vaccine: Option<Vaccine>,
}

impl Recommendation {
    /// 新建推荐, 状态为 NOT_FORECASTED
    pub fn new(target_series_identifier: Uuid) -> Self {
        Self {
            target_series_identifier,
            recommendation_date: None,
            recommendation_status: RecommendationStatus::NotForecasted,
            recommendation_reason: None,
            recommended_vaccine: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.recommendation_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: RecommendationStatus) -> Self {
        self.recommendation_status = status;
        self
    }

    pub fn with_reason(mut self, reason: RecommendationReason) -> Self {
        self.recommendation_reason = Some(reason.cds_list_item_name().to_string());
        self
    }

    pub fn with_vaccine(mut self, vaccine: Vaccine) -> Self {
        self.recommended_vaccine = Some(vaccine);
        self
    }

    pub fn has_reason(&self) -> bool {
        self.recommendation_reason
            .as_deref()
            .is_some_and(|r| !r.is_empty())
    }
}
