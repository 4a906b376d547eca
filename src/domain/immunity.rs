// ==========================================
// 免疫接种预测引擎 - 疾病免疫记录
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 疾病免疫: 自某日期起该疾病视为已完全覆盖
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiseaseImmunity {
    pub disease: String,
    #[serde(default)]
    pub date_of_immunity: Option<NaiveDate>,
    #[serde(default)]
    pub immunity_reason: Option<String>,
}

impl DiseaseImmunity {
    pub fn new(disease: &str, date_of_immunity: Option<NaiveDate>) -> Self {
        Self {
            disease: disease.to_string(),
            date_of_immunity,
            immunity_reason: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.immunity_reason = Some(reason.to_string());
        self
    }
}
