// ==========================================
// 免疫接种预测引擎 - 剂次规则与系列规则
// ==========================================
// 职责: 按剂次编号的年龄/间隔/疫苗约束, 以及系列级标志
// 输入: 支撑数据 JSON (serde)
// ==========================================

use crate::domain::season::Season;
use crate::domain::time_period::TimePeriod;
use crate::domain::types::RecommendationType;
use serde::{Deserialize, Serialize};

// ==========================================
// DoseRule - 单剂次约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseRule {
    pub dose_number: u32, // 剂次编号 (1 起)

    // ===== 年龄约束 =====
    #[serde(default)]
    pub absolute_minimum_age: Option<TimePeriod>,
    #[serde(default)]
    pub minimum_age: Option<TimePeriod>,
    #[serde(default)]
    pub earliest_recommended_age: Option<TimePeriod>,
    #[serde(default)]
    pub latest_recommended_age: Option<TimePeriod>,

    // ===== 间隔约束 (距下一剂) =====
    #[serde(default)]
    pub absolute_minimum_interval: Option<TimePeriod>,
    #[serde(default)]
    pub minimum_interval: Option<TimePeriod>,
    #[serde(default)]
    pub earliest_recommended_interval: Option<TimePeriod>,
    #[serde(default)]
    pub latest_recommended_interval: Option<TimePeriod>,

    // ===== 疫苗约束 (概念编码) =====
    #[serde(default)]
    pub preferable_vaccines: Vec<String>,
    #[serde(default)]
    pub allowable_vaccines: Vec<String>,
}

impl DoseRule {
    pub fn new(dose_number: u32) -> Self {
        Self {
            dose_number,
            absolute_minimum_age: None,
            minimum_age: None,
            earliest_recommended_age: None,
            latest_recommended_age: None,
            absolute_minimum_interval: None,
            minimum_interval: None,
            earliest_recommended_interval: None,
            latest_recommended_interval: None,
            preferable_vaccines: Vec::new(),
            allowable_vaccines: Vec::new(),
        }
    }

    /// 按推荐类型取年龄约束
    ///
    /// EARLIEST 取 minimum_age
    pub fn age_for(&self, recommendation_type: RecommendationType) -> Option<TimePeriod> {
        match recommendation_type {
            RecommendationType::Earliest => self.minimum_age,
            RecommendationType::EarliestRecommended => self.earliest_recommended_age,
            RecommendationType::LatestRecommended => self.latest_recommended_age,
        }
    }

    /// 按推荐类型取间隔约束
    pub fn interval_for(&self, recommendation_type: RecommendationType) -> Option<TimePeriod> {
        match recommendation_type {
            RecommendationType::Earliest => self.minimum_interval,
            RecommendationType::EarliestRecommended => self.earliest_recommended_interval,
            RecommendationType::LatestRecommended => self.latest_recommended_interval,
        }
    }

    /// 全部允许的疫苗 (优选在前, 去重)
    pub fn all_permitted_vaccines(&self) -> Vec<String> {
        let mut permitted = self.preferable_vaccines.clone();
        for code in &self.allowable_vaccines {
            if !permitted.contains(code) {
                permitted.push(code.clone());
            }
        }
        permitted
    }

    /// 未配置疫苗清单时不做限制
    pub fn is_vaccine_permitted(&self, cds_concept: &str) -> bool {
        if self.preferable_vaccines.is_empty() && self.allowable_vaccines.is_empty() {
            return true;
        }
        self.preferable_vaccines.iter().any(|c| c == cds_concept)
            || self.allowable_vaccines.iter().any(|c| c == cds_concept)
    }
}

// ==========================================
// SeriesRules - 系列规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRules {
    pub series_name: String,
    pub vaccine_group: String,
    pub number_of_doses_in_series: u32,
    /// true: 取各疾病计数的最小值; false: 取最大值
    #[serde(default)]
    pub dose_number_calculated_by_diseases_targeted: bool,
    /// 系列完成后是否仍有加强剂
    #[serde(default)]
    pub recurring_doses_after_series_complete: bool,
    #[serde(default)]
    pub dose_rules: Vec<DoseRule>,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl SeriesRules {
    pub fn new(series_name: &str, vaccine_group: &str) -> Self {
        Self {
            series_name: series_name.to_string(),
            vaccine_group: vaccine_group.to_string(),
            number_of_doses_in_series: 0,
            dose_number_calculated_by_diseases_targeted: false,
            recurring_doses_after_series_complete: false,
            dose_rules: Vec::new(),
            seasons: Vec::new(),
        }
    }

    /// 追加剂次规则并同步剂次总数
    pub fn with_dose_rule(mut self, rule: DoseRule) -> Self {
        self.dose_rules.push(rule);
        self.number_of_doses_in_series = self.dose_rules.len() as u32;
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.seasons.push(season);
        self
    }

    pub fn dose_rule(&self, dose_number: u32) -> Option<&DoseRule> {
        self.dose_rules.iter().find(|r| r.dose_number == dose_number)
    }

    pub fn is_seasonal(&self) -> bool {
        !self.seasons.is_empty()
    }

    /// 剂次规则数量与声明的剂次总数一致
    pub fn dose_rules_consistent(&self) -> bool {
        self.dose_rules.len() == self.number_of_doses_in_series as usize
    }
}
