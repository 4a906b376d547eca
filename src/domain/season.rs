// ==========================================
// 免疫接种预测引擎 - 季节窗口
// ==========================================
// 职责: 季节性系列的接种日期窗口
// 说明: 默认季节不指定起止日期, 作为兜底季节
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 季节窗口 (含可选的季后延续窗口)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Season {
    pub name: String,
    #[serde(default)]
    pub default_season: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub off_season_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub off_season_end_date: Option<NaiveDate>,
}

impl Season {
    /// 完整指定起止日期的季节
    pub fn fully_specified(name: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            default_season: false,
            start_date: Some(start),
            end_date: Some(end),
            off_season_start_date: None,
            off_season_end_date: None,
        }
    }

    /// 默认(兜底)季节
    pub fn default_named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default_season: true,
            start_date: None,
            end_date: None,
            off_season_start_date: None,
            off_season_end_date: None,
        }
    }

    pub fn with_off_season(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.off_season_start_date = Some(start);
        self.off_season_end_date = Some(end);
        self
    }

    pub fn is_default_season(&self) -> bool {
        self.default_season
    }

    pub fn is_fully_specified(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }

    /// 起止日期完全相同 (视为同一季节)
    pub fn has_equivalent_start_and_end_dates(&self, other: &Season) -> bool {
        self.start_date == other.start_date && self.end_date == other.end_date
    }

    /// 两个完整指定的季节是否有日期交集 (端点相接视为重叠)
    ///
    /// 未指定起止日期的季节不参与重叠判断
    pub fn overlaps_with(&self, other: &Season) -> bool {
        match (self.start_date, self.end_date, other.start_date, other.end_date) {
            (Some(s1), Some(e1), Some(s2), Some(e2)) => s1 <= e2 && s2 <= e1,
            _ => false,
        }
    }

    /// 日期是否落在季节或季后窗口内
    ///
    /// 默认季节对任意日期适用
    pub fn date_is_applicable_to_season(&self, date: NaiveDate) -> bool {
        if self.default_season && !self.is_fully_specified() {
            return true;
        }
        let in_season = matches!(
            (self.start_date, self.end_date),
            (Some(start), Some(end)) if start <= date && date <= end
        );
        let in_off_season = matches!(
            (self.off_season_start_date, self.off_season_end_date),
            (Some(start), Some(end)) if start <= date && date <= end
        );
        in_season || in_off_season
    }
}
