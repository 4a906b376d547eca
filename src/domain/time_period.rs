// ==========================================
// 免疫接种预测引擎 - 时间段
// ==========================================
// 职责: 年龄/间隔约束的时间段表示与日期运算
// 格式: "1y6m", "4w", "28d", "0d" (年/月/周/日, 按此顺序)
// ==========================================

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 时间段解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimePeriodParseError {
    #[error("时间段为空")]
    Empty,

    #[error("时间段格式错误: {0}")]
    Malformed(String),

    #[error("未知的时间单位 '{unit}' (时间段: {input})")]
    UnknownUnit { unit: char, input: String },
}

/// 年/月/周/日 组成的时间段
///
/// 加到日期上时先加年月 (月末对齐), 再加周和日。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimePeriod {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
}

impl TimePeriod {
    pub fn new(years: u32, months: u32, weeks: u32, days: u32) -> Self {
        Self {
            years,
            months,
            weeks,
            days,
        }
    }

    pub fn years(years: u32) -> Self {
        Self::new(years, 0, 0, 0)
    }

    pub fn months(months: u32) -> Self {
        Self::new(0, months, 0, 0)
    }

    pub fn weeks(weeks: u32) -> Self {
        Self::new(0, 0, weeks, 0)
    }

    pub fn days(days: u32) -> Self {
        Self::new(0, 0, 0, days)
    }

    /// 至少有一个分量非零
    pub fn is_set(&self) -> bool {
        self.years != 0 || self.months != 0 || self.weeks != 0 || self.days != 0
    }

    /// 将时间段加到日期上; 溢出时返回 None
    pub fn add_to(&self, date: NaiveDate) -> Option<NaiveDate> {
        let total_months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let date = date.checked_add_months(Months::new(total_months))?;
        let days = i64::from(self.weeks) * 7 + i64::from(self.days);
        date.checked_add_signed(Duration::days(days))
    }

    /// 比较 start..end 的经过时间与本时间段
    ///
    /// # 返回
    /// - Less: 经过时间不足 (start + 时间段 晚于 end)
    /// - Equal: 恰好等于 (边界视为满足)
    /// - Greater: 经过时间超过
    ///
    /// 溢出的时间段视为无限长 (Less)
    pub fn compare_elapsed(&self, start: NaiveDate, end: NaiveDate) -> Ordering {
        match self.add_to(start) {
            Some(threshold) => end.cmp(&threshold),
            None => Ordering::Less,
        }
    }

    /// 两个日期间隔的整天数
    pub fn days_elapsed(start: NaiveDate, end: NaiveDate) -> i64 {
        end.signed_duration_since(start).num_days()
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_set() {
            return write!(f, "0d");
        }
        let parts = [
            (self.years, 'y'),
            (self.months, 'm'),
            (self.weeks, 'w'),
            (self.days, 'd'),
        ];
        for (value, unit) in parts {
            if value != 0 {
                write!(f, "{}{}", value, unit)?;
            }
        }
        Ok(())
    }
}

impl FromStr for TimePeriod {
    type Err = TimePeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TimePeriodParseError::Empty);
        }

        let mut period = TimePeriod::default();
        let mut digits = String::new();
        for ch in input.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            if digits.is_empty() {
                return Err(TimePeriodParseError::Malformed(input.to_string()));
            }
            let value: u32 = digits
                .parse()
                .map_err(|_| TimePeriodParseError::Malformed(input.to_string()))?;
            digits.clear();
            let field = match ch.to_ascii_lowercase() {
                'y' => &mut period.years,
                'm' => &mut period.months,
                'w' => &mut period.weeks,
                'd' => &mut period.days,
                unit => {
                    return Err(TimePeriodParseError::UnknownUnit {
                        unit,
                        input: input.to_string(),
                    })
                }
            };
            // 重复单位累加
            *field = field
                .checked_add(value)
                .ok_or_else(|| TimePeriodParseError::Malformed(input.to_string()))?;
        }
        if !digits.is_empty() {
            return Err(TimePeriodParseError::Malformed(input.to_string()));
        }
        Ok(period)
    }
}

impl TryFrom<String> for TimePeriod {
    type Error = TimePeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimePeriod> for String {
    fn from(value: TimePeriod) -> Self {
        value.to_string()
    }
}
