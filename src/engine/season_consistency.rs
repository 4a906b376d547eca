// ==========================================
// 免疫接种预测引擎 - 季节一致性校验
// ==========================================
// 职责: 校验同一疫苗组内所有系列的季节配置
// 规则:
// 1) 默认季节至多一个
// 2) 组内系列要么全部为季节性, 要么全部非季节性
// 3) 非默认季节两两不得重叠, 起止日期完全相同者视为同一季节
// 4) 存在多个不同季节时必须有默认季节兜底
// ==========================================

use crate::domain::rules::SeriesRules;
use crate::domain::season::Season;
use std::fmt;
use tracing::warn;

/// 季节一致性违规类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeasonConsistencyViolation {
    MultipleDefaultSeasons,
    MixedSeasonalAndNonSeasonal,
    OverlappingSeasons { first: String, second: String },
    MissingDefaultSeason { distinct_seasons: usize },
    DefaultSeasonWithoutFullySpecifiedSeason,
}

impl fmt::Display for SeasonConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonConsistencyViolation::MultipleDefaultSeasons => {
                write!(f, "存在多于一个默认季节")
            }
            SeasonConsistencyViolation::MixedSeasonalAndNonSeasonal => {
                write!(f, "季节性系列与非季节性系列混用")
            }
            SeasonConsistencyViolation::OverlappingSeasons { first, second } => {
                write!(f, "季节重叠: {} / {}", first, second)
            }
            SeasonConsistencyViolation::MissingDefaultSeason { distinct_seasons } => {
                write!(f, "{} 个不同季节但缺少默认季节", distinct_seasons)
            }
            SeasonConsistencyViolation::DefaultSeasonWithoutFullySpecifiedSeason => {
                write!(f, "仅有默认季节, 缺少完整指定的季节")
            }
        }
    }
}

// ==========================================
// SeasonConsistencyValidator - 季节一致性校验器
// ==========================================
pub struct SeasonConsistencyValidator {
    // 无状态校验器
}

impl SeasonConsistencyValidator {
    pub fn new() -> Self {
        Self {}
    }

    /// 校验疫苗组内所有系列的季节配置
    ///
    /// # 参数
    /// - vaccine_group: 疫苗组名称 (仅用于日志)
    /// - series: 组内全部系列规则
    ///
    /// # 返回
    /// - Ok(()): 配置一致 (含非季节性疫苗组)
    /// - Err(violation): 首个违规
    pub fn validate<'a, I>(
        &self,
        vaccine_group: &str,
        series: I,
    ) -> Result<(), SeasonConsistencyViolation>
    where
        I: IntoIterator<Item = &'a SeriesRules>,
    {
        let result = Self::check(series);
        if let Err(violation) = &result {
            warn!(vaccine_group = %vaccine_group, violation = %violation, "季节配置不一致");
        }
        result
    }

    /// 布尔形式
    pub fn is_consistent<'a, I>(&self, vaccine_group: &str, series: I) -> bool
    where
        I: IntoIterator<Item = &'a SeriesRules>,
    {
        self.validate(vaccine_group, series).is_ok()
    }

    fn check<'a, I>(series: I) -> Result<(), SeasonConsistencyViolation>
    where
        I: IntoIterator<Item = &'a SeriesRules>,
    {
        let mut default_season_count = 0usize;
        let mut season_count = 0usize;
        let mut non_seasonal_series_exists = false;
        let mut distinct_seasons: Vec<&Season> = Vec::new();

        for rules in series {
            if rules.seasons.is_empty() {
                non_seasonal_series_exists = true;
                if season_count > 0 {
                    return Err(SeasonConsistencyViolation::MixedSeasonalAndNonSeasonal);
                }
                continue;
            }

            for season in &rules.seasons {
                if non_seasonal_series_exists {
                    return Err(SeasonConsistencyViolation::MixedSeasonalAndNonSeasonal);
                }

                let already_encountered = distinct_seasons.contains(&season);
                if !already_encountered {
                    season_count += 1;
                }

                if season.is_default_season() {
                    // 同一默认季节出现在多个系列中同样计数
                    default_season_count += 1;
                    if default_season_count >= 2 {
                        return Err(SeasonConsistencyViolation::MultipleDefaultSeasons);
                    }
                } else if !already_encountered {
                    for seen in &distinct_seasons {
                        if !season.has_equivalent_start_and_end_dates(seen)
                            && season.overlaps_with(seen)
                        {
                            return Err(SeasonConsistencyViolation::OverlappingSeasons {
                                first: seen.name.clone(),
                                second: season.name.clone(),
                            });
                        }
                    }
                    distinct_seasons.push(season);
                }
            }
        }

        let distinct = distinct_seasons.len();
        if distinct > 0 {
            if distinct > 1 && default_season_count == 0 {
                return Err(SeasonConsistencyViolation::MissingDefaultSeason {
                    distinct_seasons: distinct,
                });
            }
            Ok(())
        } else if default_season_count == 0 {
            // 非季节性疫苗组
            Ok(())
        } else {
            Err(SeasonConsistencyViolation::DefaultSeasonWithoutFullySpecifiedSeason)
        }
    }
}

impl Default for SeasonConsistencyValidator {
    fn default() -> Self {
        Self::new()
    }
}
