use super::core::TargetSeries;
use crate::domain::target_dose::ReasonKind;
use crate::domain::time_period::TimePeriod;
use crate::domain::types::{DoseStatus, EvaluationReason};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 剂次约束评估
// ==========================================
// 年龄: 接种日 - 出生日 < 绝对最小年龄 -> BELOW_MINIMUM_AGE (边界含)
// 间隔: 与前一剂 (按接种序号) 的间隔 < 绝对最小间隔 -> BELOW_MINIMUM_INTERVAL
//       同日接种 (间隔 0 天) 始终豁免
// 系列已完成时追加 EXTRA_DOSE 接受原因
// ==========================================

impl TargetSeries {
    /// 最小年龄检查
    ///
    /// # 规则
    /// - 系列已完成: 记录 EXTRA_DOSE 后直接返回 (额外剂次不按年龄惩罚)
    /// - 未配置剂次规则: 不做任何检查 (包括出生日期)
    /// - 接种早于出生: INVALID_AGE
    /// - 未配置最小年龄: 不做年龄检查
    pub fn evaluate_minimum_age_and_record_reason(
        &mut self,
        birth_date: NaiveDate,
        unique_id: Uuid,
    ) -> EngineResult<()> {
        let index = self.dose_index(unique_id)?;
        if self.is_series_complete() {
            self.target_doses[index].add_evaluation_reason(ReasonKind::Accepted, EvaluationReason::ExtraDose);
            return Ok(());
        }

        let dose_number = self.target_doses[index].dose_number();
        let administration_date = self.target_doses[index].administration_date();

        let Some(rule) = self.series_rules.dose_rule(dose_number) else {
            warn!(series_name = %self.series_name(), dose_number, "剂次规则未配置, 跳过年龄检查");
            return Ok(());
        };
        let absolute_minimum_age = rule.absolute_minimum_age;

        if administration_date < birth_date {
            warn!(dose_id = %self.target_doses[index].dose_id(), "接种日期早于出生日期");
            self.target_doses[index].add_evaluation_reason(ReasonKind::Invalid, EvaluationReason::InvalidAge);
        }

        let Some(minimum_age) = absolute_minimum_age else {
            debug!(dose_number, "未配置最小年龄");
            return Ok(());
        };

        if minimum_age.compare_elapsed(birth_date, administration_date) == Ordering::Less {
            self.target_doses[index]
                .add_evaluation_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumAge);
        }
        Ok(())
    }

    /// 最小间隔检查 (与按接种序号的前一剂比较)
    ///
    /// # 返回
    /// - Err(InconsistentConfiguration): 前一剂次编号对应的剂次规则缺失
    pub fn evaluate_minimum_interval_and_record_reason(&mut self, unique_id: Uuid) -> EngineResult<()> {
        let index = self.dose_index(unique_id)?;
        if self.is_series_complete() {
            self.target_doses[index].add_evaluation_reason(ReasonKind::Accepted, EvaluationReason::ExtraDose);
        }
        if index == 0 {
            return Ok(());
        }

        let previous_date = self.target_doses[index - 1].administration_date();
        let current_date = self.target_doses[index].administration_date();
        let rule_dose_number = self.target_doses[index].dose_number().saturating_sub(1).max(1);

        let rule = self.series_rules.dose_rule(rule_dose_number).ok_or_else(|| {
            EngineError::inconsistent_configuration(format!(
                "系列 {} 缺少剂次 {} 的规则",
                self.series_name(),
                rule_dose_number
            ))
        })?;
        let Some(minimum_interval) = rule.absolute_minimum_interval else {
            debug!(dose_number = rule_dose_number, "未配置最小间隔");
            return Ok(());
        };

        let same_day = TimePeriod::days_elapsed(previous_date, current_date) == 0;
        if minimum_interval.compare_elapsed(previous_date, current_date) == Ordering::Less && !same_day {
            self.target_doses[index]
                .add_evaluation_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumInterval);
        }
        Ok(())
    }

    /// 疫苗是否为该剂次允许的疫苗
    pub fn evaluate_vaccine_permitted_and_record_reason(&mut self, unique_id: Uuid) -> EngineResult<()> {
        let index = self.dose_index(unique_id)?;
        let dose = &self.target_doses[index];
        let Some(rule) = self.series_rules.dose_rule(dose.dose_number()) else {
            return Ok(());
        };
        let permitted = rule.is_vaccine_permitted(&dose.administered_vaccine().cds_concept)
            || rule.is_vaccine_permitted(&dose.vaccine_component().cds_concept);
        if !permitted {
            self.target_doses[index]
                .add_evaluation_reason(ReasonKind::Invalid, EvaluationReason::VaccineNotAllowedForThisDose);
        }
        Ok(())
    }

    /// 季节性系列: 接种日期须在目标季节 (含非接种季) 内
    pub fn evaluate_season_and_record_reason(&mut self, unique_id: Uuid) -> EngineResult<()> {
        let index = self.dose_index(unique_id)?;
        let outside = self
            .target_season
            .as_ref()
            .is_some_and(|s| !s.date_is_applicable_to_season(self.target_doses[index].administration_date()));
        if outside {
            self.target_doses[index].add_evaluation_reason(ReasonKind::Invalid, EvaluationReason::OutsideSeason);
        }
        Ok(())
    }

    /// 评估单个剂次并确定状态
    ///
    /// # 流程
    /// 1. 确定剂次编号
    /// 2. 年龄/间隔/疫苗/季节检查
    /// 3. 有无效原因 -> INVALID; 仅有接受原因 -> ACCEPTED; 否则 VALID 并更新计数
    ///
    /// # 返回
    /// - Err(ImproperUsage): 存在更早的未评估剂次
    #[instrument(skip(self), fields(series_name = %self.series_name()))]
    pub fn evaluate_target_dose(&mut self, birth_date: NaiveDate, unique_id: Uuid) -> EngineResult<DoseStatus> {
        if !self.are_no_earlier_administered_shots_not_evaluated(unique_id)? {
            return Err(EngineError::improper_usage("存在更早的未评估剂次"));
        }

        let dose_number = self.determine_dose_number_in_series_for(unique_id)?;
        let index = self.dose_index(unique_id)?;
        self.target_doses[index].set_dose_number(dose_number);

        self.evaluate_minimum_age_and_record_reason(birth_date, unique_id)?;
        self.evaluate_minimum_interval_and_record_reason(unique_id)?;
        self.evaluate_vaccine_permitted_and_record_reason(unique_id)?;
        self.evaluate_season_and_record_reason(unique_id)?;

        let dose = &self.target_doses[index];
        let status = if !dose.reasons(ReasonKind::Invalid).is_empty() {
            DoseStatus::Invalid
        } else if !dose.reasons(ReasonKind::Accepted).is_empty() {
            DoseStatus::Accepted
        } else {
            DoseStatus::Valid
        };
        self.target_doses[index].set_status(status);

        if status == DoseStatus::Valid {
            let count = self.update_dose_validity_count_and_return_actual_dose_count(unique_id)?;
            debug!(dose_number, count, "剂次有效");
        }

        info!(
            dose_id = %self.target_doses[index].dose_id(),
            dose_number,
            status = ?status,
            "剂次评估完成"
        );
        Ok(status)
    }
}
