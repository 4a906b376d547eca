use super::core::TargetSeries;
use crate::domain::recommendation::Recommendation;
use crate::domain::types::{RecommendationReason, RecommendationStatus, RecommendationType};
use crate::domain::vaccine::Vaccine;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};

// ==========================================
// 推荐生成与汇总
// ==========================================
// 候选桶: 最早 / 推荐(年龄, 间隔) / 逾期前(年龄, 间隔) / 自定义
// 汇总优先级: NOT_RECOMMENDED > CONDITIONALLY_RECOMMENDED > RECOMMENDED_IN_FUTURE > RECOMMENDED
// 最终日期取全部候选中最晚的日期
// 日期约束: 最早 <= 推荐 <= 逾期前
// ==========================================

/// 候选推荐的计算依据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationBasis {
    Age,      // 出生日期 + 年龄
    Interval, // 上一剂日期 + 间隔
}

/// 待汇总的候选推荐
#[derive(Debug, Clone, Default)]
pub(super) struct InterimRecommendations {
    pub(super) earliest: Vec<Recommendation>,
    pub(super) earliest_recommended_age: Vec<Recommendation>,
    pub(super) earliest_recommended_interval: Vec<Recommendation>,
    pub(super) latest_recommended_age: Vec<Recommendation>,
    pub(super) latest_recommended_interval: Vec<Recommendation>,
    pub(super) custom: Vec<Recommendation>,
}

impl InterimRecommendations {
    fn bucket(&self, recommendation_type: RecommendationType, basis: RecommendationBasis) -> &[Recommendation] {
        match (recommendation_type, basis) {
            (RecommendationType::Earliest, _) => &self.earliest,
            (RecommendationType::EarliestRecommended, RecommendationBasis::Age) => &self.earliest_recommended_age,
            (RecommendationType::EarliestRecommended, RecommendationBasis::Interval) => {
                &self.earliest_recommended_interval
            }
            (RecommendationType::LatestRecommended, RecommendationBasis::Age) => &self.latest_recommended_age,
            (RecommendationType::LatestRecommended, RecommendationBasis::Interval) => &self.latest_recommended_interval,
        }
    }

    fn bucket_mut(
        &mut self,
        recommendation_type: RecommendationType,
        basis: RecommendationBasis,
    ) -> &mut Vec<Recommendation> {
        match (recommendation_type, basis) {
            (RecommendationType::Earliest, _) => &mut self.earliest,
            (RecommendationType::EarliestRecommended, RecommendationBasis::Age) => &mut self.earliest_recommended_age,
            (RecommendationType::EarliestRecommended, RecommendationBasis::Interval) => {
                &mut self.earliest_recommended_interval
            }
            (RecommendationType::LatestRecommended, RecommendationBasis::Age) => &mut self.latest_recommended_age,
            (RecommendationType::LatestRecommended, RecommendationBasis::Interval) => {
                &mut self.latest_recommended_interval
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.earliest.is_empty()
            && self.earliest_recommended_age.is_empty()
            && self.earliest_recommended_interval.is_empty()
            && self.latest_recommended_age.is_empty()
            && self.latest_recommended_interval.is_empty()
            && self.custom.is_empty()
    }
}

/// 按状态记录通用原因, 按内容去重后加入候选桶
fn populate_with_generic_reason(
    bucket: &mut Vec<Recommendation>,
    mut recommendation: Recommendation,
    status: RecommendationStatus,
) {
    if status.is_standard() {
        recommendation.recommendation_status = status;
        if recommendation.recommendation_reason.is_none() {
            if let Some(reason) = status.generic_reason() {
                recommendation.recommendation_reason = Some(reason.cds_list_item_name().to_string());
            }
        }
    }
    if !bucket.contains(&recommendation) {
        bucket.push(recommendation);
    }
}

fn latest_date_of(recommendations: &[Recommendation]) -> Option<NaiveDate> {
    recommendations.iter().filter_map(|r| r.recommendation_date).max()
}

fn status_relative_to(evaluation_date: NaiveDate, date: NaiveDate) -> RecommendationStatus {
    if evaluation_date < date {
        RecommendationStatus::RecommendedInFuture
    } else {
        RecommendationStatus::Recommended
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl TargetSeries {
    // ==========================================
    // 候选推荐计算
    // ==========================================

    pub fn recommend_next_shot_based_on_earliest_age_rule(
        &mut self,
        birth_date: NaiveDate,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_age_rule(birth_date, evaluation_date, RecommendationType::Earliest)
    }

    pub fn recommend_next_shot_based_on_earliest_interval_rule(
        &mut self,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_interval_rule(evaluation_date, RecommendationType::Earliest)
    }

    pub fn recommend_next_shot_based_on_earliest_recommended_age_rule(
        &mut self,
        birth_date: NaiveDate,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_age_rule(
            birth_date,
            evaluation_date,
            RecommendationType::EarliestRecommended,
        )
    }

    pub fn recommend_next_shot_based_on_earliest_recommended_interval_rule(
        &mut self,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_interval_rule(evaluation_date, RecommendationType::EarliestRecommended)
    }

    pub fn recommend_next_shot_based_on_latest_recommended_age_rule(
        &mut self,
        birth_date: NaiveDate,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_age_rule(birth_date, evaluation_date, RecommendationType::LatestRecommended)
    }

    pub fn recommend_next_shot_based_on_latest_recommended_interval_rule(
        &mut self,
        evaluation_date: Option<NaiveDate>,
    ) -> EngineResult<()> {
        self.recommend_next_shot_based_on_interval_rule(evaluation_date, RecommendationType::LatestRecommended)
    }

    /// 系列已完成时的处理; 返回 true 表示本轮计算到此结束
    fn handle_completed_series(&mut self, recommendation_type: RecommendationType, basis: RecommendationBasis) -> bool {
        if !self.is_series_complete() {
            return false;
        }
        if self.target_season_exists() {
            // 季节性系列的完成按季节单独判断
            return true;
        }
        if !self.series_rules.recurring_doses_after_series_complete {
            let recommendation = Recommendation::new(self.target_series_identifier)
                .with_status(RecommendationStatus::NotRecommended)
                .with_reason(RecommendationReason::Complete);
            self.interim.bucket_mut(recommendation_type, basis).push(recommendation);
        }
        true
    }

    /// 按年龄规则计算候选推荐
    ///
    /// # 规则
    /// - 日期 = 出生日期 + 年龄; 季节性系列不早于季节开始
    /// - LATEST_RECOMMENDED 取前一天 (逾期前最后一天)
    /// - 剂次规则缺失: 人工设置过完成状态或 0 剂系列时跳过, 否则为配置错误
    #[instrument(skip(self), fields(series_name = %self.series_name()))]
    pub fn recommend_next_shot_based_on_age_rule(
        &mut self,
        birth_date: NaiveDate,
        evaluation_date: Option<NaiveDate>,
        recommendation_type: RecommendationType,
    ) -> EngineResult<()> {
        let basis = RecommendationBasis::Age;
        if self.handle_completed_series(recommendation_type, basis) {
            return Ok(());
        }

        let dose_number = self
            .dose_number_to_recommend_override
            .unwrap_or_else(|| self.effective_number_of_doses_in_series() + 1);
        let Some(rule) = self.series_rules.dose_rule(dose_number) else {
            if self.is_series_complete_manually_set() || self.series_rules.number_of_doses_in_series == 0 {
                return Ok(());
            }
            return Err(EngineError::inconsistent_configuration(format!(
                "系列 {} 缺少剂次 {} 的规则",
                self.series_name(),
                dose_number
            )));
        };
        let Some(age) = rule.age_for(recommendation_type) else {
            if recommendation_type == RecommendationType::EarliestRecommended {
                warn!(dose_number, "未配置推荐年龄");
            }
            return Ok(());
        };

        let mut age_date = age.add_to(birth_date).ok_or_else(|| {
            EngineError::Internal(format!("年龄日期溢出: {} + {}", birth_date, age))
        })?;
        if let Some(season_start) = self.season_start_date() {
            age_date = age_date.max(season_start);
        }

        let evaluation_date = evaluation_date.unwrap_or_else(today);
        let date = match recommendation_type {
            RecommendationType::LatestRecommended => age_date - Duration::days(1),
            _ => age_date,
        };
        let recommendation = Recommendation::new(self.target_series_identifier).with_date(date);
        populate_with_generic_reason(
            self.interim.bucket_mut(recommendation_type, basis),
            recommendation,
            status_relative_to(evaluation_date, date),
        );
        debug!(dose_number, date = %date, ?recommendation_type, "年龄候选推荐");
        Ok(())
    }

    /// 按间隔规则计算候选推荐
    ///
    /// # 规则
    /// - 无剂次时不计算
    /// - 日期 = 最后一剂日期 + 上一剂次规则的间隔; 间隔为 0 时不计算
    /// - LATEST_RECOMMENDED 取前一天
    #[instrument(skip(self), fields(series_name = %self.series_name()))]
    pub fn recommend_next_shot_based_on_interval_rule(
        &mut self,
        evaluation_date: Option<NaiveDate>,
        recommendation_type: RecommendationType,
    ) -> EngineResult<()> {
        let basis = RecommendationBasis::Interval;
        let Some(last_dose) = self.target_doses.last() else {
            return Ok(());
        };
        let last_date = last_dose.administration_date();
        let last_unique_id = last_dose.unique_id();
        if !self.target_season_exists() && last_dose.dose_number() > self.series_rules.number_of_doses_in_series {
            return Ok(());
        }

        let rule_dose_number = match self.dose_number_to_recommend_override {
            Some(dose_number) => dose_number.saturating_sub(1),
            None => {
                if self.handle_completed_series(recommendation_type, basis) {
                    return Ok(());
                }
                self.determine_dose_number_in_series_for(last_unique_id)?.saturating_sub(1)
            }
        }
        .max(1);

        let Some(rule) = self.series_rules.dose_rule(rule_dose_number) else {
            if self.is_series_complete_manually_set() {
                return Ok(());
            }
            return Err(EngineError::inconsistent_configuration(format!(
                "系列 {} 缺少剂次 {} 的规则",
                self.series_name(),
                rule_dose_number
            )));
        };
        let Some(interval) = rule.interval_for(recommendation_type) else {
            if recommendation_type == RecommendationType::EarliestRecommended {
                warn!(dose_number = rule_dose_number, "未配置推荐间隔");
            }
            return Ok(());
        };
        if !interval.is_set() {
            return Ok(());
        }

        let interval_date = interval.add_to(last_date).ok_or_else(|| {
            EngineError::Internal(format!("间隔日期溢出: {} + {}", last_date, interval))
        })?;
        let evaluation_date = evaluation_date.unwrap_or_else(today);
        let date = match recommendation_type {
            RecommendationType::LatestRecommended => interval_date - Duration::days(1),
            _ => interval_date,
        };
        let recommendation = Recommendation::new(self.target_series_identifier).with_date(date);
        populate_with_generic_reason(
            self.interim.bucket_mut(recommendation_type, basis),
            recommendation,
            status_relative_to(evaluation_date, date),
        );
        debug!(dose_number = rule_dose_number, date = %date, ?recommendation_type, "间隔候选推荐");
        Ok(())
    }

    // ==========================================
    // 自定义候选推荐
    // ==========================================

    /// 添加自定义候选推荐
    ///
    /// # 规则
    /// - 给出标准状态 (推荐/条件推荐/不推荐/将来推荐) 时直接采用
    /// - 否则有日期时按评估日期判断 RECOMMENDED / RECOMMENDED_IN_FUTURE
    /// - 无日期且无标准状态时原样记录
    pub fn add_interim_recommendation_for_consideration(
        &mut self,
        recommendation_date: Option<NaiveDate>,
        vaccine: Option<Vaccine>,
        status: Option<RecommendationStatus>,
        evaluation_date: Option<NaiveDate>,
    ) {
        let mut recommendation = Recommendation::new(self.target_series_identifier);
        recommendation.recommendation_date = recommendation_date;
        recommendation.recommended_vaccine = vaccine;

        let status = match (status.filter(RecommendationStatus::is_standard), recommendation_date) {
            (Some(status), _) => status,
            (None, Some(date)) => status_relative_to(evaluation_date.unwrap_or_else(today), date),
            (None, None) => recommendation.recommendation_status,
        };
        populate_with_generic_reason(&mut self.interim.custom, recommendation, status);
    }

    /// 添加已构造的自定义候选推荐
    pub fn add_interim_recommendation(&mut self, recommendation: Recommendation, evaluation_date: Option<NaiveDate>) {
        let status = recommendation.recommendation_status;
        if status.is_standard() {
            populate_with_generic_reason(&mut self.interim.custom, recommendation, status);
        } else {
            self.add_interim_recommendation_for_consideration(
                recommendation.recommendation_date,
                recommendation.recommended_vaccine,
                None,
                evaluation_date,
            );
        }
    }

    pub fn interim_recommendations(
        &self,
        recommendation_type: RecommendationType,
        basis: RecommendationBasis,
    ) -> &[Recommendation] {
        self.interim.bucket(recommendation_type, basis)
    }

    pub fn interim_custom_recommendations(&self) -> &[Recommendation] {
        &self.interim.custom
    }

    // ==========================================
    // 汇总
    // ==========================================

    /// 汇总候选推荐, 确定最终状态/日期/推荐列表, 并清空候选桶
    ///
    /// # 规则
    /// - 无候选且无最终推荐: NOT_RECOMMENDED, 日期全部清空
    /// - 无候选但有上次状态: 恢复上次状态
    /// - 最早日期取 EARLIEST 桶中最晚日期, 只会向前调整
    /// - 逾期日期优先取年龄规则, 其次间隔规则, 且不早于最早/推荐日期
    #[instrument(skip(self), fields(series_name = %self.series_name()))]
    pub fn finalize_recommendations_for_forecasting(&mut self) {
        let mut candidates: Vec<Recommendation> = Vec::new();
        candidates.extend(self.interim.earliest.iter().cloned());
        candidates.extend(self.interim.earliest_recommended_age.iter().cloned());
        candidates.extend(self.interim.earliest_recommended_interval.iter().cloned());
        candidates.extend(self.interim.custom.iter().cloned());

        if candidates.is_empty() && self.final_recommendations.is_empty() {
            self.recommendation_status = RecommendationStatus::NotRecommended;
            self.final_recommendations.clear();
            self.set_final_recommendation_date(None);
        } else if candidates.is_empty() && self.recommendation_status_prior.is_some() {
            if let Some(prior) = self.recommendation_status_prior {
                self.recommendation_status = prior;
            }
            return;
        } else {
            self.apply_candidates(&candidates);
        }

        self.recommendation_status_prior = Some(self.recommendation_status);
        self.interim = InterimRecommendations::default();
        info!(
            status = %self.recommendation_status,
            date = ?self.final_recommendation_date,
            earliest = ?self.final_earliest_date,
            latest = ?self.final_latest_recommendation_date,
            "推荐汇总完成"
        );
    }

    fn apply_candidates(&mut self, candidates: &[Recommendation]) {
        let mut final_status: Option<RecommendationStatus> = None;
        let mut final_date = self.final_recommendation_date;
        let mut statuses: Vec<RecommendationStatus> = Vec::new();

        for candidate in candidates {
            if candidate.recommendation_status == RecommendationStatus::NotRecommended {
                final_status = Some(RecommendationStatus::NotRecommended);
                final_date = None;
                break;
            }
            if let Some(date) = candidate.recommendation_date {
                final_date = Some(final_date.map_or(date, |current| current.max(date)));
            }
            statuses.push(candidate.recommendation_status);
        }

        let final_status = final_status.unwrap_or_else(|| {
            if statuses.contains(&RecommendationStatus::ConditionallyRecommended) {
                RecommendationStatus::ConditionallyRecommended
            } else if statuses.contains(&RecommendationStatus::RecommendedInFuture) {
                RecommendationStatus::RecommendedInFuture
            } else {
                RecommendationStatus::Recommended
            }
        });

        self.set_final_recommendation_date(final_date);
        self.recommendation_status = final_status;

        // 无日期的记录性推荐
        let undated_others: Vec<Recommendation> = candidates
            .iter()
            .filter(|r| {
                matches!(
                    r.recommendation_status,
                    RecommendationStatus::ForecastingComplete
                        | RecommendationStatus::ForecastingInProgress
                        | RecommendationStatus::NotForecasted
                ) && r.recommendation_date.is_none()
            })
            .cloned()
            .collect();

        let included: &[RecommendationStatus] = match final_status {
            RecommendationStatus::ConditionallyRecommended => &[
                RecommendationStatus::ConditionallyRecommended,
                RecommendationStatus::RecommendedInFuture,
                RecommendationStatus::Recommended,
            ],
            RecommendationStatus::RecommendedInFuture => &[
                RecommendationStatus::RecommendedInFuture,
                RecommendationStatus::Recommended,
            ],
            RecommendationStatus::Recommended => &[RecommendationStatus::Recommended],
            _ => &[RecommendationStatus::NotRecommended],
        };
        self.final_recommendations = candidates
            .iter()
            .filter(|r| included.contains(&r.recommendation_status))
            .cloned()
            .collect();
        if final_status != RecommendationStatus::NotRecommended {
            self.final_recommendations.extend(undated_others);
        }

        if final_status == RecommendationStatus::NotRecommended {
            self.final_earliest_date = None;
            self.final_latest_recommendation_date = None;
            return;
        }

        let latest_earliest = latest_date_of(&self.interim.earliest);
        match (self.final_earliest_date, latest_earliest) {
            (None, _) => self.set_final_earliest_date(latest_earliest),
            (Some(previous), Some(candidate)) if candidate < previous => {
                self.set_final_earliest_date(Some(candidate))
            }
            _ => {}
        }

        let mut unadjusted_latest = if !self.interim.latest_recommended_age.is_empty() {
            latest_date_of(&self.interim.latest_recommended_age)
        } else {
            latest_date_of(&self.interim.latest_recommended_interval)
        };
        if let Some(previous) = self.final_latest_recommendation_date {
            unadjusted_latest = Some(unadjusted_latest.map_or(previous, |date| date.max(previous)));
        }
        if let Some(latest) = unadjusted_latest {
            let floor = self
                .final_earliest_date
                .into_iter()
                .chain(self.final_recommendation_date)
                .max();
            let latest = floor.map_or(latest, |floor| latest.max(floor));
            self.set_final_latest_recommendation_date(Some(latest));
        }
    }

    /// 按评估日期重新判定 RECOMMENDED / RECOMMENDED_IN_FUTURE
    ///
    /// 状态变化时, 原因为旧状态通用原因的最终推荐同步改为新状态
    pub fn adjust_recommendation_status_by_eval_time(&mut self, evaluation_date: NaiveDate) {
        let Some(final_date) = self.final_recommendation_date else {
            return;
        };
        let prior = self.recommendation_status;
        if !matches!(
            prior,
            RecommendationStatus::Recommended | RecommendationStatus::RecommendedInFuture
        ) {
            return;
        }

        let current = status_relative_to(evaluation_date, final_date);
        self.recommendation_status = current;
        if prior == current {
            return;
        }

        let (Some(prior_reason), Some(current_reason)) = (prior.generic_reason(), current.generic_reason()) else {
            return;
        };
        for recommendation in &mut self.final_recommendations {
            if recommendation.recommendation_reason.as_deref() == Some(prior_reason.cds_list_item_name()) {
                recommendation.recommendation_reason = Some(current_reason.cds_list_item_name().to_string());
                recommendation.recommendation_status = current;
            }
        }
        debug!(prior = %prior, current = %current, "按评估日期调整推荐状态");
    }

    /// 清空最终推荐 (疫苗/日期/列表)
    pub fn clear_recommendations(&mut self) {
        self.recommendation_vaccine = None;
        self.final_earliest_date = None;
        self.final_recommendation_date = None;
        self.final_latest_recommendation_date = None;
        self.final_recommendations.clear();
    }

    // ==========================================
    // 最终日期 (setter 维持 最早 <= 推荐 <= 逾期前)
    // ==========================================

    /// 设置推荐日期; None 时同时清空最早与逾期日期
    pub fn set_final_recommendation_date(&mut self, date: Option<NaiveDate>) {
        self.final_recommendation_date = date;
        let Some(date) = date else {
            self.final_earliest_date = None;
            self.final_latest_recommendation_date = None;
            return;
        };
        if self.final_earliest_date.is_some_and(|earliest| date < earliest) {
            self.final_earliest_date = Some(date);
        }
        if self.final_latest_recommendation_date.is_some_and(|latest| date > latest) {
            self.final_latest_recommendation_date = Some(date);
        }
    }

    /// 设置最早日期; 推荐与逾期日期早于它时一并推后
    pub fn set_final_earliest_date(&mut self, date: Option<NaiveDate>) {
        self.final_earliest_date = date;
        let Some(date) = date else {
            return;
        };
        if self.final_recommendation_date.is_some_and(|recommended| date > recommended) {
            self.final_recommendation_date = Some(date);
        }
        if self.final_latest_recommendation_date.is_some_and(|latest| date > latest) {
            self.final_latest_recommendation_date = Some(date);
        }
    }

    /// 设置逾期前日期; 推荐与最早日期晚于它时一并提前
    pub fn set_final_latest_recommendation_date(&mut self, date: Option<NaiveDate>) {
        self.final_latest_recommendation_date = date;
        let Some(date) = date else {
            return;
        };
        if self.final_recommendation_date.is_some_and(|recommended| date < recommended) {
            self.final_recommendation_date = Some(date);
        }
        if self.final_earliest_date.is_some_and(|earliest| date < earliest) {
            self.final_earliest_date = Some(date);
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn recommendation_status(&self) -> RecommendationStatus {
        self.recommendation_status
    }

    pub fn set_recommendation_status(&mut self, status: RecommendationStatus) {
        self.recommendation_status = status;
    }

    pub fn final_recommendation_date(&self) -> Option<NaiveDate> {
        self.final_recommendation_date
    }

    pub fn final_earliest_date(&self) -> Option<NaiveDate> {
        self.final_earliest_date
    }

    pub fn final_latest_recommendation_date(&self) -> Option<NaiveDate> {
        self.final_latest_recommendation_date
    }

    pub fn final_recommendations(&self) -> &[Recommendation] {
        &self.final_recommendations
    }

    pub fn recommendation_vaccine(&self) -> Option<&Vaccine> {
        self.recommendation_vaccine.as_ref()
    }

    pub fn set_recommendation_vaccine(&mut self, vaccine: Option<Vaccine>) {
        self.recommendation_vaccine = vaccine;
    }

    /// 是否有待汇总的候选推荐
    pub fn has_interim_recommendations(&self) -> bool {
        !self.interim.is_empty()
    }
}
