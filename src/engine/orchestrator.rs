// ==========================================
// 免疫接种预测引擎 - 预测编排器
// ==========================================
// 用途: 对一个患者的接种史按计划中的系列逐一评估并生成推荐
// 流程 (每个系列):
// 1) 构造目标系列 (季节性系列选定目标季节)
// 2) 记录疾病免疫
// 3) 回放接种史: 加入剂次 -> 按日期顺序评估
// 4) 六轮候选推荐 -> 汇总 -> 按评估日期调整
// ==========================================

use crate::domain::immunity::DiseaseImmunity;
use crate::domain::rules::SeriesRules;
use crate::domain::season::Season;
use crate::domain::target_dose::{ReasonKind, TargetDose};
use crate::domain::types::{DoseStatus, RecommendationStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::schedule::Schedule;
use crate::engine::target_series::TargetSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// 输入
// ==========================================

/// 一条接种记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministeredDose {
    pub dose_id: String,
    pub vaccine_code: String, // 疫苗概念编码
    pub administration_date: NaiveDate,
}

/// 预测请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub birth_date: NaiveDate,

    /// 评估日期 (未给出时使用当天)
    #[serde(default)]
    pub evaluation_date: Option<NaiveDate>,

    /// 限定疫苗组; 为空时评估计划中的全部系列
    #[serde(default)]
    pub vaccine_groups: Vec<String>,

    /// 只评估与接种史有交集的疫苗组
    #[serde(default)]
    pub history_only: bool,

    #[serde(default)]
    pub doses: Vec<AdministeredDose>,

    #[serde(default)]
    pub immunities: Vec<DiseaseImmunity>,
}

// ==========================================
// 输出
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoseEvaluation {
    pub dose_id: String,
    pub vaccine_code: String,
    pub administration_date: NaiveDate,
    pub administered_shot_number: u32,
    pub dose_number: u32,
    pub status: DoseStatus,
    pub reasons: Vec<String>,
}

impl DoseEvaluation {
    fn from_target_dose(dose: &TargetDose) -> Self {
        let kind = match dose.status() {
            DoseStatus::Invalid => ReasonKind::Invalid,
            DoseStatus::Accepted => ReasonKind::Accepted,
            _ => ReasonKind::Valid,
        };
        Self {
            dose_id: dose.dose_id().to_string(),
            vaccine_code: dose.administered_vaccine().cds_concept.clone(),
            administration_date: dose.administration_date(),
            administered_shot_number: dose.administered_shot_number(),
            dose_number: dose.dose_number(),
            status: dose.status(),
            reasons: dose.reasons(kind).iter().cloned().collect(),
        }
    }
}

/// 系列的最终推荐
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastRecommendation {
    pub status: RecommendationStatus,
    pub recommendation_date: Option<NaiveDate>,
    pub earliest_date: Option<NaiveDate>,
    pub latest_recommendation_date: Option<NaiveDate>, // 逾期前最后一天
    pub reasons: Vec<String>,
    pub recommended_vaccines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesForecast {
    pub series_name: String,
    pub vaccine_group: String,
    pub season: Option<String>,
    pub series_complete: bool,
    pub effective_number_of_doses: u32,
    pub doses: Vec<DoseEvaluation>,
    pub recommendation: ForecastRecommendation,
}

impl SeriesForecast {
    /// 从已完成预测的目标系列生成输出
    pub fn from_target_series(series: &TargetSeries) -> Self {
        let mut reasons: Vec<String> = Vec::new();
        let mut recommended_vaccines: Vec<String> = Vec::new();
        for recommendation in series.final_recommendations() {
            if let Some(reason) = &recommendation.recommendation_reason {
                if !reasons.contains(reason) {
                    reasons.push(reason.clone());
                }
            }
            if let Some(vaccine) = &recommendation.recommended_vaccine {
                if !recommended_vaccines.contains(&vaccine.cds_concept) {
                    recommended_vaccines.push(vaccine.cds_concept.clone());
                }
            }
        }

        Self {
            series_name: series.series_name().to_string(),
            vaccine_group: series.vaccine_group().to_string(),
            season: series.target_season().map(|s| s.name.clone()),
            series_complete: series.is_series_complete(),
            effective_number_of_doses: series.effective_number_of_doses_in_series(),
            doses: series
                .target_doses()
                .iter()
                .map(DoseEvaluation::from_target_dose)
                .collect(),
            recommendation: ForecastRecommendation {
                status: series.recommendation_status(),
                recommendation_date: series.final_recommendation_date(),
                earliest_date: series.final_earliest_date(),
                latest_recommendation_date: series.final_latest_recommendation_date(),
                reasons,
                recommended_vaccines,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastResult {
    pub schedule_id: String,
    pub evaluation_date: NaiveDate,
    pub forecasts: Vec<SeriesForecast>,
}

impl ForecastResult {
    pub fn forecast_for(&self, vaccine_group: &str, series_name: &str) -> Option<&SeriesForecast> {
        self.forecasts.iter().find(|f| {
            f.vaccine_group == vaccine_group && f.series_name.eq_ignore_ascii_case(series_name)
        })
    }
}

// ==========================================
// ForecastOrchestrator - 预测编排器
// ==========================================

pub struct ForecastOrchestrator {
    schedule: Arc<Schedule>,
}

impl ForecastOrchestrator {
    pub fn new(schedule: Arc<Schedule>) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// 执行完整预测
    ///
    /// # 参数
    /// - request: 患者出生日期、接种史、免疫记录
    ///
    /// # 返回
    /// - Err(ImproperUsage): 出生日期晚于评估日期, 或接种记录引用了未知疫苗
    /// - Err(InconsistentConfiguration): 系列规则缺失剂次规则
    #[instrument(skip(self, request), fields(
        schedule_id = %self.schedule.schedule_id(),
        doses = request.doses.len()
    ))]
    pub fn forecast(&self, request: &ForecastRequest) -> EngineResult<ForecastResult> {
        let evaluation_date = request
            .evaluation_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        if request.birth_date > evaluation_date {
            return Err(EngineError::improper_usage(format!(
                "出生日期 {} 晚于评估日期 {}",
                request.birth_date, evaluation_date
            )));
        }

        // 先校验疫苗编码, 避免部分系列已评估后才失败
        for dose in &request.doses {
            if self.schedule.vaccine_by_concept(&dose.vaccine_code).is_none() {
                return Err(EngineError::improper_usage(format!(
                    "剂次 {} 引用了未知疫苗 {}",
                    dose.dose_id, dose.vaccine_code
                )));
            }
        }

        let candidates = self.select_series(request);
        info!(
            evaluation_date = %evaluation_date,
            candidate_series = candidates.len(),
            "开始预测"
        );

        let mut forecasts = Vec::with_capacity(candidates.len());
        for rules in candidates {
            let Some(series) = self.forecast_series(rules, request, evaluation_date)? else {
                continue;
            };
            forecasts.push(SeriesForecast::from_target_series(&series));
        }

        info!(forecasts = forecasts.len(), "预测完成");
        Ok(ForecastResult {
            schedule_id: self.schedule.schedule_id().to_string(),
            evaluation_date,
            forecasts,
        })
    }

    /// 待评估系列 (按疫苗组优先级)
    fn select_series(&self, request: &ForecastRequest) -> Vec<Arc<SeriesRules>> {
        let mut series = if request.history_only {
            let diseases: BTreeSet<String> = request
                .doses
                .iter()
                .filter_map(|d| self.schedule.vaccine_by_concept(&d.vaccine_code))
                .flat_map(|v| v.diseases_targeted.iter().cloned())
                .chain(request.immunities.iter().map(|i| i.disease.clone()))
                .collect();
            self.schedule.candidate_series(&diseases)
        } else {
            self.schedule.all_series()
        };

        if !request.vaccine_groups.is_empty() {
            series.retain(|s| request.vaccine_groups.contains(&s.vaccine_group));
        }
        series
    }

    /// 评估单个系列
    ///
    /// # 返回
    /// - Ok(None): 季节性系列在评估日期前后没有可用季节
    pub fn forecast_series(
        &self,
        rules: Arc<SeriesRules>,
        request: &ForecastRequest,
        evaluation_date: NaiveDate,
    ) -> EngineResult<Option<TargetSeries>> {
        let mut series = if rules.seasons.is_empty() {
            TargetSeries::new(rules, self.schedule.clone())?
        } else {
            let Some(season) = select_target_season(&rules.seasons, evaluation_date) else {
                debug!(series_name = %rules.series_name, "评估日期无可用季节, 跳过系列");
                return Ok(None);
            };
            TargetSeries::with_season(rules, self.schedule.clone(), season)?
        };

        for immunity in &request.immunities {
            series.mark_immunity_to_specified_disease(immunity)?;
        }

        self.replay_history(&mut series, request)?;
        Self::evaluate_history(&mut series, request.birth_date)?;
        Self::generate_recommendations(&mut series, request.birth_date, evaluation_date)?;
        Ok(Some(series))
    }

    /// 将接种史中与本系列相关的剂次加入系列
    fn replay_history(&self, series: &mut TargetSeries, request: &ForecastRequest) -> EngineResult<()> {
        for administered in &request.doses {
            let vaccine = self
                .schedule
                .vaccine_by_concept(&administered.vaccine_code)
                .ok_or_else(|| EngineError::not_found("Vaccine", &administered.vaccine_code))?;
            let Some(component) = vaccine.component_targeting(series.diseases_supported_by_series()) else {
                continue;
            };

            let dose = TargetDose::new(
                &administered.dose_id,
                vaccine.clone(),
                component,
                administered.administration_date,
            );
            if !series.add_target_dose(dose)? {
                debug!(
                    dose_id = %administered.dose_id,
                    series_name = %series.series_name(),
                    "剂次未加入系列"
                );
            }
        }
        Ok(())
    }

    /// 按接种序号依次评估
    fn evaluate_history(series: &mut TargetSeries, birth_date: NaiveDate) -> EngineResult<()> {
        let ids: Vec<_> = series.target_doses().iter().map(|d| d.unique_id()).collect();
        for unique_id in ids {
            series.evaluate_target_dose(birth_date, unique_id)?;
        }
        Ok(())
    }

    fn generate_recommendations(
        series: &mut TargetSeries,
        birth_date: NaiveDate,
        evaluation_date: NaiveDate,
    ) -> EngineResult<()> {
        let evaluation = Some(evaluation_date);
        series.set_recommendation_status(RecommendationStatus::ForecastingInProgress);

        series.recommend_next_shot_based_on_earliest_age_rule(birth_date, evaluation)?;
        series.recommend_next_shot_based_on_earliest_interval_rule(evaluation)?;
        series.recommend_next_shot_based_on_earliest_recommended_age_rule(birth_date, evaluation)?;
        series.recommend_next_shot_based_on_earliest_recommended_interval_rule(evaluation)?;
        series.recommend_next_shot_based_on_latest_recommended_age_rule(birth_date, evaluation)?;
        series.recommend_next_shot_based_on_latest_recommended_interval_rule(evaluation)?;

        series.finalize_recommendations_for_forecasting();
        series.adjust_recommendation_status_by_eval_time(evaluation_date);

        if series.recommendation_status() == RecommendationStatus::ForecastingInProgress {
            warn!(series_name = %series.series_name(), "汇总后仍为进行中状态");
        }
        Ok(())
    }
}

/// 选择目标季节: 包含评估日期的季节优先, 否则取最近的未来季节
fn select_target_season(seasons: &[Season], evaluation_date: NaiveDate) -> Option<Season> {
    let specified = || seasons.iter().filter(|s| s.is_fully_specified() && !s.is_default_season());

    if let Some(current) = specified().find(|s| s.date_is_applicable_to_season(evaluation_date)) {
        return Some(current.clone());
    }
    specified()
        .filter(|s| s.start_date.is_some_and(|start| start > evaluation_date))
        .min_by_key(|s| s.start_date)
        .cloned()
}
