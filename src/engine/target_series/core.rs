use super::forecast::InterimRecommendations;
use crate::domain::immunity::DiseaseImmunity;
use crate::domain::recommendation::Recommendation;
use crate::domain::rules::{DoseRule, SeriesRules};
use crate::domain::season::Season;
use crate::domain::target_dose::TargetDose;
use crate::domain::time_period::TimePeriod;
use crate::domain::types::{RecommendationStatus, RecommendationType};
use crate::domain::vaccine::Vaccine;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::schedule::Schedule;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

// ==========================================
// TargetSeries - 单系列评估上下文
// ==========================================
// 剂次按 (接种日期, 插入序号) 排序; 同日剂次不会合并
#[derive(Debug, Clone)]
pub struct TargetSeries {
    pub(super) target_series_identifier: Uuid,
    pub(super) schedule: Arc<Schedule>,
    pub(super) series_rules: Arc<SeriesRules>,
    pub(super) series_diseases: BTreeSet<String>,
    pub(super) target_season: Option<Season>,

    // ===== 剂次 =====
    pub(super) target_doses: Vec<TargetDose>,
    pub(super) next_insertion_sequence: u64,

    // ===== 人工覆写 (None = 未设置) =====
    pub(super) series_complete_override: Option<bool>,
    pub(super) series_complete_at_dose_override: u32,
    pub(super) dose_number_to_recommend_override: Option<u32>,
    pub(super) account_for_live_virus_intervals_override: Option<bool>,

    // ===== 按疾病的计数/跳剂/免疫 =====
    pub(super) interim_validity_count_by_disease: BTreeMap<String, u32>,
    pub(super) skip_doses_by_disease: BTreeMap<String, BTreeMap<u32, u32>>,
    pub(super) disease_immunity: BTreeMap<String, Option<NaiveDate>>,

    // ===== 推荐 =====
    pub(super) interim: InterimRecommendations,
    pub(super) recommendation_status: RecommendationStatus,
    pub(super) recommendation_status_prior: Option<RecommendationStatus>,
    pub(super) final_recommendation_date: Option<NaiveDate>,
    pub(super) final_earliest_date: Option<NaiveDate>,
    pub(super) final_latest_recommendation_date: Option<NaiveDate>,
    pub(super) final_recommendations: Vec<Recommendation>,
    pub(super) recommendation_vaccine: Option<Vaccine>,

    // ===== 其他 =====
    pub(super) series_rules_processed: Vec<String>,
    pub(super) selected_series: bool,
}

impl TargetSeries {
    /// 创建非季节性系列评估上下文
    ///
    /// # 参数
    /// - series_rules: 系列规则 (共享, 修改前复制)
    /// - schedule: 所属接种计划
    ///
    /// # 返回
    /// - Err(InconsistentConfiguration): 疫苗组未在计划中定义
    pub fn new(series_rules: Arc<SeriesRules>, schedule: Arc<Schedule>) -> EngineResult<Self> {
        let series_diseases = schedule
            .diseases_targeted_by_vaccine_group(&series_rules.vaccine_group)
            .cloned()
            .ok_or_else(|| {
                EngineError::inconsistent_configuration(format!(
                    "系列 {} 的疫苗组 {} 未定义疾病",
                    series_rules.series_name, series_rules.vaccine_group
                ))
            })?;

        let interim_validity_count_by_disease =
            series_diseases.iter().map(|d| (d.clone(), 0)).collect();
        let skip_doses_by_disease = series_diseases
            .iter()
            .map(|d| (d.clone(), BTreeMap::new()))
            .collect();

        Ok(Self {
            target_series_identifier: Uuid::new_v4(),
            schedule,
            series_rules,
            series_diseases,
            target_season: None,
            target_doses: Vec::new(),
            next_insertion_sequence: 0,
            series_complete_override: None,
            series_complete_at_dose_override: 0,
            dose_number_to_recommend_override: None,
            account_for_live_virus_intervals_override: None,
            interim_validity_count_by_disease,
            skip_doses_by_disease,
            disease_immunity: BTreeMap::new(),
            interim: InterimRecommendations::default(),
            recommendation_status: RecommendationStatus::NotForecasted,
            recommendation_status_prior: None,
            final_recommendation_date: None,
            final_earliest_date: None,
            final_latest_recommendation_date: None,
            final_recommendations: Vec::new(),
            recommendation_vaccine: None,
            series_rules_processed: Vec::new(),
            selected_series: false,
        })
    }

    /// 创建季节性系列评估上下文
    ///
    /// # 规则
    /// - 目标季节不能是默认季节
    /// - 系列规则中须有起止日期相同或不重叠的季节
    pub fn with_season(
        series_rules: Arc<SeriesRules>,
        schedule: Arc<Schedule>,
        target_season: Season,
    ) -> EngineResult<Self> {
        if target_season.is_default_season() || !target_season.is_fully_specified() {
            return Err(EngineError::improper_usage(
                "目标季节不能为默认季节, 且必须指定起止日期",
            ));
        }

        let applicable = series_rules.seasons.iter().any(|s| {
            s.has_equivalent_start_and_end_dates(&target_season) || !s.overlaps_with(&target_season)
        });
        if !applicable {
            warn!(
                series_name = %series_rules.series_name,
                season = %target_season.name,
                "目标季节与系列季节配置不一致"
            );
            return Err(EngineError::improper_usage(format!(
                "季节 {} 与系列 {} 的季节配置不一致",
                target_season.name, series_rules.series_name
            )));
        }

        let mut series = Self::new(series_rules, schedule)?;
        series.target_season = Some(target_season);
        Ok(series)
    }

    // ==========================================
    // 基本属性
    // ==========================================

    pub fn target_series_identifier(&self) -> Uuid {
        self.target_series_identifier
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn series_rules(&self) -> &SeriesRules {
        &self.series_rules
    }

    pub fn series_name(&self) -> &str {
        &self.series_rules.series_name
    }

    pub fn vaccine_group(&self) -> &str {
        &self.series_rules.vaccine_group
    }

    pub fn number_of_doses_in_series(&self) -> u32 {
        self.series_rules.number_of_doses_in_series
    }

    /// 本系列针对的疾病
    pub fn diseases_supported_by_series(&self) -> &BTreeSet<String> {
        &self.series_diseases
    }

    pub fn is_selected_series(&self) -> bool {
        self.selected_series
    }

    pub fn set_selected_series(&mut self, selected: bool) {
        self.selected_series = selected;
    }

    // ===== 季节 =====

    pub fn target_season(&self) -> Option<&Season> {
        self.target_season.as_ref()
    }

    pub fn target_season_exists(&self) -> bool {
        self.target_season.is_some()
    }

    pub fn season_start_date(&self) -> Option<NaiveDate> {
        self.target_season.as_ref().and_then(|s| s.start_date)
    }

    pub fn season_end_date(&self) -> Option<NaiveDate> {
        self.target_season.as_ref().and_then(|s| s.end_date)
    }

    pub fn off_season_start_date(&self) -> Option<NaiveDate> {
        self.target_season.as_ref().and_then(|s| s.off_season_start_date)
    }

    pub fn off_season_end_date(&self) -> Option<NaiveDate> {
        self.target_season.as_ref().and_then(|s| s.off_season_end_date)
    }

    // ==========================================
    // 剂次管理
    // ==========================================

    /// 添加剂次 (受目标季节限制)
    pub fn add_target_dose(&mut self, dose: TargetDose) -> EngineResult<bool> {
        self.add_target_dose_to_series(dose, false)
    }

    /// 添加剂次
    ///
    /// # 参数
    /// - dose: 剂次
    /// - override_season_restriction: true 时忽略目标季节窗口
    ///
    /// # 返回
    /// - Ok(true): 已添加, 接种序号已重排
    /// - Ok(false): 不在季节窗口内或已存在同一剂次
    pub fn add_target_dose_to_series(
        &mut self,
        mut dose: TargetDose,
        override_season_restriction: bool,
    ) -> EngineResult<bool> {
        if self.contains_target_dose(dose.unique_id()) {
            return Ok(false);
        }
        if let Some(season) = &self.target_season {
            if !override_season_restriction
                && !season.date_is_applicable_to_season(dose.administration_date())
            {
                debug!(
                    dose_id = %dose.dose_id(),
                    date = %dose.administration_date(),
                    season = %season.name,
                    "剂次不在目标季节内, 未加入系列"
                );
                return Ok(false);
            }
        }

        dose.insertion_sequence = self.next_insertion_sequence;
        self.next_insertion_sequence += 1;

        let key = (dose.administration_date(), dose.insertion_sequence);
        let position = self
            .target_doses
            .partition_point(|d| (d.administration_date(), d.insertion_sequence) < key);
        self.target_doses.insert(position, dose);
        self.renumber_administered_shots();

        // 未评估剂次按当前历史重新确定剂次编号
        for index in 0..self.target_doses.len() {
            if !self.target_doses[index].has_been_evaluated() {
                let dose_number = self.target_dose_number_at_index(index);
                self.target_doses[index].set_dose_number(dose_number);
            }
        }
        self.refresh_interim_validity_counts();
        Ok(true)
    }

    /// 移除剂次; 后续剂次的剂次编号依次前移
    pub fn remove_target_dose_from_series(&mut self, unique_id: Uuid) -> EngineResult<TargetDose> {
        let index = self.dose_index(unique_id)?;
        let removed = self.target_doses.remove(index);

        let mut dose_number_for_next = removed.dose_number();
        for dose in self.target_doses.iter_mut().skip(index) {
            let current = dose.dose_number();
            dose.set_dose_number(dose_number_for_next);
            dose_number_for_next = current;
        }
        self.renumber_administered_shots();
        self.refresh_interim_validity_counts();
        Ok(removed)
    }

    fn renumber_administered_shots(&mut self) {
        for (position, dose) in self.target_doses.iter_mut().enumerate() {
            dose.set_administered_shot_number(position as u32 + 1);
        }
    }

    pub(super) fn dose_index(&self, unique_id: Uuid) -> EngineResult<usize> {
        self.target_doses
            .iter()
            .position(|d| d.unique_id() == unique_id)
            .ok_or_else(|| EngineError::not_found("TargetDose", unique_id))
    }

    // ==========================================
    // 剂次查询
    // ==========================================

    /// 按日期升序的全部剂次
    pub fn target_doses(&self) -> &[TargetDose] {
        &self.target_doses
    }

    pub fn target_dose(&self, unique_id: Uuid) -> Option<&TargetDose> {
        self.target_doses.iter().find(|d| d.unique_id() == unique_id)
    }

    /// 可变访问 (状态/原因/剂次编号); 接种日期不可修改
    pub fn target_dose_mut(&mut self, unique_id: Uuid) -> Option<&mut TargetDose> {
        self.target_doses
            .iter_mut()
            .find(|d| d.unique_id() == unique_id)
    }

    pub fn contains_target_dose(&self, unique_id: Uuid) -> bool {
        self.target_doses.iter().any(|d| d.unique_id() == unique_id)
    }

    pub fn number_of_shots(&self) -> usize {
        self.target_doses.len()
    }

    pub fn last_shot(&self) -> Option<&TargetDose> {
        self.target_doses.last()
    }

    pub fn target_dose_by_administered_shot_number(&self, shot_number: u32) -> Option<&TargetDose> {
        self.target_doses
            .iter()
            .find(|d| d.administered_shot_number() == shot_number)
    }

    /// 指定剂次编号的首个有效(VALID/ACCEPTED)剂次
    pub fn valid_or_accepted_shot_by_dose_number(&self, dose_number: u32) -> Option<&TargetDose> {
        self.target_doses
            .iter()
            .find(|d| d.dose_number() == dose_number && d.is_valid())
    }

    /// VALID/ACCEPTED 剂次数 (不考虑跳剂与免疫)
    pub fn number_of_doses_administered_in_series(&self) -> u32 {
        self.count_counted_doses(|_| true)
    }

    /// 截至某日 (含) 的有效剂次数
    pub fn number_of_doses_administered_in_series_by_date(&self, date: NaiveDate) -> u32 {
        self.count_counted_doses(|d| d.administration_date() <= date)
    }

    fn count_counted_doses<F>(&self, filter: F) -> u32
    where
        F: Fn(&TargetDose) -> bool,
    {
        self.target_doses
            .iter()
            .filter(|d| d.is_valid() && filter(d))
            .count() as u32
    }

    /// 在此剂次之前的剂次是否都已评估
    pub fn are_no_earlier_administered_shots_not_evaluated(&self, unique_id: Uuid) -> EngineResult<bool> {
        let index = self.dose_index(unique_id)?;
        Ok(self.target_doses[..index]
            .iter()
            .all(|d| d.has_been_evaluated()))
    }

    // ==========================================
    // 剂次规则查询
    // ==========================================

    pub fn dose_rule_for_series_by_dose_number(&self, dose_number: u32) -> Option<&DoseRule> {
        self.series_rules.dose_rule(dose_number)
    }

    pub fn dose_rule_for_series_by_target_dose(&self, unique_id: Uuid) -> Option<&DoseRule> {
        let dose = self.target_dose(unique_id)?;
        self.series_rules.dose_rule(dose.dose_number())
    }

    /// 早于该剂次日期的最近一剂所对应的剂次规则
    pub fn dose_rule_of_shot_with_most_recent_date_prior_to(&self, unique_id: Uuid) -> Option<&DoseRule> {
        let date = self.target_dose(unique_id)?.administration_date();
        let prior = self
            .target_doses
            .iter()
            .rev()
            .find(|d| d.administration_date() < date)?;
        self.series_rules.dose_rule(prior.dose_number())
    }

    pub fn absolute_minimum_age_for_dose(&self, dose_number: u32) -> Option<TimePeriod> {
        self.series_rules.dose_rule(dose_number)?.absolute_minimum_age
    }

    pub fn absolute_minimum_interval_for_dose(&self, dose_number: u32) -> Option<TimePeriod> {
        self.series_rules.dose_rule(dose_number)?.absolute_minimum_interval
    }

    pub fn age_for_dose(&self, dose_number: u32, recommendation_type: RecommendationType) -> Option<TimePeriod> {
        self.series_rules.dose_rule(dose_number)?.age_for(recommendation_type)
    }

    pub fn interval_for_dose(&self, dose_number: u32, recommendation_type: RecommendationType) -> Option<TimePeriod> {
        self.series_rules.dose_rule(dose_number)?.interval_for(recommendation_type)
    }

    pub fn preferable_vaccines_for_dose(&self, dose_number: u32) -> Vec<&Vaccine> {
        self.resolve_vaccines(|r| r.preferable_vaccines.clone(), dose_number)
    }

    pub fn allowable_vaccines_for_dose(&self, dose_number: u32) -> Vec<&Vaccine> {
        self.resolve_vaccines(|r| r.allowable_vaccines.clone(), dose_number)
    }

    pub fn permitted_vaccines_for_dose(&self, dose_number: u32) -> Vec<&Vaccine> {
        self.resolve_vaccines(DoseRule::all_permitted_vaccines, dose_number)
    }

    fn resolve_vaccines<F>(&self, codes: F, dose_number: u32) -> Vec<&Vaccine>
    where
        F: Fn(&DoseRule) -> Vec<String>,
    {
        let Some(rule) = self.series_rules.dose_rule(dose_number) else {
            return Vec::new();
        };
        codes(rule)
            .iter()
            .filter_map(|code| self.schedule.vaccine_by_concept(code))
            .collect()
    }

    // ==========================================
    // 活病毒疫苗
    // ==========================================

    pub fn one_or_more_shots_administered_is_live_virus(&self) -> bool {
        self.target_doses
            .iter()
            .any(|d| d.administered_vaccine().live_virus || d.vaccine_component().live_virus)
    }

    /// 下一剂推荐疫苗是否为活病毒疫苗
    ///
    /// # 规则
    /// - 仅在推荐/将来推荐/条件推荐状态下判断, 其余状态返回 false
    /// - 下一剂无剂次规则时返回 false
    /// - 人工覆写优先于允许疫苗的活病毒标记
    pub fn is_recommended_vaccine_for_next_dose_live_virus(&self) -> bool {
        if !matches!(
            self.recommendation_status,
            RecommendationStatus::Recommended
                | RecommendationStatus::RecommendedInFuture
                | RecommendationStatus::ConditionallyRecommended
        ) {
            return false;
        }

        let next_dose = self.effective_number_of_doses_in_series() + 1;
        if self.series_rules.dose_rule(next_dose).is_none() {
            return false;
        }
        if let Some(value) = self.account_for_live_virus_intervals_override {
            return value;
        }
        self.permitted_vaccines_for_dose(next_dose)
            .iter()
            .any(|v| v.live_virus)
    }

    pub fn set_account_for_live_virus_intervals(&mut self, value: Option<bool>) {
        self.account_for_live_virus_intervals_override = value;
    }

    // ==========================================
    // 系列完成状态
    // ==========================================

    /// 系列是否已完成 (有效剂次数 >= 剂次总数)
    ///
    /// 人工覆写生效时不重新计算
    pub fn is_series_complete(&self) -> bool {
        if let Some(complete) = self.series_complete_override {
            return complete;
        }
        self.effective_number_of_doses_in_series() >= self.series_rules.number_of_doses_in_series
    }

    /// 系列完成时的剂次编号; 未完成返回 None
    pub fn dose_number_at_series_completion(&self) -> Option<u32> {
        if !self.is_series_complete() {
            return None;
        }
        if self.series_complete_override.is_some() {
            return Some(self.series_complete_at_dose_override);
        }
        Some(self.effective_number_of_doses_in_series().max(1))
    }

    /// 人工设置系列完成状态, 此后不再自动计算
    pub fn set_series_complete(&mut self, complete: bool) {
        self.series_complete_at_dose_override = if complete {
            self.effective_number_of_doses_in_series()
        } else {
            0
        };
        self.series_complete_override = Some(complete);
    }

    pub fn clear_series_complete_override(&mut self) {
        self.series_complete_override = None;
        self.series_complete_at_dose_override = 0;
    }

    pub fn is_series_complete_manually_set(&self) -> bool {
        self.series_complete_override.is_some()
    }

    // ===== 待推荐剂次编号 =====

    pub fn manually_set_dose_number_to_recommend(&self) -> Option<u32> {
        self.dose_number_to_recommend_override
    }

    pub fn set_manual_dose_number_to_recommend(&mut self, dose_number: u32) -> EngineResult<()> {
        if dose_number == 0 {
            return Err(EngineError::improper_usage("待推荐剂次编号必须从 1 开始"));
        }
        self.dose_number_to_recommend_override = Some(dose_number);
        Ok(())
    }

    pub fn clear_manual_dose_number_to_recommend(&mut self) {
        self.dose_number_to_recommend_override = None;
    }

    // ==========================================
    // 疾病免疫
    // ==========================================

    /// 记录疾病免疫
    ///
    /// # 返回
    /// - Ok(false): 本系列不针对该疾病, 未记录
    /// - Err(ImproperUsage): 疾病名为空
    pub fn mark_immunity_to_specified_disease(&mut self, immunity: &DiseaseImmunity) -> EngineResult<bool> {
        if immunity.disease.trim().is_empty() {
            return Err(EngineError::improper_usage("免疫记录缺少疾病"));
        }
        if !self.series_diseases.contains(&immunity.disease) {
            debug!(
                disease = %immunity.disease,
                series_name = %self.series_name(),
                "系列不针对该疾病, 忽略免疫记录"
            );
            return Ok(false);
        }
        self.disease_immunity
            .insert(immunity.disease.clone(), immunity.date_of_immunity);
        self.refresh_interim_validity_counts();
        Ok(true)
    }

    /// 某疾病截至指定日期是否已免疫 (未给出免疫日期视为始终免疫)
    pub fn is_immune_as_of(&self, disease: &str, date: NaiveDate) -> bool {
        match self.disease_immunity.get(disease) {
            Some(Some(immunity_date)) => *immunity_date <= date,
            Some(None) => true,
            None => false,
        }
    }

    pub fn disease_immunity_date(&self, disease: &str) -> Option<Option<NaiveDate>> {
        self.disease_immunity.get(disease).copied()
    }

    // ==========================================
    // 跳剂指令
    // ==========================================

    /// 对系列所有疾病添加跳剂指令
    pub fn add_skip_dose_entry_for_dose(&mut self, from_dose: u32, to_dose: u32) -> EngineResult<()> {
        let target_dose_number = self.determine_dose_number_in_series();
        let diseases: Vec<String> = self.series_diseases.iter().cloned().collect();
        for disease in diseases {
            self.add_skip_dose_entry(&disease, from_dose, to_dose, target_dose_number)?;
        }
        Ok(())
    }

    /// 对指定疾病添加跳剂指令 from_dose -> to_dose
    ///
    /// # 规则
    /// - 疾病须为本系列针对且计划中已定义的疾病
    /// - 1 <= from, to <= 剂次总数; from == to 时忽略
    /// - from 必须等于当前待接种剂次编号
    pub fn add_skip_dose_entry_for_specified_disease(
        &mut self,
        disease: &str,
        from_dose: u32,
        to_dose: u32,
    ) -> EngineResult<()> {
        let target_dose_number = self.determine_dose_number_in_series();
        self.add_skip_dose_entry(disease, from_dose, to_dose, target_dose_number)
    }

    fn add_skip_dose_entry(
        &mut self,
        disease: &str,
        from_dose: u32,
        to_dose: u32,
        target_dose_number: u32,
    ) -> EngineResult<()> {
        if !self.schedule.is_supported_disease(disease) || !self.series_diseases.contains(disease) {
            return Err(EngineError::improper_usage(format!(
                "系列 {} 不支持疾病 {}",
                self.series_name(),
                disease
            )));
        }
        let doses = self.series_rules.number_of_doses_in_series;
        if from_dose < 1 || from_dose > doses || to_dose < 1 || to_dose > doses {
            return Err(EngineError::improper_usage(format!(
                "跳剂范围越界: {} -> {} (剂次总数 {})",
                from_dose, to_dose, doses
            )));
        }
        if from_dose == to_dose {
            warn!(disease = %disease, dose = from_dose, "跳剂起止相同, 忽略");
            return Ok(());
        }
        if to_dose < from_dose {
            return Err(EngineError::improper_usage(format!(
                "跳剂目标早于起点: {} -> {}",
                from_dose, to_dose
            )));
        }
        if from_dose != target_dose_number {
            return Err(EngineError::improper_usage(format!(
                "跳剂起点 {} 与当前待接种剂次 {} 不一致",
                from_dose, target_dose_number
            )));
        }

        self.skip_doses_by_disease
            .entry(disease.to_string())
            .or_default()
            .insert(from_dose, to_dose);
        let count = self
            .interim_validity_count_by_disease
            .entry(disease.to_string())
            .or_insert(0);
        if *count == 0 && from_dose == 1 {
            *count = to_dose - 1;
        }
        debug!(disease = %disease, from_dose, to_dose, "添加跳剂指令");
        Ok(())
    }

    pub fn skip_dose_entries(&self, disease: &str) -> Option<&BTreeMap<u32, u32>> {
        self.skip_doses_by_disease.get(disease)
    }

    // ==========================================
    // 系列规则变更 (写时复制)
    // ==========================================

    /// 从指定剂次起切换到同疫苗组的另一系列
    ///
    /// # 规则
    /// - from_dose 之前的剂次规则保留, 其后替换为目标系列的规则
    /// - 两个系列的剂次规则数量须与各自声明一致
    pub fn convert_to_specified_series(&mut self, series_name: &str, from_dose: u32) -> EngineResult<()> {
        let switch_to = self
            .schedule
            .series_by_name(self.vaccine_group(), series_name)
            .ok_or_else(|| {
                EngineError::improper_usage(format!(
                    "疫苗组 {} 中不存在系列 {}",
                    self.vaccine_group(),
                    series_name
                ))
            })?;
        if from_dose < 1 || from_dose > switch_to.number_of_doses_in_series {
            return Err(EngineError::improper_usage(format!(
                "切换起点 {} 超出系列 {} 的剂次总数 {}",
                from_dose, series_name, switch_to.number_of_doses_in_series
            )));
        }
        if !switch_to.dose_rules_consistent() || !self.series_rules.dose_rules_consistent() {
            return Err(EngineError::inconsistent_configuration(format!(
                "系列 {} / {} 的剂次规则数量与声明不一致",
                self.series_name(),
                series_name
            )));
        }

        let keep = (from_dose - 1) as usize;
        let rules = Arc::make_mut(&mut self.series_rules);
        rules.dose_rules.truncate(keep);
        rules
            .dose_rules
            .extend(switch_to.dose_rules.iter().skip(keep).cloned());
        rules.number_of_doses_in_series = switch_to.number_of_doses_in_series;
        rules.series_name = switch_to.series_name.clone();
        rules.dose_number_calculated_by_diseases_targeted =
            switch_to.dose_number_calculated_by_diseases_targeted;
        rules.recurring_doses_after_series_complete = switch_to.recurring_doses_after_series_complete;

        debug!(series_name = %switch_to.series_name, from_dose, "系列切换完成");
        self.refresh_interim_validity_counts();
        Ok(())
    }

    /// 追加剂次规则, 编号必须为下一剂
    pub fn add_vaccine_group_dose_rule(&mut self, rule: DoseRule) -> EngineResult<()> {
        let next = self.series_rules.number_of_doses_in_series + 1;
        if rule.dose_number != next {
            return Err(EngineError::improper_usage(format!(
                "新增剂次规则编号应为 {}, 实际为 {}",
                next, rule.dose_number
            )));
        }
        let rules = Arc::make_mut(&mut self.series_rules);
        rules.dose_rules.push(rule);
        rules.number_of_doses_in_series = next;
        Ok(())
    }

    /// 替换已有编号的剂次规则
    pub fn modify_vaccine_group_dose_rule(&mut self, rule: DoseRule) -> EngineResult<()> {
        let doses = self.series_rules.number_of_doses_in_series;
        if rule.dose_number < 1 || rule.dose_number > doses {
            return Err(EngineError::improper_usage(format!(
                "剂次规则编号 {} 超出范围 1..={}",
                rule.dose_number, doses
            )));
        }
        let rules = Arc::make_mut(&mut self.series_rules);
        match rules
            .dose_rules
            .iter_mut()
            .find(|r| r.dose_number == rule.dose_number)
        {
            Some(existing) => *existing = rule,
            None => {
                return Err(EngineError::inconsistent_configuration(format!(
                    "系列 {} 缺少剂次 {} 的规则",
                    rules.series_name, rule.dose_number
                )))
            }
        }
        Ok(())
    }

    // ===== 已处理的系列级规则 =====

    pub fn add_series_rule_processed(&mut self, rule_name: &str) {
        if !self.series_rules_processed.iter().any(|r| r == rule_name) {
            self.series_rules_processed.push(rule_name.to_string());
        }
    }

    pub fn series_rules_processed(&self) -> &[String] {
        &self.series_rules_processed
    }
}
