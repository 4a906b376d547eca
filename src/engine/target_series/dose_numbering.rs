use super::core::TargetSeries;
use crate::domain::types::DoseStatus;
use crate::engine::error::EngineResult;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};
use uuid::Uuid;

// ==========================================
// 剂次编号计算
// ==========================================
// 规则:
// - 只有 VALID 且计入完成的剂次使计数 +1
// - 同日重复接种: 按疾病模式下同一疾病同日只计一次; 否则同日首个有效剂次之后的剂次不计数 (跳剂指令照常生效)
// - 跳剂指令 (疾病, 计数+1) 存在时计数直接跳到目标; 剂次非 VALID 时目标减一
// - 已免疫疾病不参与最小值计算, 结束时取最小值
// - 读取模式不写回按疾病计数
// ==========================================

/// 一次计数遍历的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct DoseTally {
    pub(super) least: u32,
    pub(super) greatest: u32,
    pub(super) by_disease: BTreeMap<String, u32>,
}

impl DoseTally {
    fn uniform(diseases: &BTreeSet<String>, value: u32) -> Self {
        Self {
            least: value,
            greatest: value,
            by_disease: diseases.iter().map(|d| (d.clone(), value)).collect(),
        }
    }
}

impl TargetSeries {
    /// 按剂次计数遍历
    ///
    /// # 参数
    /// - anchor: 参考剂次下标, 其接种日期用于判断免疫
    /// - update_mode: false 时遍历到参考剂次 (含) 为止; true 时遍历全部剂次
    /// - diseases: 参与计算的疾病
    pub(super) fn tally_doses(
        &self,
        anchor: usize,
        update_mode: bool,
        diseases: &BTreeSet<String>,
    ) -> DoseTally {
        let total = self.series_rules.number_of_doses_in_series;
        let anchor_date = self.target_doses[anchor].administration_date();

        let immune: BTreeSet<String> = diseases
            .iter()
            .filter(|d| self.is_immune_as_of(d, anchor_date))
            .cloned()
            .collect();
        if !diseases.is_empty() && immune.len() == diseases.len() {
            return DoseTally::uniform(diseases, total);
        }

        let mut tallies: BTreeMap<String, u32> = diseases
            .difference(&immune)
            .map(|d| (d.clone(), 0))
            .collect();

        let end = if update_mode {
            self.target_doses.len()
        } else {
            anchor + 1
        };
        let by_disease = self.series_rules.dose_number_calculated_by_diseases_targeted;

        let mut current_day: Option<NaiveDate> = None;
        let mut day_valid_seen = false;
        let mut day_diseases: BTreeSet<String> = BTreeSet::new();

        for dose in &self.target_doses[..end] {
            let date = dose.administration_date();
            if current_day != Some(date) {
                current_day = Some(date);
                day_valid_seen = false;
                day_diseases.clear();
            }
            // 非按疾病模式: 同日已有有效剂次时不再计数, 但跳剂指令仍然生效
            let same_day_repeat = !by_disease && day_valid_seen;

            let counted = dose.status() == DoseStatus::Valid && dose.counts_towards_completion;
            let dose_diseases = dose.diseases_targeted();

            if !dose_diseases.is_disjoint(diseases) {
                for disease in dose_diseases {
                    let Some(tally) = tallies.get_mut(disease) else {
                        continue;
                    };
                    let next = *tally + 1;
                    let increment = counted
                        && !same_day_repeat
                        && !(by_disease && day_diseases.contains(disease));

                    let skip_to = self
                        .skip_doses_by_disease
                        .get(disease)
                        .and_then(|entries| entries.get(&next))
                        .copied();
                    match skip_to {
                        Some(to) if dose.status() == DoseStatus::Valid => *tally = to,
                        Some(to) => *tally = to.saturating_sub(1),
                        None if increment => *tally = next,
                        None => {}
                    }
                }
            }

            if counted {
                day_valid_seen = true;
                day_diseases.extend(dose_diseases.iter().cloned());
            }
        }

        let least = tallies.values().copied().min().unwrap_or(0);
        let greatest = tallies.values().copied().max().unwrap_or(0);
        for disease in immune {
            tallies.insert(disease, least);
        }

        DoseTally {
            least,
            greatest,
            by_disease: tallies,
        }
    }

    /// 按系列模式选择最终计数: 按疾病模式取最小, 否则取最大
    pub(super) fn select_count(&self, tally: &DoseTally) -> u32 {
        if self.series_rules.dose_number_calculated_by_diseases_targeted {
            tally.least
        } else {
            tally.greatest
        }
    }

    /// 无剂次时的计数: 全部疾病已免疫时为剂次总数, 否则为 0
    fn empty_series_count(&self) -> u32 {
        let all_immune = !self.series_diseases.is_empty()
            && self
                .series_diseases
                .iter()
                .all(|d| self.disease_immunity.contains_key(d));
        if all_immune {
            self.series_rules.number_of_doses_in_series
        } else {
            0
        }
    }

    /// 按当前剂次与跳剂/免疫状态重算按疾病计数
    pub(super) fn refresh_interim_validity_counts(&mut self) {
        if self.target_doses.is_empty() {
            let total = self.series_rules.number_of_doses_in_series;
            let counts = self
                .series_diseases
                .iter()
                .map(|disease| {
                    let count = if self.disease_immunity.contains_key(disease) {
                        total
                    } else {
                        self.skip_doses_by_disease
                            .get(disease)
                            .and_then(|entries| entries.get(&1))
                            .map(|to| to.saturating_sub(1))
                            .unwrap_or(0)
                    };
                    (disease.clone(), count)
                })
                .collect();
            self.interim_validity_count_by_disease = counts;
            return;
        }

        let last = self.target_doses.len() - 1;
        let tally = self.tally_doses(last, true, &self.series_diseases);
        self.interim_validity_count_by_disease.extend(tally.by_disease);
    }

    /// 新增剂次时的目标剂次编号 (只读)
    pub(super) fn target_dose_number_at_index(&self, index: usize) -> u32 {
        let tally = self.tally_doses(index, false, &self.series_diseases);
        self.select_count(&tally) + 1
    }

    // ==========================================
    // 公开查询
    // ==========================================

    /// 有效剂次数 (考虑免疫与跳剂)
    pub fn effective_number_of_doses_in_series(&self) -> u32 {
        if self.target_doses.is_empty() {
            return self.empty_series_count();
        }
        let last = self.target_doses.len() - 1;
        let tally = self.tally_doses(last, false, &self.series_diseases);
        self.select_count(&tally)
    }

    /// 截至某日 (含) 的有效剂次数
    pub fn effective_number_of_doses_in_series_by_date(&self, date: NaiveDate) -> u32 {
        let anchor = self
            .target_doses
            .iter()
            .rposition(|d| d.administration_date() <= date);
        match anchor {
            Some(index) => {
                let tally = self.tally_doses(index, false, &self.series_diseases);
                self.select_count(&tally)
            }
            None => 0,
        }
    }

    /// 下一剂的剂次编号 (有效剂次数 + 1)
    pub fn determine_dose_number_in_series(&self) -> u32 {
        self.effective_number_of_doses_in_series() + 1
    }

    /// 指定剂次的剂次编号 (只读)
    pub fn determine_dose_number_in_series_for(&self, unique_id: Uuid) -> EngineResult<u32> {
        let index = self.dose_index(unique_id)?;
        Ok(self.target_dose_number_at_index(index))
    }

    /// 仅按该剂次所针对疾病计算的剂次编号 (只读)
    pub fn determine_dose_number_in_series_for_diseases_targeted_by_dose(
        &self,
        unique_id: Uuid,
    ) -> EngineResult<u32> {
        let index = self.dose_index(unique_id)?;
        let diseases: BTreeSet<String> = self.target_doses[index]
            .diseases_targeted()
            .intersection(&self.series_diseases)
            .cloned()
            .collect();
        let tally = self.tally_doses(index, false, &diseases);
        Ok(self.select_count(&tally) + 1)
    }

    /// 剂次状态变为 VALID 后调用: 写回按疾病计数, 返回实际有效剂次数
    #[instrument(skip(self), fields(series_name = %self.series_name()))]
    pub fn update_dose_validity_count_and_return_actual_dose_count(
        &mut self,
        unique_id: Uuid,
    ) -> EngineResult<u32> {
        let index = self.dose_index(unique_id)?;
        let tally = self.tally_doses(index, true, &self.series_diseases);
        let count = self.select_count(&tally);
        debug!(count, least = tally.least, greatest = tally.greatest, "更新按疾病计数");
        self.interim_validity_count_by_disease.extend(tally.by_disease);
        Ok(count)
    }

    /// 同上, 返回下一目标剂次编号
    pub fn update_dose_validity_count_and_return_target_dose_number(
        &mut self,
        unique_id: Uuid,
    ) -> EngineResult<u32> {
        Ok(self.update_dose_validity_count_and_return_actual_dose_count(unique_id)? + 1)
    }

    pub fn interim_validity_count(&self, disease: &str) -> Option<u32> {
        self.interim_validity_count_by_disease.get(disease).copied()
    }

    pub fn interim_validity_counts(&self) -> &BTreeMap<String, u32> {
        &self.interim_validity_count_by_disease
    }
}
