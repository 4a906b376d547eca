// ==========================================
// 免疫接种预测引擎 - 目标剂次
// ==========================================
// 职责: 单个已接种(或候选)剂次及其有效性状态机
// 状态: NOT_EVALUATED -> {VALID, ACCEPTED, INVALID}, 可重新评估
// 约束: 接种日期必填; unique_id 构造后不可变; 相等性按 unique_id
// ==========================================

use crate::domain::types::{DoseStatus, EvaluationReason};
use crate::domain::vaccine::{Vaccine, VaccineComponent};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// 原因集合类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    Valid,
    Accepted,
    Invalid,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetDose {
    unique_id: Uuid,
    dose_id: String,
    administered_vaccine: Vaccine,
    vaccine_component: VaccineComponent,
    administration_date: NaiveDate,

    // ===== 系列内位置 (由所属 TargetSeries 维护) =====
    administered_shot_number_in_series: u32,
    dose_number_in_series: u32,
    #[serde(skip)]
    pub(crate) insertion_sequence: u64,

    // ===== 评估状态 =====
    status: DoseStatus,
    is_valid: bool,
    has_been_evaluated: bool,
    valid_reasons: BTreeSet<String>,
    accepted_reasons: BTreeSet<String>,
    invalid_reasons: BTreeSet<String>,
    rules_processed: BTreeSet<String>,

    // ===== 标志 =====
    pub is_primary_series_shot: bool,
    pub counts_towards_completion: bool,
    pub post_evaluation_check_completed: bool,
}

impl TargetDose {
    /// 创建未评估的剂次
    ///
    /// # 参数
    /// - dose_id: 外部剂次标识
    /// - administered_vaccine: 接种的疫苗
    /// - vaccine_component: 本系列评估的组分
    /// - administration_date: 接种日期
    pub fn new(
        dose_id: &str,
        administered_vaccine: Vaccine,
        vaccine_component: VaccineComponent,
        administration_date: NaiveDate,
    ) -> Self {
        Self {
            unique_id: Uuid::new_v4(),
            dose_id: dose_id.to_string(),
            administered_vaccine,
            vaccine_component,
            administration_date,
            administered_shot_number_in_series: 0,
            dose_number_in_series: 1,
            insertion_sequence: 0,
            status: DoseStatus::NotEvaluated,
            is_valid: false,
            has_been_evaluated: false,
            valid_reasons: BTreeSet::new(),
            accepted_reasons: BTreeSet::new(),
            invalid_reasons: BTreeSet::new(),
            rules_processed: BTreeSet::new(),
            is_primary_series_shot: false,
            counts_towards_completion: true,
            post_evaluation_check_completed: false,
        }
    }

    // ===== 标识与基本属性 =====

    pub fn unique_id(&self) -> Uuid {
        self.unique_id
    }

    pub fn dose_id(&self) -> &str {
        &self.dose_id
    }

    pub fn administered_vaccine(&self) -> &Vaccine {
        &self.administered_vaccine
    }

    pub fn vaccine_component(&self) -> &VaccineComponent {
        &self.vaccine_component
    }

    pub fn administration_date(&self) -> NaiveDate {
        self.administration_date
    }

    /// 本剂次组分针对的疾病
    pub fn diseases_targeted(&self) -> &BTreeSet<String> {
        &self.vaccine_component.diseases_targeted
    }

    // ===== 位置 =====

    pub fn administered_shot_number(&self) -> u32 {
        self.administered_shot_number_in_series
    }

    pub(crate) fn set_administered_shot_number(&mut self, shot_number: u32) {
        self.administered_shot_number_in_series = shot_number;
    }

    pub fn dose_number(&self) -> u32 {
        self.dose_number_in_series
    }

    pub fn set_dose_number(&mut self, dose_number: u32) {
        self.dose_number_in_series = dose_number;
    }

    // ===== 状态机 =====

    pub fn status(&self) -> DoseStatus {
        self.status
    }

    /// 设置状态并同步 has_been_evaluated / is_valid
    pub fn set_status(&mut self, status: DoseStatus) {
        self.status = status;
        self.has_been_evaluated = status.is_evaluated();
        self.is_valid = status.is_valid();
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn has_been_evaluated(&self) -> bool {
        self.has_been_evaluated
    }

    // ===== 原因集合 =====

    fn reasons_mut(&mut self, kind: ReasonKind) -> &mut BTreeSet<String> {
        match kind {
            ReasonKind::Valid => &mut self.valid_reasons,
            ReasonKind::Accepted => &mut self.accepted_reasons,
            ReasonKind::Invalid => &mut self.invalid_reasons,
        }
    }

    pub fn reasons(&self, kind: ReasonKind) -> &BTreeSet<String> {
        match kind {
            ReasonKind::Valid => &self.valid_reasons,
            ReasonKind::Accepted => &self.accepted_reasons,
            ReasonKind::Invalid => &self.invalid_reasons,
        }
    }

    /// 添加原因; 空字符串忽略, 重复添加无副作用
    pub fn add_reason(&mut self, kind: ReasonKind, reason: &str) {
        if reason.is_empty() {
            return;
        }
        self.reasons_mut(kind).insert(reason.to_string());
    }

    pub fn add_evaluation_reason(&mut self, kind: ReasonKind, reason: EvaluationReason) {
        self.add_reason(kind, reason.cds_list_item_name());
    }

    pub fn add_valid_reason(&mut self, reason: &str) {
        self.add_reason(ReasonKind::Valid, reason);
    }

    pub fn add_accepted_reason(&mut self, reason: &str) {
        self.add_reason(ReasonKind::Accepted, reason);
    }

    pub fn add_invalid_reason(&mut self, reason: &str) {
        self.add_reason(ReasonKind::Invalid, reason);
    }

    pub fn remove_reason(&mut self, kind: ReasonKind, reason: &str) -> bool {
        self.reasons_mut(kind).remove(reason)
    }

    /// 从三个集合中移除
    pub fn remove_reason_from_all(&mut self, reason: &str) {
        self.valid_reasons.remove(reason);
        self.accepted_reasons.remove(reason);
        self.invalid_reasons.remove(reason);
    }

    pub fn contains_reason(&self, kind: ReasonKind, reason: EvaluationReason) -> bool {
        self.reasons(kind).contains(reason.cds_list_item_name())
    }

    /// 三个集合的并集
    pub fn all_evaluation_reasons(&self) -> BTreeSet<String> {
        self.valid_reasons
            .iter()
            .chain(self.accepted_reasons.iter())
            .chain(self.invalid_reasons.iter())
            .cloned()
            .collect()
    }

    pub fn clear_all_evaluation_reasons(&mut self) {
        self.valid_reasons.clear();
        self.accepted_reasons.clear();
        self.invalid_reasons.clear();
    }

    // ===== 规则幂等记录 =====

    /// 记录规则已处理; 已记录过返回 false
    pub fn add_rule_processed(&mut self, rule_name: &str) -> bool {
        self.rules_processed.insert(rule_name.to_string())
    }

    pub fn is_rule_processed(&self, rule_name: &str) -> bool {
        self.rules_processed.contains(rule_name)
    }

    pub fn rules_processed(&self) -> &BTreeSet<String> {
        &self.rules_processed
    }
}

impl PartialEq for TargetDose {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for TargetDose {}
