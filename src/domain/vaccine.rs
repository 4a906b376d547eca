// ==========================================
// 免疫接种预测引擎 - 疫苗与疫苗组分
// ==========================================
// 职责: 疫苗概念、组分及其针对的疾病集合
// 说明: 联合疫苗由多个组分构成; 单价疫苗自身即唯一组分
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 疫苗组分 (剂次评估的最小单位)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaccineComponent {
    pub cds_concept: String,              // OpenCDS 概念编码
    pub name: String,                     // 显示名称
    #[serde(default)]
    pub live_virus: bool,                 // 是否活病毒疫苗
    pub diseases_targeted: BTreeSet<String>,
}

impl VaccineComponent {
    pub fn targets_any_of(&self, diseases: &BTreeSet<String>) -> bool {
        !self.diseases_targeted.is_disjoint(diseases)
    }
}

/// 疫苗
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vaccine {
    pub cds_concept: String,
    pub name: String,
    #[serde(default)]
    pub live_virus: bool,
    pub diseases_targeted: BTreeSet<String>,
    #[serde(default)]
    pub components: Vec<VaccineComponent>, // 为空时视为单价疫苗
}

impl Vaccine {
    pub fn new(cds_concept: &str, name: &str, diseases: &[&str]) -> Self {
        Self {
            cds_concept: cds_concept.to_string(),
            name: name.to_string(),
            live_virus: false,
            diseases_targeted: diseases.iter().map(|d| d.to_string()).collect(),
            components: Vec::new(),
        }
    }

    pub fn with_live_virus(mut self, live_virus: bool) -> Self {
        self.live_virus = live_virus;
        self
    }

    pub fn with_components(mut self, components: Vec<VaccineComponent>) -> Self {
        self.components = components;
        self
    }

    pub fn is_combination_vaccine(&self) -> bool {
        self.components.len() > 1
    }

    /// 单价疫苗视作自身的唯一组分
    pub fn as_component(&self) -> VaccineComponent {
        VaccineComponent {
            cds_concept: self.cds_concept.clone(),
            name: self.name.clone(),
            live_virus: self.live_virus,
            diseases_targeted: self.diseases_targeted.clone(),
        }
    }

    /// 所有组分 (单价疫苗返回自身)
    pub fn all_components(&self) -> Vec<VaccineComponent> {
        if self.components.is_empty() {
            vec![self.as_component()]
        } else {
            self.components.clone()
        }
    }

    pub fn targets_any_of(&self, diseases: &BTreeSet<String>) -> bool {
        !self.diseases_targeted.is_disjoint(diseases)
    }

    /// 找到第一个针对指定疾病集合的组分
    pub fn component_targeting(&self, diseases: &BTreeSet<String>) -> Option<VaccineComponent> {
        self.all_components()
            .into_iter()
            .find(|c| c.targets_any_of(diseases))
    }
}
