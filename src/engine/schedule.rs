// ==========================================
// 免疫接种预测引擎 - 接种计划注册表
// ==========================================
// 职责: 疫苗组 -> 系列规则列表; 季节一致性校验; 疫苗/疾病查询
// 约束: 组内系列名唯一 (不区分大小写); 构造完成后只读, 可跨线程共享
// ==========================================

use crate::config::{SupportingData, SupportingDataReader};
use crate::domain::rules::SeriesRules;
use crate::domain::types::IceConceptType;
use crate::domain::vaccine::Vaccine;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::season_consistency::SeasonConsistencyValidator;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// Schedule - 接种计划
// ==========================================
pub struct Schedule {
    schedule_id: String,
    cds_versions: Vec<String>,
    supporting_data: Arc<dyn SupportingDataReader>,
    vaccine_group_series: BTreeMap<String, Vec<Arc<SeriesRules>>>,
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("schedule_id", &self.schedule_id)
            .field("cds_versions", &self.cds_versions)
            .field("vaccine_groups", &self.vaccine_group_series.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schedule {
    /// 从知识库目录构造
    ///
    /// # 参数
    /// - schedule_id: 计划标识
    /// - cds_versions: 支撑数据版本
    /// - knowledge_repository: 知识库根目录
    ///
    /// # 返回
    /// - Err(ImproperUsage): 参数为空或目录不存在
    /// - Err(Config / InconsistentConfiguration): 支撑数据无效
    pub fn new(
        schedule_id: &str,
        cds_versions: &[String],
        knowledge_repository: &Path,
    ) -> EngineResult<Self> {
        if schedule_id.trim().is_empty() || cds_versions.is_empty() {
            return Err(EngineError::improper_usage(
                "schedule_id 与 cds_versions 不能为空",
            ));
        }
        if !knowledge_repository.is_dir() {
            return Err(EngineError::improper_usage(format!(
                "知识库目录不存在: {}",
                knowledge_repository.display()
            )));
        }

        let data = SupportingData::load_from_repository(knowledge_repository, cds_versions)?;
        Self::from_reader(schedule_id, cds_versions, Arc::new(data))
    }

    /// 从已加载的支撑数据构造
    pub fn from_reader(
        schedule_id: &str,
        cds_versions: &[String],
        supporting_data: Arc<dyn SupportingDataReader>,
    ) -> EngineResult<Self> {
        if schedule_id.trim().is_empty() || cds_versions.is_empty() {
            return Err(EngineError::improper_usage(
                "schedule_id 与 cds_versions 不能为空",
            ));
        }

        let mut schedule = Self {
            schedule_id: schedule_id.to_string(),
            cds_versions: cds_versions.to_vec(),
            supporting_data,
            vaccine_group_series: BTreeMap::new(),
        };

        for rules in schedule.supporting_data.all_series_rules() {
            schedule.add_series_to_schedule(rules)?;
        }

        // 组内季节一致性
        let validator = SeasonConsistencyValidator::new();
        for (vaccine_group, series) in &schedule.vaccine_group_series {
            validator
                .validate(vaccine_group, series.iter().map(Arc::as_ref))
                .map_err(|violation| {
                    EngineError::inconsistent_configuration(format!(
                        "疫苗组 {} 季节配置不一致: {}",
                        vaccine_group, violation
                    ))
                })?;
        }

        info!(
            schedule_id = %schedule.schedule_id,
            vaccine_groups = schedule.vaccine_group_series.len(),
            series = schedule.vaccine_group_series.values().map(Vec::len).sum::<usize>(),
            "接种计划构造完成"
        );
        Ok(schedule)
    }

    fn add_series_to_schedule(&mut self, rules: SeriesRules) -> EngineResult<()> {
        if rules.series_name.trim().is_empty() || rules.vaccine_group.trim().is_empty() {
            return Err(EngineError::improper_usage("系列名与疫苗组不能为空"));
        }
        if self
            .supporting_data
            .diseases_targeted_by_vaccine_group(&rules.vaccine_group)
            .is_none()
        {
            return Err(EngineError::inconsistent_configuration(format!(
                "系列 {} 引用了未知疫苗组 {}",
                rules.series_name, rules.vaccine_group
            )));
        }

        let series = self
            .vaccine_group_series
            .entry(rules.vaccine_group.clone())
            .or_default();
        if series
            .iter()
            .any(|s| s.series_name.eq_ignore_ascii_case(&rules.series_name))
        {
            return Err(EngineError::improper_usage(format!(
                "疫苗组 {} 中系列名重复: {}",
                rules.vaccine_group, rules.series_name
            )));
        }

        debug!(
            vaccine_group = %rules.vaccine_group,
            series_name = %rules.series_name,
            doses = rules.number_of_doses_in_series,
            "注册系列规则"
        );
        series.push(Arc::new(rules));
        Ok(())
    }

    // ==========================================
    // 基本属性
    // ==========================================

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    pub fn cds_versions(&self) -> &[String] {
        &self.cds_versions
    }

    pub fn supporting_data(&self) -> &dyn SupportingDataReader {
        self.supporting_data.as_ref()
    }

    // ==========================================
    // 系列查询
    // ==========================================

    /// 按 (疫苗组, 系列名) 查找, 系列名不区分大小写
    pub fn series_by_name(&self, vaccine_group: &str, series_name: &str) -> Option<Arc<SeriesRules>> {
        self.vaccine_group_series
            .get(vaccine_group)?
            .iter()
            .find(|s| s.series_name.eq_ignore_ascii_case(series_name))
            .cloned()
    }

    /// 疫苗组下全部系列
    pub fn series_for_vaccine_group(&self, vaccine_group: &str) -> &[Arc<SeriesRules>] {
        self.vaccine_group_series
            .get(vaccine_group)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 全部系列 (按疫苗组优先级)
    pub fn all_series(&self) -> Vec<Arc<SeriesRules>> {
        self.ordered_vaccine_groups()
            .iter()
            .flat_map(|g| self.series_for_vaccine_group(g).iter().cloned())
            .collect()
    }

    /// 候选系列: 疫苗组所针对疾病与接种史涉及的疾病有交集
    ///
    /// # 参数
    /// - diseases: 接种史中出现的疾病
    pub fn candidate_series(&self, diseases: &BTreeSet<String>) -> Vec<Arc<SeriesRules>> {
        self.ordered_vaccine_groups()
            .iter()
            .filter(|g| {
                self.diseases_targeted_by_vaccine_group(g)
                    .is_some_and(|targeted| !targeted.is_disjoint(diseases))
            })
            .flat_map(|g| self.series_for_vaccine_group(g).iter().cloned())
            .collect()
    }

    fn ordered_vaccine_groups(&self) -> Vec<String> {
        self.supporting_data
            .vaccine_groups()
            .into_iter()
            .filter(|g| self.vaccine_group_series.contains_key(g))
            .collect()
    }

    // ==========================================
    // 疫苗与疾病查询
    // ==========================================

    pub fn vaccine_by_concept(&self, cds_concept: &str) -> Option<&Vaccine> {
        self.supporting_data.vaccine_by_concept(cds_concept)
    }

    pub fn diseases_targeted_by_vaccine_group(&self, vaccine_group: &str) -> Option<&BTreeSet<String>> {
        self.supporting_data
            .diseases_targeted_by_vaccine_group(vaccine_group)
    }

    pub fn cds_list_item(&self, concept_type: IceConceptType, code: &str) -> Option<&str> {
        self.supporting_data.cds_list_item(concept_type, code)
    }

    pub fn is_supported_disease(&self, disease: &str) -> bool {
        self.supporting_data.is_supported_disease(disease)
    }

    /// 疫苗是否针对任一指定疾病
    pub fn vaccine_targets_one_or_more_of_specified_diseases(
        &self,
        vaccine: &Vaccine,
        diseases: &BTreeSet<String>,
    ) -> bool {
        vaccine.targets_any_of(diseases)
    }

    /// 与指定疾病有交集的疫苗组数量
    pub fn count_of_vaccine_groups_encompassing_diseases(&self, diseases: &BTreeSet<String>) -> usize {
        self.supporting_data
            .vaccine_groups()
            .iter()
            .filter(|g| {
                self.diseases_targeted_by_vaccine_group(g)
                    .is_some_and(|targeted| !targeted.is_disjoint(diseases))
            })
            .count()
    }
}
