// ==========================================
// 免疫接种预测引擎 - 支撑数据 (知识库)
// ==========================================
// 职责: 从知识库目录加载疾病/疫苗组/疫苗/系列规则
// 布局: <knowledge_repository>/<cds_version>/supporting_data.json
// 说明: 多个版本按顺序合并, 重复定义视为配置错误
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::supporting_data_reader::SupportingDataReader;
use crate::domain::rules::SeriesRules;
use crate::domain::types::IceConceptType;
use crate::domain::vaccine::{Vaccine, VaccineComponent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// 每个版本目录下的支撑数据文件名
pub const SUPPORTING_DATA_FILE_NAME: &str = "supporting_data.json";

// ==========================================
// 文件格式
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportingDataFile {
    #[serde(default)]
    pub diseases: Vec<DiseaseEntry>,
    #[serde(default)]
    pub vaccine_groups: Vec<VaccineGroupEntry>,
    #[serde(default)]
    pub vaccines: Vec<VaccineEntry>,
    #[serde(default)]
    pub series: Vec<SeriesRules>,
}

impl SupportingDataFile {
    /// 追加另一个版本的条目 (不做去重, 由构建阶段检测)
    pub fn append(&mut self, mut other: SupportingDataFile) {
        self.diseases.append(&mut other.diseases);
        self.vaccine_groups.append(&mut other.vaccine_groups);
        self.vaccines.append(&mut other.vaccines);
        self.series.append(&mut other.series);
    }
}

/// 疾病概念: 编码 -> 本地列表项名称
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineGroupEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub priority: u32, // 越小越靠前
    pub diseases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineEntry {
    pub cds_concept: String,
    pub name: String,
    #[serde(default)]
    pub live_virus: bool,
    #[serde(default)]
    pub diseases_targeted: Vec<String>,
    /// 联合疫苗的组分 (引用其他疫苗的概念编码)
    #[serde(default)]
    pub components: Vec<String>,
}

// ==========================================
// SupportingData - 已校验的支撑数据
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SupportingData {
    disease_names_by_code: BTreeMap<String, String>,
    disease_names: BTreeSet<String>,
    vaccine_group_names_by_code: BTreeMap<String, String>,
    vaccine_group_diseases: BTreeMap<String, BTreeSet<String>>,
    vaccine_group_order: Vec<String>,
    vaccines: BTreeMap<String, Vaccine>,
    series: Vec<SeriesRules>,
}

impl SupportingData {
    // ==========================================
    // 加载
    // ==========================================

    /// 从知识库目录加载并合并多个版本
    ///
    /// # 参数
    /// - knowledge_repository: 知识库根目录
    /// - cds_versions: 版本目录名列表 (按顺序合并)
    pub fn load_from_repository(
        knowledge_repository: &Path,
        cds_versions: &[String],
    ) -> ConfigResult<Self> {
        if cds_versions.is_empty() {
            return Err(ConfigError::invalid_value("cds_versions", "至少需要一个版本"));
        }

        let mut merged = SupportingDataFile::default();
        for version in cds_versions {
            let path = knowledge_repository
                .join(version)
                .join(SUPPORTING_DATA_FILE_NAME);
            debug!(path = %path.display(), "读取支撑数据文件");
            merged.append(Self::read_file(&path)?);
        }

        let data = Self::from_file(merged)?;
        info!(
            versions = ?cds_versions,
            vaccine_groups = data.vaccine_group_order.len(),
            vaccines = data.vaccines.len(),
            series = data.series.len(),
            "支撑数据加载完成"
        );
        Ok(data)
    }

    /// 读取单个支撑数据文件
    pub fn read_file(path: &Path) -> ConfigResult<SupportingDataFile> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 由文件内容构建, 校验重复定义与引用完整性
    pub fn from_file(file: SupportingDataFile) -> ConfigResult<Self> {
        let mut data = SupportingData::default();

        // ===== 疾病 =====
        for disease in &file.diseases {
            if data
                .disease_names_by_code
                .insert(disease.code.clone(), disease.name.clone())
                .is_some()
            {
                return Err(ConfigError::duplicate("disease", &disease.code));
            }
            data.disease_names.insert(disease.name.clone());
        }

        // ===== 疫苗组 =====
        let mut groups = file.vaccine_groups.clone();
        groups.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        for group in &groups {
            if data.vaccine_group_diseases.contains_key(&group.name) {
                return Err(ConfigError::duplicate("vaccine_group", &group.name));
            }
            if data
                .vaccine_group_names_by_code
                .insert(group.code.clone(), group.name.clone())
                .is_some()
            {
                return Err(ConfigError::duplicate("vaccine_group", &group.code));
            }
            let diseases = data.check_diseases(&group.diseases, &group.name)?;
            data.vaccine_group_diseases.insert(group.name.clone(), diseases);
            data.vaccine_group_order.push(group.name.clone());
        }

        // ===== 疫苗 =====
        let mut entries: BTreeMap<&str, &VaccineEntry> = BTreeMap::new();
        for entry in &file.vaccines {
            if entries.insert(entry.cds_concept.as_str(), entry).is_some() {
                return Err(ConfigError::duplicate("vaccine", &entry.cds_concept));
            }
        }
        for entry in &file.vaccines {
            let vaccine = data.build_vaccine(entry, &entries)?;
            data.vaccines.insert(entry.cds_concept.clone(), vaccine);
        }

        // ===== 系列规则 =====
        for rules in &file.series {
            if !data.vaccine_group_diseases.contains_key(&rules.vaccine_group) {
                return Err(ConfigError::unknown_reference(
                    "vaccine_group",
                    &rules.vaccine_group,
                    &rules.series_name,
                ));
            }
            for dose_rule in &rules.dose_rules {
                for code in dose_rule.all_permitted_vaccines() {
                    if !data.vaccines.contains_key(&code) {
                        return Err(ConfigError::unknown_reference(
                            "vaccine",
                            &code,
                            &rules.series_name,
                        ));
                    }
                }
            }
        }
        data.series = file.series;

        Ok(data)
    }

    fn check_diseases(&self, diseases: &[String], referenced_by: &str) -> ConfigResult<BTreeSet<String>> {
        let mut checked = BTreeSet::new();
        for disease in diseases {
            if !self.disease_names.contains(disease) {
                return Err(ConfigError::unknown_reference("disease", disease, referenced_by));
            }
            checked.insert(disease.clone());
        }
        Ok(checked)
    }

    fn build_vaccine(
        &self,
        entry: &VaccineEntry,
        entries: &BTreeMap<&str, &VaccineEntry>,
    ) -> ConfigResult<Vaccine> {
        let mut diseases = self.check_diseases(&entry.diseases_targeted, &entry.cds_concept)?;
        let mut components = Vec::with_capacity(entry.components.len());
        for code in &entry.components {
            let component = entries.get(code.as_str()).ok_or_else(|| {
                ConfigError::unknown_reference("vaccine", code, &entry.cds_concept)
            })?;
            let component_diseases =
                self.check_diseases(&component.diseases_targeted, &component.cds_concept)?;
            diseases.extend(component_diseases.iter().cloned());
            components.push(VaccineComponent {
                cds_concept: component.cds_concept.clone(),
                name: component.name.clone(),
                live_virus: component.live_virus,
                diseases_targeted: component_diseases,
            });
        }

        Ok(Vaccine {
            cds_concept: entry.cds_concept.clone(),
            name: entry.name.clone(),
            live_virus: entry.live_virus || components.iter().any(|c| c.live_virus),
            diseases_targeted: diseases,
            components,
        })
    }
}

// ==========================================
// SupportingDataReader 实现
// ==========================================
impl SupportingDataReader for SupportingData {
    fn vaccine_groups(&self) -> Vec<String> {
        self.vaccine_group_order.clone()
    }

    fn diseases_targeted_by_vaccine_group(&self, vaccine_group: &str) -> Option<&BTreeSet<String>> {
        self.vaccine_group_diseases.get(vaccine_group)
    }

    fn vaccine_by_concept(&self, cds_concept: &str) -> Option<&Vaccine> {
        self.vaccines.get(cds_concept)
    }

    fn cds_list_item(&self, concept_type: IceConceptType, code: &str) -> Option<&str> {
        match concept_type {
            IceConceptType::Disease => self.disease_names_by_code.get(code).map(String::as_str),
            IceConceptType::Vaccine => self.vaccines.get(code).map(|v| v.name.as_str()),
            IceConceptType::VaccineGroup => {
                self.vaccine_group_names_by_code.get(code).map(String::as_str)
            }
        }
    }

    fn is_supported_disease(&self, disease: &str) -> bool {
        self.disease_names.contains(disease)
    }

    fn all_series_rules(&self) -> Vec<SeriesRules> {
        self.series.clone()
    }
}
