// ==========================================
// 免疫接种预测引擎 - 支撑数据读取 Trait
// ==========================================
// 职责: 定义 Schedule 所需的支撑数据查询接口（不包含实现）
// 实现者: SupportingData（从知识库 JSON 加载）
// 红线: 只读查询, 构造完成后不可变
// ==========================================

use crate::domain::rules::SeriesRules;
use crate::domain::types::IceConceptType;
use crate::domain::vaccine::Vaccine;
use std::collections::BTreeSet;

// ==========================================
// SupportingDataReader Trait
// ==========================================
pub trait SupportingDataReader: Send + Sync {
    // ===== 疫苗组与疾病 =====

    /// 全部疫苗组名称 (按优先级排序)
    fn vaccine_groups(&self) -> Vec<String>;

    /// 疫苗组针对的疾病集合
    ///
    /// # 返回
    /// - None: 未知疫苗组
    fn diseases_targeted_by_vaccine_group(&self, vaccine_group: &str) -> Option<&BTreeSet<String>>;

    // ===== 疫苗 =====

    /// 按 OpenCDS 概念编码查找疫苗
    fn vaccine_by_concept(&self, cds_concept: &str) -> Option<&Vaccine>;

    // ===== 概念列表项 =====

    /// 按 (概念类型, 概念编码) 查找本地列表项名称
    fn cds_list_item(&self, concept_type: IceConceptType, code: &str) -> Option<&str>;

    /// 疾病列表项名称是否已定义
    fn is_supported_disease(&self, disease: &str) -> bool;

    // ===== 系列规则 =====

    /// 全部系列规则 (构造 Schedule 时读取一次)
    fn all_series_rules(&self) -> Vec<SeriesRules>;
}
