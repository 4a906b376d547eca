// ==========================================
// 免疫接种预测引擎 - 配置层
// ==========================================
// 职责: 运行配置 (多级覆写) 与支撑数据 (知识库) 加载
// ==========================================

pub mod config_manager;
pub mod error;
pub mod supporting_data;
pub mod supporting_data_reader;

// 重导出
pub use config_manager::{config_keys, default_knowledge_repository, ForecastConfig};
pub use error::{ConfigError, ConfigResult};
pub use supporting_data::{
    DiseaseEntry, SupportingData, SupportingDataFile, VaccineEntry, VaccineGroupEntry,
    SUPPORTING_DATA_FILE_NAME,
};
pub use supporting_data_reader::SupportingDataReader;
