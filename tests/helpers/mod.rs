// ==========================================
// 集成测试公共辅助模块
// ==========================================
#![allow(dead_code)]

pub mod test_data_builder;
