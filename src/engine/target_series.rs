// ==========================================
// 免疫接种预测引擎 - 目标系列
// ==========================================
// 职责: 单个患者在单个系列上的剂次评估与下一剂推荐
// 输入: 系列规则 + 接种计划 + 剂次历史 + 免疫记录
// 输出: 剂次状态/编号 + 最终推荐 (状态/日期/最早/逾期)
// ==========================================
// 约束: 单线程独占; 系列规则写时复制, 不修改共享规则
// ==========================================

mod core;
mod dose_numbering;
mod evaluation;
mod forecast;

#[cfg(test)]
mod tests;

pub use self::core::TargetSeries;
pub use forecast::RecommendationBasis;
