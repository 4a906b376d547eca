// ==========================================
// 免疫接种预测引擎 - 命令行入口
// ==========================================
// 用法: immunization-forecast <case.json> [config.json]
// 输出: 预测结果 JSON (stdout); 日志输出到 stderr
// ==========================================

use anyhow::{bail, Context, Result};
use immunization_forecast::config::ForecastConfig;
use immunization_forecast::engine::{ForecastOrchestrator, ForecastRequest, Schedule};
use immunization_forecast::logging;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(case_path) = args.next().map(PathBuf::from) else {
        bail!("用法: immunization-forecast <case.json> [config.json]");
    };
    let config_path = args.next().map(PathBuf::from);

    let config = ForecastConfig::load(config_path.as_deref()).context("加载运行配置失败")?;
    if config.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} - 版本 {}", immunization_forecast::APP_NAME, immunization_forecast::VERSION);
    tracing::info!("知识库: {}", config.knowledge_repository.display());
    tracing::info!("==================================================");

    let content = fs::read_to_string(&case_path)
        .with_context(|| format!("读取病例文件失败: {}", case_path.display()))?;
    let mut request: ForecastRequest = serde_json::from_str(&content)
        .with_context(|| format!("解析病例文件失败: {}", case_path.display()))?;
    if request.evaluation_date.is_none() {
        request.evaluation_date = config.evaluation_date;
    }

    let schedule = Schedule::new(
        &config.schedule_id,
        &config.cds_versions,
        &config.knowledge_repository,
    )
    .context("构造接种计划失败")?;

    let orchestrator = ForecastOrchestrator::new(Arc::new(schedule));
    let result = orchestrator.forecast(&request).context("预测失败")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
