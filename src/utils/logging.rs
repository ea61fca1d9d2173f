/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::RunSummary;
use crate::orchestrator::Preview;

/// 初始化日志
///
/// 设置了 `RUST_LOG` 时以其为准，否则按详细程度选择级别。
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 | 2 => "info",
        _ => "debug",
    }
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - CMM 批量提交");
    info!("🌐 目标: {}", config.target_url);
    info!(
        "📊 并行会话: {} | 每组条目: {} | 无头: {}",
        config.max_concurrent, config.items_per_division, config.headless
    );
    info!("{}", "=".repeat(60));
}

/// 记录分组计划
pub fn log_plan(total: usize, divisions: usize, max_concurrent: usize) {
    info!("✓ 共 {} 个条目，分为 {} 组", total, divisions);
    info!("📋 最多同时运行 {} 组", max_concurrent);
}

/// 输出预演信息
pub fn log_preview(preview: &Preview) {
    always("🔎 预演模式:");
    always(&format!("   参数: {:?}", preview.options));
    always(&format!("   条目数量: {}", preview.item_count));
    always(&format!("   分组数量: {}", preview.divisions.len()));
    match preview
        .first_item
        .as_ref()
        .map(serde_json::to_string_pretty)
    {
        Some(Ok(json)) => always(&format!("   第一个条目:\n{}", json)),
        Some(Err(e)) => warn!("   无法显示第一个条目: {}", e),
        None => {}
    }
}

/// 打印最终统计信息
///
/// 与详细程度无关，始终输出。
pub fn print_final_stats(summary: &RunSummary) {
    info!("\n{}", "=".repeat(60));
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    always(&format!(
        "📊 成功下载 {}/{}",
        summary.succeeded, summary.processed
    ));
    if summary.failed_ids.is_empty() {
        always("✅ 没有失败条目");
    } else {
        always(&format!(
            "❌ 失败 {} 个: {:?}",
            summary.failed, summary.failed_ids
        ));
    }
    info!("{}", "=".repeat(60));
}

/// 日志级别被调低时改写到标准输出
fn always(line: &str) {
    if tracing::enabled!(tracing::Level::INFO) {
        info!("{}", line);
    } else {
        println!("{}", line);
    }
}
