//! 日志工具模块
//!
//! 提供日志初始化、日志文件和统计输出的辅助函数

use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::SessionSnapshot;

/// 初始化 tracing
///
/// 日志输出到 stderr，stdout 留给事件流；级别由 RUST_LOG 控制，默认 info
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件（覆盖旧内容并写入表头）
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n自动申请日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向日志文件追加一行
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 记录职位加载信息
pub fn log_jobs_loaded(total: usize) {
    info!("✓ 找到 {} 个待处理的职位", total);
    info!("💡 职位按顺序逐个处理，低置信度的问题会等待人工答复\n");
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &SessionSnapshot) {
    let finished = stats.completed + stats.skipped + stats.errored;
    info!("\n{}", "=".repeat(60));
    info!("📊 会话 {} 结束: {}", stats.session_id, stats.state);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.completed, finished);
    info!("⏭️ 跳过: {}", stats.skipped);
    info!("❌ 失败: {}", stats.errored);
    info!("📋 未处理: {}", stats.queued);
    info!(
        "🙋 回答问题: {} (人工 {})",
        stats.questions_answered, stats.questions_manual
    );
    info!("⏱️ 运行时间: {:.1} 秒", stats.runtime_seconds);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
