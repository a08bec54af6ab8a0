//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力：记录被留空的字段和失败的职位，供人工事后跟进

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 警告写入服务
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 创建新的警告写入服务
    pub fn new() -> Self {
        Self {
            warn_file_path: "warn.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.warn_file_path
    }

    /// 追加一行警告
    ///
    /// # 参数
    /// - `job_id`: 职位 ID
    /// - `subject`: 字段标签或职位标题
    /// - `reason`: 原因
    pub async fn write(&self, job_id: &str, subject: &str, reason: &str) -> Result<()> {
        debug!("写入警告: 职位 {} | {} | {}", job_id, subject, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await?;

        let warn_msg = format!(
            "{} | 职位 {} | {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            job_id,
            subject,
            reason
        );

        file.write_all(warn_msg.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_appends_lines() {
        let path = std::env::temp_dir().join(format!("auto_apply_warn_{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let writer = WarnWriter::with_path(path.to_string_lossy());

        writer.write("job-1", "Cover letter", "人工跳过").await.unwrap();
        writer.write("job-2", "Backend Engineer", "提交失败").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("职位 job-1 | Cover letter | 人工跳过"));
        assert!(lines[1].contains("职位 job-2"));

        let _ = std::fs::remove_file(&path);
    }
}
