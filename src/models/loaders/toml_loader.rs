use crate::models::job::Job;
use crate::models::profile::Profile;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 职位 TOML 文件结构
#[derive(Debug, Deserialize)]
struct JobFile {
    #[serde(default)]
    jobs: Vec<Job>,
}

/// 从单个 TOML 文件加载职位列表
pub async fn load_job_file(toml_file_path: &Path) -> Result<Vec<Job>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let file: JobFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(file.jobs)
}

/// 从文件夹中加载所有职位文件
///
/// 按文件名排序，保证队列顺序稳定；单个文件解析失败只记录警告
pub async fn load_all_job_files(folder_path: &str) -> Result<Vec<Job>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut jobs = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_job_file(&path).await {
            Ok(file_jobs) => {
                tracing::info!("成功加载 {} 个职位", file_jobs.len());
                jobs.extend(file_jobs);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}

/// 加载个人资料库
pub async fn load_profile(profile_path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(profile_path)
        .await
        .with_context(|| format!("无法读取个人资料: {}", profile_path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("无法解析个人资料: {}", profile_path.display()))
}
