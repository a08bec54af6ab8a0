//! 协作者契约
//!
//! 编排核心只通过这些 trait 调用外部子系统，具体实现可以替换
//! （浏览器 / LLM / 测试替身）

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{load_all_job_files, Answer, FieldRequirement, Job};

/// 职位发现：每次调用产出一个有限的职位序列
#[async_trait]
pub trait JobSource: Send {
    async fn fetch_jobs(&mut self) -> Result<Vec<Job>>;
}

/// 提问时附带的职位上下文
#[derive(Debug, Clone, Default)]
pub struct QuestionContext {
    pub job_title: String,
    pub company: String,
    pub field_type: String,
}

impl QuestionContext {
    pub fn for_job(job: &Job, field: &FieldRequirement) -> Self {
        Self {
            job_title: job.title.clone(),
            company: job.company.clone(),
            field_type: field.field_type.clone(),
        }
    }
}

/// 答案查询
///
/// 失败视为答案不可用，流水线按置信度 0 处理
#[async_trait]
pub trait AnswerLookup: Send + Sync {
    async fn ask(&self, question: &str, context: &QuestionContext) -> Result<Answer>;
}

/// 页面自动化
///
/// 超时与重试由实现方负责
#[async_trait]
pub trait PageAutomation: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn scan(&self) -> Result<Vec<FieldRequirement>>;
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;
    async fn submit(&self) -> Result<()>;
    /// PNG 截图；失败不影响流程
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// 内存中的职位列表
pub struct StaticJobSource {
    jobs: Option<Vec<Job>>,
}

impl StaticJobSource {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs: Some(jobs) }
    }
}

#[async_trait]
impl JobSource for StaticJobSource {
    async fn fetch_jobs(&mut self) -> Result<Vec<Job>> {
        // 只能消费一次
        Ok(self.jobs.take().unwrap_or_default())
    }
}

/// 从文件夹中的 TOML 文件读取职位
pub struct FolderJobSource {
    folder: String,
}

impl FolderJobSource {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl JobSource for FolderJobSource {
    async fn fetch_jobs(&mut self) -> Result<Vec<Job>> {
        load_all_job_files(&self.folder).await
    }
}
