//! 职位处理上下文
//!
//! 封装"我正在处理本次会话的第几个职位"这一信息

use std::fmt::Display;

use crate::models::Job;

/// 职位处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    pub job: Job,

    /// 在本次会话中的序号（从1开始，仅用于日志显示）
    pub job_index: usize,
}

impl JobCtx {
    pub fn new(job: Job, job_index: usize) -> Self {
        Self { job, job_index }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[职位 {}]", self.job_index)
    }
}
