//! 职位记录与单个职位的状态机状态

use serde::{Deserialize, Serialize};
use std::fmt;

/// 职位记录
///
/// 由发现模块产生，入队后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub url: String,
    /// 招聘系统提供方（greenhouse / lever 等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ats_provider: Option<String>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: company.into(),
            url: url.into(),
            ats_provider: None,
        }
    }
}

/// 单个职位流水线的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Navigating,
    Scanning,
    Answering,
    AwaitingHuman,
    Filling,
    Submitting,
    Succeeded,
    Error,
    Skipped,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Navigating => "NAVIGATING",
            JobState::Scanning => "SCANNING",
            JobState::Answering => "ANSWERING",
            JobState::AwaitingHuman => "AWAITING_HUMAN",
            JobState::Filling => "FILLING",
            JobState::Submitting => "SUBMITTING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Error => "ERROR",
            JobState::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 职位的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    /// 表单未被改动，可以安全地重新入队
    Skipped { reason: String },
    /// 已尝试填写或提交
    Errored { reason: String },
}

/// 单个职位的处理报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub outcome: JobOutcome,
    pub final_state: JobState,
    pub fields_detected: usize,
    pub fields_filled: usize,
    pub questions_asked: usize,
    pub questions_manual: usize,
    /// 被留空的字段标签
    pub skipped_fields: Vec<String>,
}

impl JobReport {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Succeeded,
            final_state: JobState::Queued,
            fields_detected: 0,
            fields_filled: 0,
            questions_asked: 0,
            questions_manual: 0,
            skipped_fields: Vec::new(),
        }
    }
}
