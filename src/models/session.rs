use serde::Serialize;
use std::fmt;

use crate::models::interrupt::RequestId;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    /// 已请求停止，等待当前职位结束
    Stopping,
    /// 队列处理完毕
    Completed,
    /// 操作员停止
    Stopped,
    /// 会话级故障（例如职位队列无法读取）
    Failed,
}

impl SessionState {
    /// 是否有活动会话
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Running | SessionState::Paused | SessionState::Stopping
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Running => "RUNNING",
            SessionState::Paused => "PAUSED",
            SessionState::Stopping => "STOPPING",
            SessionState::Completed => "COMPLETED",
            SessionState::Stopped => "STOPPED",
            SessionState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 正在等待人工答复的问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPrompt {
    pub request_id: RequestId,
    pub field: String,
    pub prompt: String,
}

/// 会话计数器
///
/// 只由会话的工作任务修改，读取方通过快照访问
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub session_id: String,
    pub state: SessionState,
    pub current_job_id: Option<String>,
    pub completed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub queued: usize,
    pub questions_answered: usize,
    pub questions_manual: usize,
    pub pending_prompt: Option<PendingPrompt>,
    pub started_at: Option<std::time::Instant>,
    pub finished_runtime_secs: Option<f64>,
}

impl SessionStats {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::Idle,
            current_job_id: None,
            completed: 0,
            skipped: 0,
            errored: 0,
            queued: 0,
            questions_answered: 0,
            questions_manual: 0,
            pending_prompt: None,
            started_at: None,
            finished_runtime_secs: None,
        }
    }

    /// 生成只读快照
    pub fn snapshot(&self) -> SessionSnapshot {
        let runtime_seconds = match (self.finished_runtime_secs, self.started_at) {
            (Some(secs), _) => secs,
            (None, Some(started)) => started.elapsed().as_secs_f64(),
            (None, None) => 0.0,
        };
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            current_job_id: self.current_job_id.clone(),
            completed: self.completed,
            skipped: self.skipped,
            errored: self.errored,
            queued: self.queued,
            questions_answered: self.questions_answered,
            questions_manual: self.questions_manual,
            pending_prompt: self.pending_prompt.clone(),
            runtime_seconds,
        }
    }
}

/// 会话快照（只读视图）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub current_job_id: Option<String>,
    pub completed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub queued: usize,
    pub questions_answered: usize,
    pub questions_manual: usize,
    pub pending_prompt: Option<PendingPrompt>,
    pub runtime_seconds: f64,
}
