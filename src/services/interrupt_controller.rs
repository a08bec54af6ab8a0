//! 人工介入控制器
//!
//! 把异步到达的人工答复桥接到流水线的挂起点上：
//! 流水线 `open()` 一个请求并等待句柄，外部通过 `resolve()` 按 ID 送达答复，
//! 截止时间到期时由计时任务调用 `expire()` 应用兜底策略。
//!
//! 每个请求最多产生一个结果。请求关闭后（答复、超时或中止），
//! 任何迟到的 `resolve()` 都返回 `AlreadyClosed`，调用方能据此发现竞争。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::InterruptError;
use crate::models::{InterruptRequest, RequestId};

/// 超时兜底策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// 使用建议答案填写
    UseDefaultAnswer,
    /// 字段留空
    SkipField,
    /// 放弃整个职位
    AbortJob,
}

impl FallbackPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "use_default_answer" | "default" => Some(Self::UseDefaultAnswer),
            "skip_field" | "skip" => Some(Self::SkipField),
            "abort_job" | "abort" => Some(Self::AbortJob),
            _ => None,
        }
    }
}

/// 操作员的答复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanInput {
    Value(String),
    /// 明确跳过该字段
    Skip,
}

/// 送达流水线的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptOutcome {
    Answered(String),
    Skipped,
    /// 截止时间已过，附带应用的兜底策略
    TimedOut(FallbackPolicy),
    /// 会话停止
    Aborted,
}

/// 流水线等待的句柄
pub struct PendingInterrupt {
    id: RequestId,
    receiver: oneshot::Receiver<InterruptOutcome>,
}

impl PendingInterrupt {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// 挂起直到请求被关闭
    pub async fn wait(self) -> InterruptOutcome {
        // 控制器被丢弃等同于会话中止
        self.receiver.await.unwrap_or(InterruptOutcome::Aborted)
    }
}

struct PendingEntry {
    request: InterruptRequest,
    sender: oneshot::Sender<InterruptOutcome>,
    timer: Option<JoinHandle<()>>,
}

struct Registry {
    pending: HashMap<RequestId, PendingEntry>,
    closed: HashSet<RequestId>,
    fallback: FallbackPolicy,
}

/// 人工介入控制器
///
/// 克隆共享同一个待处理集合
#[derive(Clone)]
pub struct InterruptController {
    registry: Arc<Mutex<Registry>>,
}

impl InterruptController {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                pending: HashMap::new(),
                closed: HashSet::new(),
                fallback,
            })),
        }
    }

    /// 修改超时兜底策略（对之后到期的请求生效）
    pub fn set_fallback(&self, fallback: FallbackPolicy) {
        self.registry().fallback = fallback;
    }

    /// 新会话开始：换上新的兜底策略并忘掉上个会话已关闭的请求
    pub fn begin_session(&self, fallback: FallbackPolicy) {
        let mut registry = self.registry();
        registry.fallback = fallback;
        registry.closed.clear();
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.registry().fallback
    }

    /// 登记请求；如果有截止时间则启动计时任务
    pub fn open(&self, request: InterruptRequest) -> PendingInterrupt {
        let (sender, receiver) = oneshot::channel();
        let id = request.id.clone();
        let deadline = request.deadline;

        debug!("登记介入请求 {} (字段: {})", id, request.field_label);
        // 先登记再启动计时，计时任务到期时请求一定已在集合中
        self.registry().pending.insert(
            id.clone(),
            PendingEntry {
                request,
                sender,
                timer: None,
            },
        );

        if let Some(deadline) = deadline {
            let delay = (deadline - Utc::now()).to_std().unwrap_or_default();
            let controller = self.clone();
            let timer_id = id.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                controller.expire(&timer_id);
            });
            match self.registry().pending.get_mut(&id) {
                Some(entry) => entry.timer = Some(timer),
                None => timer.abort(),
            }
        }

        PendingInterrupt { id, receiver }
    }

    /// 送达操作员的答复
    ///
    /// # 错误
    /// - `AlreadyClosed`: 请求已被答复、超时或中止
    /// - `UnknownRequest`: 从未登记过的 ID
    pub fn resolve(&self, request_id: &RequestId, input: HumanInput) -> Result<(), InterruptError> {
        let entry = {
            let mut registry = self.registry();
            match registry.pending.remove(request_id) {
                Some(entry) => {
                    registry.closed.insert(request_id.clone());
                    entry
                }
                None if registry.closed.contains(request_id) => {
                    return Err(InterruptError::AlreadyClosed {
                        request_id: request_id.to_string(),
                    });
                }
                None => {
                    return Err(InterruptError::UnknownRequest {
                        request_id: request_id.to_string(),
                    });
                }
            }
        };

        if let Some(timer) = entry.timer {
            timer.abort();
        }

        let outcome = match input {
            HumanInput::Value(value) => InterruptOutcome::Answered(value),
            HumanInput::Skip => InterruptOutcome::Skipped,
        };
        info!("✓ 收到介入请求 {} 的人工答复", request_id);

        entry
            .sender
            .send(outcome)
            .map_err(|_| InterruptError::AlreadyClosed {
                request_id: request_id.to_string(),
            })
    }

    /// 截止时间到期：应用兜底策略
    ///
    /// 返回 false 表示请求已经被关闭
    pub fn expire(&self, request_id: &RequestId) -> bool {
        let (entry, fallback) = {
            let mut registry = self.registry();
            let Some(entry) = registry.pending.remove(request_id) else {
                return false;
            };
            registry.closed.insert(request_id.clone());
            (entry, registry.fallback)
        };

        warn!(
            "⏰ 介入请求 {} 超时，兜底策略: {:?}",
            request_id, fallback
        );
        let _ = entry.sender.send(InterruptOutcome::TimedOut(fallback));
        true
    }

    /// 中止单个请求，返回 false 表示请求已经被关闭
    pub fn abort(&self, request_id: &RequestId) -> bool {
        let entry = {
            let mut registry = self.registry();
            let Some(entry) = registry.pending.remove(request_id) else {
                return false;
            };
            registry.closed.insert(request_id.clone());
            entry
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        let _ = entry.sender.send(InterruptOutcome::Aborted);
        true
    }

    /// 中止所有待处理请求（会话停止时调用）
    pub fn abort_all(&self) -> usize {
        let entries: Vec<PendingEntry> = {
            let mut registry = self.registry();
            let ids: Vec<RequestId> = registry.pending.keys().cloned().collect();
            registry.closed.extend(ids);
            registry.pending.drain().map(|(_, entry)| entry).collect()
        };

        let count = entries.len();
        for entry in entries {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            let _ = entry.sender.send(InterruptOutcome::Aborted);
        }
        count
    }

    /// 当前待处理的请求
    pub fn pending_requests(&self) -> Vec<InterruptRequest> {
        self.registry()
            .pending
            .values()
            .map(|entry| entry.request.clone())
            .collect()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.registry().pending.contains_key(request_id)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new(FallbackPolicy::SkipField)
    }
}
