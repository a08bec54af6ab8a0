//! 会话控制器 - 编排层
//!
//! ## 职责
//!
//! 本模块是编排核心的对外入口：操作员的命令（开始 / 暂停 / 恢复 / 停止 /
//! 人工答复 / 订阅）都从这里进入。
//!
//! ## 并发模型
//!
//! - 每个会话只有一个工作任务，按队列顺序逐个运行职位流水线
//! - 控制命令只修改 `watch` 信号或介入请求集合，从不阻塞工作任务
//! - 计数器只由工作任务修改（停止命令修改会话状态除外），读取方拿快照
//!
//! ## 层次关系
//!
//! ```text
//! SessionController (处理职位队列)
//!     ↓
//! workflow::JobPipeline (处理单个职位)
//!     ↓
//! services (能力层：答案 / 页面 / 介入)
//!     ↓
//! infrastructure (基础设施：EventBus / JsExecutor)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{InterruptError, SessionError};
use crate::infrastructure::{EventBus, Subscription};
use crate::models::{
    InterruptRequest, Job, JobOutcome, LogLevel, RequestId, SessionSnapshot, SessionState,
};
use crate::services::{
    AnswerLookup, HumanInput, InterruptController, JobSource, PageAutomation, StaticJobSource,
    WarnWriter,
};
use crate::utils::{log_jobs_loaded, print_final_stats};
use crate::workflow::{
    JobCtx, JobPipeline, PipelineDeps, PipelineSettings, RunControl, SessionBook, StageGate,
};

/// 会话控制器
///
/// 克隆共享同一个会话
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    bus: EventBus,
    book: SessionBook,
    deps: PipelineDeps,
    control: watch::Sender<RunControl>,
    runtime: Mutex<Runtime>,
}

/// 当前会话的运行时句柄
#[derive(Default)]
struct Runtime {
    enqueue: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<SessionState>>,
}

impl SessionController {
    /// 创建会话控制器
    ///
    /// # 参数
    /// - `answers`: 答案服务
    /// - `page`: 页面自动化
    /// - `event_buffer`: 每个订阅者的事件缓冲区大小
    pub fn new(
        answers: Arc<dyn AnswerLookup>,
        page: Arc<dyn PageAutomation>,
        event_buffer: usize,
    ) -> Self {
        Self::with_deps(
            PipelineDeps::new(answers, page, InterruptController::default()),
            event_buffer,
        )
    }

    /// 使用已组装好的依赖创建（例如附带 WarnWriter）
    pub fn with_deps(deps: PipelineDeps, event_buffer: usize) -> Self {
        let bus = EventBus::new("idle", event_buffer);
        let book = SessionBook::new(bus.clone());
        let (control, _) = watch::channel(RunControl::Running);
        Self {
            shared: Arc::new(Shared {
                bus,
                book,
                deps,
                control,
                runtime: Mutex::new(Runtime::default()),
            }),
        }
    }

    /// 附带 warn.txt 记录
    pub fn with_warn_writer(
        answers: Arc<dyn AnswerLookup>,
        page: Arc<dyn PageAutomation>,
        event_buffer: usize,
        warn_writer: WarnWriter,
    ) -> Self {
        Self::with_deps(
            PipelineDeps::new(answers, page, InterruptController::default())
                .with_warn_writer(warn_writer),
            event_buffer,
        )
    }

    /// 以给定职位列表开始会话，返回会话 ID
    pub fn start(&self, jobs: Vec<Job>, config: SessionConfig) -> Result<String, SessionError> {
        self.start_with_source(Box::new(StaticJobSource::new(jobs)), config)
    }

    /// 以职位来源开始会话，返回会话 ID
    ///
    /// 必须在 tokio 运行时内调用
    pub fn start_with_source(
        &self,
        source: Box<dyn JobSource>,
        config: SessionConfig,
    ) -> Result<String, SessionError> {
        let mut runtime = self.runtime();
        let session_id = Uuid::new_v4().to_string();
        self.shared
            .book
            .begin(&session_id)
            .map_err(|running| SessionError::AlreadyRunning {
                session_id: running,
            })?;

        self.shared.control.send_replace(RunControl::Running);
        self.shared
            .deps
            .interrupts
            .begin_session(config.timeout_fallback);

        let (enqueue_tx, enqueue_rx) = mpsc::unbounded_channel();
        let gate = StageGate::new(self.shared.control.subscribe(), self.shared.book.clone());
        let worker = SessionWorker {
            shared: self.shared.clone(),
            settings: PipelineSettings::from(&config),
            gate,
            enqueue_rx,
        };

        runtime.enqueue = Some(enqueue_tx);
        runtime.worker = Some(tokio::spawn(worker.run(source)));

        info!("🚀 会话 {} 已开始", session_id);
        Ok(session_id)
    }

    /// 请求暂停：在下一个阶段边界生效
    pub fn pause(&self) -> Result<(), SessionError> {
        match self.shared.book.state() {
            SessionState::Running | SessionState::Paused => {
                self.shared.control.send_if_modified(|control| {
                    if *control == RunControl::Running {
                        *control = RunControl::Paused;
                        true
                    } else {
                        false
                    }
                });
                self.shared
                    .bus
                    .log(LogLevel::Info, None, "⏸ 已请求暂停，将在阶段边界生效");
                Ok(())
            }
            _ => Err(SessionError::NotRunning),
        }
    }

    /// 恢复暂停的会话
    pub fn resume(&self) -> Result<(), SessionError> {
        match self.shared.book.state() {
            SessionState::Running | SessionState::Paused => {
                self.shared.control.send_if_modified(|control| {
                    if *control == RunControl::Paused {
                        *control = RunControl::Running;
                        true
                    } else {
                        false
                    }
                });
                Ok(())
            }
            _ => Err(SessionError::NotRunning),
        }
    }

    /// 请求停止
    ///
    /// 正在等待人工答复的请求立即中止，当前职位在下一个阶段边界结束，
    /// 剩余职位留在队列中
    pub fn stop(&self) -> Result<(), SessionError> {
        let from = self.shared.book.transition_if(
            |s| matches!(s, SessionState::Running | SessionState::Paused),
            SessionState::Stopping,
        );
        if from.is_none() {
            return match self.shared.book.state() {
                SessionState::Stopping => Ok(()),
                _ => Err(SessionError::NotRunning),
            };
        }

        // 先置信号再中止请求，流水线登记请求后会检查信号
        self.shared.control.send_replace(RunControl::Stopping);
        let aborted = self.shared.deps.interrupts.abort_all();
        self.shared.bus.log(
            LogLevel::Warn,
            None,
            format!("⏹ 已请求停止，中止 {} 个待答复的问题", aborted),
        );
        Ok(())
    }

    /// 送达人工答复
    pub fn resolve_interrupt(
        &self,
        request_id: &RequestId,
        input: HumanInput,
    ) -> Result<(), InterruptError> {
        self.shared.deps.interrupts.resolve(request_id, input)
    }

    /// 当前等待答复的问题
    pub fn pending_interrupts(&self) -> Vec<InterruptRequest> {
        self.shared.deps.interrupts.pending_requests()
    }

    /// 向运行中的会话追加职位
    pub fn enqueue(&self, job: Job) -> Result<(), SessionError> {
        let runtime = self.runtime();
        if !matches!(
            self.shared.book.state(),
            SessionState::Running | SessionState::Paused
        ) {
            return Err(SessionError::NotRunning);
        }
        let sender = runtime.enqueue.as_ref().ok_or(SessionError::NotRunning)?;
        sender.send(job).map_err(|_| SessionError::NotRunning)
    }

    /// 会话快照
    pub fn status(&self) -> SessionSnapshot {
        self.shared.book.snapshot()
    }

    /// 订阅事件流，第一个事件是当前快照
    pub fn subscribe(&self) -> Subscription {
        self.shared.book.subscribe()
    }

    /// 事件总线（用于外部发布日志）
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// 等待当前会话结束，返回最终状态
    ///
    /// 没有会话或已被等待过时返回 None
    pub async fn join(&self) -> Option<SessionState> {
        let worker = self.runtime().worker.take()?;
        match worker.await {
            Ok(state) => Some(state),
            Err(e) => {
                error!("会话工作任务异常退出: {}", e);
                self.shared.book.transition(SessionState::Failed);
                Some(SessionState::Failed)
            }
        }
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.shared
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 会话工作任务
struct SessionWorker {
    shared: Arc<Shared>,
    settings: PipelineSettings,
    gate: StageGate,
    enqueue_rx: mpsc::UnboundedReceiver<Job>,
}

impl SessionWorker {
    async fn run(mut self, mut source: Box<dyn JobSource>) -> SessionState {
        let book = self.shared.book.clone();
        let bus = self.shared.bus.clone();

        bus.log(LogLevel::Info, None, "📁 正在读取职位队列...");
        let jobs = match source.fetch_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                let err = SessionError::QueueUnavailable {
                    message: e.to_string(),
                };
                bus.log(LogLevel::Error, None, format!("❌ {}", err));
                return self.finish(SessionState::Failed);
            }
        };

        let mut queue: VecDeque<Job> = jobs.into();
        book.update(|s| s.queued = queue.len());
        log_jobs_loaded(queue.len());
        book.publish_stats();

        let mut job_index = 0;
        loop {
            while let Ok(job) = self.enqueue_rx.try_recv() {
                bus.log(
                    LogLevel::Info,
                    Some(&job.id),
                    format!("➕ 追加职位: {} @ {}", job.title, job.company),
                );
                queue.push_back(job);
                book.update(|s| s.queued += 1);
            }

            // 职位之间也是阶段边界
            if self.gate.checkpoint().await.is_err() {
                break;
            }
            let Some(job) = queue.pop_front() else {
                break;
            };

            job_index += 1;
            book.update(|s| {
                s.queued = s.queued.saturating_sub(1);
                s.current_job_id = Some(job.id.clone());
            });

            let report = JobPipeline::new(
                &self.shared.deps,
                &self.settings,
                &book,
                &mut self.gate,
                JobCtx::new(job, job_index),
            )
            .run()
            .await;

            book.update(|s| {
                match &report.outcome {
                    JobOutcome::Succeeded => s.completed += 1,
                    JobOutcome::Skipped { .. } => s.skipped += 1,
                    JobOutcome::Errored { .. } => s.errored += 1,
                }
                s.current_job_id = None;
            });
            book.publish_stats();
        }

        let final_state = if self.gate.is_stopping() {
            SessionState::Stopped
        } else {
            SessionState::Completed
        };
        self.finish(final_state)
    }

    fn finish(&mut self, final_state: SessionState) -> SessionState {
        let book = &self.shared.book;
        self.enqueue_rx.close();
        book.update(|s| {
            let runtime = s.started_at.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
            s.finished_runtime_secs = Some(runtime);
            s.pending_prompt = None;
        });
        if book.transition(final_state).is_none() {
            warn!("会话状态已经是 {}", final_state);
        }
        book.publish_stats();
        print_final_stats(&book.snapshot());
        final_state
    }
}
