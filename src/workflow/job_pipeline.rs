//! 职位处理流程 - 流程层
//!
//! 核心职责：定义"一个职位"的完整处理流程
//!
//! 流程顺序：
//! 1. NAVIGATING → SCANNING → ANSWERING（逐字段，必要时 AWAITING_HUMAN）
//! 2. FILLING → SUBMITTING → SUCCEEDED
//! 3. 任一阶段失败 → ERROR（表单未被改动时继续 → SKIPPED）
//!
//! 暂停和停止只在阶段之间生效（见 `StageGate`）。
//! 答案在 ANSWERING 阶段就确定下来，FILLING 阶段按扫描顺序一次性写入页面，
//! 所以在 FILLING 之前停止的职位不会留下半填的表单。

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{AppError, AppResult, AnswerError, InterruptError, SessionError, StageError};
use crate::models::{
    Answer, EventBody, FieldRequirement, InterruptRequest, JobOutcome, JobReport, JobState,
    LogLevel, PendingPrompt, RequestId, StateChange,
};
use crate::services::{
    AnswerLookup, ConfidencePolicy, Decision, FallbackPolicy, InterruptController,
    InterruptOutcome, PageAutomation, QuestionContext, WarnWriter,
};
use crate::utils::truncate_text;
use crate::workflow::job_ctx::JobCtx;
use crate::workflow::session_book::SessionBook;
use crate::workflow::stage_gate::StageGate;

/// 流水线依赖的外部能力
///
/// 不持有任何资源本身，只持有能力的共享引用
#[derive(Clone)]
pub struct PipelineDeps {
    pub answers: Arc<dyn AnswerLookup>,
    pub page: Arc<dyn PageAutomation>,
    pub interrupts: InterruptController,
    /// 被留空的字段和失败的职位写入 warn.txt
    pub warn_writer: Option<Arc<WarnWriter>>,
}

impl PipelineDeps {
    pub fn new(
        answers: Arc<dyn AnswerLookup>,
        page: Arc<dyn PageAutomation>,
        interrupts: InterruptController,
    ) -> Self {
        Self {
            answers,
            page,
            interrupts,
            warn_writer: None,
        }
    }

    pub fn with_warn_writer(mut self, warn_writer: WarnWriter) -> Self {
        self.warn_writer = Some(Arc::new(warn_writer));
        self
    }
}

/// 单个会话内不变的流水线设置
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub policy: ConfidencePolicy,
    pub interrupt_timeout: Option<Duration>,
    pub dry_run: bool,
    pub capture_screenshots: bool,
}

impl From<&SessionConfig> for PipelineSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            policy: ConfidencePolicy::new(config.confidence_threshold),
            interrupt_timeout: config.interrupt_timeout,
            dry_run: config.dry_run,
            capture_screenshots: config.capture_screenshots,
        }
    }
}

/// 待写入页面的答案
struct PlannedFill {
    field: FieldRequirement,
    value: String,
}

/// 职位处理流程
///
/// - 一次只处理一个职位，处理完即消耗
/// - 状态迁移都通过 `transition()` 发布事件
/// - 只依赖契约（AnswerLookup / PageAutomation），不关心具体实现
pub struct JobPipeline<'a> {
    deps: &'a PipelineDeps,
    settings: &'a PipelineSettings,
    book: &'a SessionBook,
    gate: &'a mut StageGate,
    ctx: JobCtx,
    state: JobState,
    report: JobReport,
    /// 是否已尝试写入页面（填写或提交）
    form_touched: bool,
}

impl<'a> JobPipeline<'a> {
    pub fn new(
        deps: &'a PipelineDeps,
        settings: &'a PipelineSettings,
        book: &'a SessionBook,
        gate: &'a mut StageGate,
        ctx: JobCtx,
    ) -> Self {
        let report = JobReport::new(ctx.job_id());
        Self {
            deps,
            settings,
            book,
            gate,
            ctx,
            state: JobState::Queued,
            report,
            form_touched: false,
        }
    }

    /// 运行流水线直到终止状态
    pub async fn run(mut self) -> JobReport {
        self.log(
            LogLevel::Info,
            format!(
                "🚀 开始处理: {} @ {}",
                self.ctx.job.title, self.ctx.job.company
            ),
        );

        match self.drive().await {
            Ok(()) => {
                self.transition(JobState::Succeeded);
                self.report.outcome = JobOutcome::Succeeded;
                self.log(LogLevel::Info, "✅ 申请完成".to_string());
            }
            Err(err) => self.fail(err).await,
        }

        self.report.final_state = self.state;
        self.report
    }

    async fn drive(&mut self) -> AppResult<()> {
        // ========== 阶段 1: 导航 ==========
        self.transition(JobState::Navigating);
        let url = self.ctx.job.url.clone();
        self.deps
            .page
            .navigate(&url)
            .await
            .map_err(|e| AppError::navigation(&url, e))?;
        self.capture_screenshot().await;
        self.gate.checkpoint().await?;

        // ========== 阶段 2: 扫描 ==========
        self.transition(JobState::Scanning);
        let fields = self.deps.page.scan().await.map_err(AppError::scan)?;
        self.report.fields_detected = fields.len();
        let (answerable, ignored): (Vec<FieldRequirement>, Vec<FieldRequirement>) =
            fields.into_iter().partition(|f| f.is_answerable());
        for field in &ignored {
            let name = if field.label.trim().is_empty() {
                &field.selector
            } else {
                &field.label
            };
            self.log(
                LogLevel::Info,
                format!("忽略字段 {} (类型 {})", name, field.field_type),
            );
        }
        self.log(
            LogLevel::Info,
            format!(
                "✓ 扫描到 {} 个字段，其中 {} 个需要回答",
                self.report.fields_detected,
                answerable.len()
            ),
        );
        self.gate.checkpoint().await?;

        // ========== 阶段 3: 回答 ==========
        let mut plan = Vec::new();
        if !answerable.is_empty() {
            self.transition(JobState::Answering);
            for (i, field) in answerable.into_iter().enumerate() {
                if i > 0 {
                    self.gate.checkpoint().await?;
                }
                match self.resolve_field(&field).await? {
                    Some(value) => plan.push(PlannedFill { field, value }),
                    None => self.skip_field(&field).await,
                }
            }
            self.gate.checkpoint().await?;
        }

        // ========== 阶段 4: 填写 ==========
        if !plan.is_empty() {
            self.transition(JobState::Filling);
            for fill in &plan {
                self.form_touched = true;
                self.deps
                    .page
                    .fill(&fill.field.selector, &fill.value)
                    .await
                    .map_err(|e| AppError::fill(&fill.field.selector, e))?;
                self.report.fields_filled += 1;
            }
            self.log(
                LogLevel::Info,
                format!("✓ 已填写 {} 个字段", self.report.fields_filled),
            );
            self.capture_screenshot().await;
            self.gate.checkpoint().await?;
        }

        // ========== 阶段 5: 提交 ==========
        self.transition(JobState::Submitting);
        if self.settings.dry_run {
            self.log(LogLevel::Info, "🧪 演练模式，跳过提交".to_string());
        } else {
            self.form_touched = true;
            self.deps
                .page
                .submit()
                .await
                .map_err(AppError::submission)?;
            self.log(LogLevel::Info, "📤 申请已提交".to_string());
        }
        self.capture_screenshot().await;

        Ok(())
    }

    /// 为单个字段取得答案
    ///
    /// 返回 None 表示字段留空
    async fn resolve_field(&mut self, field: &FieldRequirement) -> AppResult<Option<String>> {
        self.report.questions_asked += 1;
        let context = QuestionContext::for_job(&self.ctx.job, field);

        let answer = match self.deps.answers.ask(&field.label, &context).await {
            Ok(answer) => answer,
            Err(source) => {
                let err = AnswerError::Unavailable {
                    question: field.label.clone(),
                    source,
                };
                self.log(LogLevel::Warn, format!("⚠️ {}，转人工", err));
                // 无论阈值多低都不自动填写空答案
                return self.escalate(field, Answer::unavailable()).await;
            }
        };

        match self.settings.policy.decide(answer.confidence) {
            Decision::AutoFill => {
                debug!(
                    "{} 自动填写 '{}' = {} (置信度 {:.2}, 来源 {:?})",
                    self.ctx,
                    field.label,
                    truncate_text(&answer.text, 40),
                    answer.confidence,
                    answer.source_tag
                );
                self.book.update(|s| s.questions_answered += 1);
                Ok(Some(answer.text))
            }
            Decision::Escalate => self.escalate(field, answer).await,
        }
    }

    /// 低置信度：挂起等待人工答复
    async fn escalate(
        &mut self,
        field: &FieldRequirement,
        suggestion: Answer,
    ) -> AppResult<Option<String>> {
        self.log(
            LogLevel::Warn,
            format!(
                "🙋 '{}' 置信度 {:.2} 低于阈值 {:.2}，等待人工答复",
                field.label,
                suggestion.confidence,
                self.settings.policy.threshold()
            ),
        );

        let deadline = self
            .settings
            .interrupt_timeout
            .and_then(|timeout| chrono::Duration::from_std(timeout).ok())
            .map(|timeout| Utc::now() + timeout);
        let request = InterruptRequest {
            id: RequestId::generate(),
            job_id: self.ctx.job_id().to_string(),
            field_selector: field.selector.clone(),
            field_label: field.label.clone(),
            prompt: build_prompt(&self.ctx, field, &suggestion.text),
            default_answer: suggestion.text.clone(),
            deadline,
        };
        let request_id = request.id.clone();
        let pending = self.deps.interrupts.open(request.clone());

        // 登记之后才检查停止信号：stop() 先置信号再中止所有请求
        if self.gate.is_stopping() && self.deps.interrupts.abort(&request_id) {
            debug!("{} 会话正在停止，介入请求 {} 未发布", self.ctx, request_id);
            return Err(SessionError::Aborted.into());
        }

        self.book.update(|s| {
            s.pending_prompt = Some(PendingPrompt {
                request_id: request.id.clone(),
                field: request.field_label.clone(),
                prompt: request.prompt.clone(),
            })
        });
        self.book.bus().publish(EventBody::RequestInput {
            request_id: request.id.clone(),
            job_id: request.job_id.clone(),
            field: request.field_label.clone(),
            prompt: request.prompt.clone(),
            default_answer: request.default_answer.clone(),
            deadline: request.deadline,
        });
        self.transition(JobState::AwaitingHuman);

        let outcome = pending.wait().await;
        self.book.update(|s| s.pending_prompt = None);

        let value = match outcome {
            InterruptOutcome::Answered(value) => {
                self.report.questions_manual += 1;
                self.book.update(|s| {
                    s.questions_answered += 1;
                    s.questions_manual += 1;
                });
                self.log(LogLevel::Info, format!("✓ '{}' 已收到人工答复", field.label));
                Some(value)
            }
            InterruptOutcome::Skipped => {
                self.log(LogLevel::Info, format!("'{}' 已被人工跳过", field.label));
                None
            }
            InterruptOutcome::TimedOut(FallbackPolicy::UseDefaultAnswer)
                if !suggestion.text.trim().is_empty() =>
            {
                self.log(
                    LogLevel::Warn,
                    format!("⏰ '{}' 等待超时，使用建议答案", field.label),
                );
                self.book.update(|s| s.questions_answered += 1);
                Some(suggestion.text)
            }
            InterruptOutcome::TimedOut(FallbackPolicy::AbortJob) => {
                return Err(InterruptError::Timeout {
                    request_id: request_id.to_string(),
                }
                .into());
            }
            InterruptOutcome::TimedOut(_) => {
                self.log(
                    LogLevel::Warn,
                    format!("⏰ '{}' 等待超时，字段留空", field.label),
                );
                None
            }
            InterruptOutcome::Aborted => return Err(SessionError::Aborted.into()),
        };

        self.transition(JobState::Answering);
        Ok(value)
    }

    /// 字段留空并记录
    async fn skip_field(&mut self, field: &FieldRequirement) {
        self.report.skipped_fields.push(field.label.clone());
        if let Some(writer) = &self.deps.warn_writer {
            if let Err(e) = writer
                .write(self.ctx.job_id(), &field.label, "字段留空")
                .await
            {
                warn!("{} 写入 warn.txt 失败: {}", self.ctx, e);
            }
        }
    }

    /// 失败处理：先发日志事件再迁移状态
    async fn fail(&mut self, err: AppError) {
        let reason = err.to_string();
        let level = if err.is_aborted() {
            LogLevel::Warn
        } else {
            LogLevel::Error
        };
        self.log(level, format!("❌ {}", reason));
        self.transition(JobState::Error);

        let recoverable = !self.form_touched
            && !matches!(
                err,
                AppError::Stage(StageError::Fill { .. } | StageError::Submission { .. })
            );
        if recoverable {
            self.transition(JobState::Skipped);
            self.report.outcome = JobOutcome::Skipped { reason };
        } else {
            self.report.outcome = JobOutcome::Errored {
                reason: reason.clone(),
            };
            if let Some(writer) = &self.deps.warn_writer {
                if let Err(e) = writer
                    .write(self.ctx.job_id(), &self.ctx.job.title, &reason)
                    .await
                {
                    warn!("{} 写入 warn.txt 失败: {}", self.ctx, e);
                }
            }
        }
    }

    /// 截图并发布，失败只记日志
    async fn capture_screenshot(&self) {
        if !self.settings.capture_screenshots {
            return;
        }
        match self.deps.page.screenshot().await {
            Ok(bytes) if !bytes.is_empty() => {
                self.book.bus().publish(EventBody::Screenshot {
                    job_id: self.ctx.job_id().to_string(),
                    image: BASE64_STANDARD.encode(bytes),
                });
            }
            Ok(_) => {}
            Err(e) => debug!("{} 截图失败: {}", self.ctx, e),
        }
    }

    fn transition(&mut self, to: JobState) {
        let from = self.state;
        self.state = to;
        info!("{} {} → {}", self.ctx, from, to);
        self.book.bus().publish(EventBody::State(StateChange::Job {
            job_id: self.ctx.job_id().to_string(),
            from_state: from,
            to_state: to,
        }));
    }

    fn log(&self, level: LogLevel, message: String) {
        self.book.bus().log(
            level,
            Some(self.ctx.job_id()),
            format!("{} {}", self.ctx, message),
        );
    }
}

/// 操作员看到的问题文本
fn build_prompt(ctx: &JobCtx, field: &FieldRequirement, suggestion: &str) -> String {
    let required = if field.required { "（必填）" } else { "" };
    let mut prompt = format!(
        "{} @ {}\n{}{} [{}]",
        ctx.job.title, ctx.job.company, field.label, required, field.field_type
    );
    if !suggestion.trim().is_empty() {
        prompt.push_str(&format!("\n建议答案: {}", suggestion));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{EventBus, Subscription};
    use crate::models::{Event, Job, SourceTag};
    use crate::workflow::stage_gate::RunControl;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// 按标签返回固定答案
    struct MapAnswers(HashMap<String, Answer>);

    #[async_trait]
    impl AnswerLookup for MapAnswers {
        async fn ask(&self, question: &str, _context: &QuestionContext) -> Result<Answer> {
            self.0
                .get(question)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no answer for {}", question))
        }
    }

    /// 记录调用的页面替身
    #[derive(Default)]
    struct RecordingPage {
        fields: Vec<FieldRequirement>,
        fail_scan: bool,
        fail_fill: bool,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingPage {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageAutomation for RecordingPage {
        async fn navigate(&self, url: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("navigate {}", url));
            Ok(())
        }
        async fn scan(&self) -> Result<Vec<FieldRequirement>> {
            if self.fail_scan {
                anyhow::bail!("scan timeout");
            }
            Ok(self.fields.clone())
        }
        async fn fill(&self, selector: &str, value: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fill {}={}", selector, value));
            if self.fail_fill {
                anyhow::bail!("element detached");
            }
            Ok(())
        }
        async fn submit(&self) -> Result<()> {
            self.calls.lock().unwrap().push("submit".to_string());
            Ok(())
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(vec![0x89, 0x50, 0x4e, 0x47])
        }
    }

    struct Harness {
        deps: PipelineDeps,
        settings: PipelineSettings,
        book: SessionBook,
        gate: StageGate,
        _control: watch::Sender<RunControl>,
        events: Subscription,
    }

    fn harness(page: RecordingPage, answers: Vec<(&str, Answer)>) -> (Harness, Arc<RecordingPage>) {
        let bus = EventBus::new("s1", 256);
        let book = SessionBook::new(bus.clone());
        book.begin("s1").unwrap();
        let events = bus.subscribe(book.snapshot());
        let (control, rx) = watch::channel(RunControl::Running);
        let page = Arc::new(page);
        let answers = answers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let deps = PipelineDeps::new(
            Arc::new(MapAnswers(answers)),
            page.clone(),
            InterruptController::new(FallbackPolicy::SkipField),
        );
        let settings = PipelineSettings::from(&SessionConfig {
            interrupt_timeout: None,
            ..SessionConfig::default()
        });
        (
            Harness {
                deps,
                settings,
                gate: StageGate::new(rx, book.clone()),
                book,
                _control: control,
                events,
            },
            page,
        )
    }

    fn job() -> Job {
        Job::new("job-1", "Backend Engineer", "Example", "https://jobs.example/1")
    }

    fn job_states(events: &mut Subscription) -> Vec<JobState> {
        let mut states = Vec::new();
        while let Some(Event { body, .. }) = events.try_recv() {
            if let EventBody::State(StateChange::Job { to_state, .. }) = body {
                states.push(to_state);
            }
        }
        states
    }

    #[tokio::test]
    async fn test_high_confidence_fields_fill_in_scan_order() {
        let page = RecordingPage {
            fields: vec![
                FieldRequirement::new("#name", "Full name", "text"),
                FieldRequirement::new("#go", "Apply", "submit"),
                FieldRequirement::new("#email", "Email", "email"),
            ],
            ..RecordingPage::default()
        };
        let (mut h, page) = harness(
            page,
            vec![
                ("Full name", Answer::new("Ada", 0.95, SourceTag::Static)),
                ("Email", Answer::new("ada@example.com", 0.9, SourceTag::Static)),
            ],
        );

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.fields_detected, 3);
        assert_eq!(report.fields_filled, 2);
        assert_eq!(
            page.calls(),
            vec![
                "navigate https://jobs.example/1",
                "fill #name=Ada",
                "fill #email=ada@example.com",
                "submit",
            ]
        );
        assert_eq!(
            job_states(&mut h.events),
            vec![
                JobState::Navigating,
                JobState::Scanning,
                JobState::Answering,
                JobState::Filling,
                JobState::Submitting,
                JobState::Succeeded,
            ]
        );
        assert_eq!(h.book.snapshot().questions_answered, 2);
    }

    #[tokio::test]
    async fn test_scan_failure_skips_without_touching_form() {
        let page = RecordingPage {
            fail_scan: true,
            ..RecordingPage::default()
        };
        let (mut h, page) = harness(page, vec![]);

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert!(matches!(report.outcome, JobOutcome::Skipped { .. }));
        assert_eq!(report.final_state, JobState::Skipped);
        assert!(page.calls().iter().all(|c| !c.starts_with("fill")));

        // 错误日志先于 ERROR 状态事件
        let mut saw_error_log = false;
        while let Some(event) = h.events.try_recv() {
            match event.body {
                EventBody::Log {
                    level: LogLevel::Error,
                    ..
                } => saw_error_log = true,
                EventBody::State(StateChange::Job {
                    to_state: JobState::Error,
                    ..
                }) => {
                    assert!(saw_error_log);
                }
                _ => {}
            }
        }
        assert!(saw_error_log);
    }

    #[tokio::test]
    async fn test_fill_failure_is_terminal_error() {
        let page = RecordingPage {
            fields: vec![FieldRequirement::new("#name", "Full name", "text")],
            fail_fill: true,
            ..RecordingPage::default()
        };
        let (mut h, _page) = harness(
            page,
            vec![("Full name", Answer::new("Ada", 0.95, SourceTag::Static))],
        );

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert!(matches!(report.outcome, JobOutcome::Errored { .. }));
        assert_eq!(report.final_state, JobState::Error);
    }

    #[tokio::test]
    async fn test_empty_form_goes_straight_to_submit() {
        let (mut h, page) = harness(RecordingPage::default(), vec![]);

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(
            job_states(&mut h.events),
            vec![
                JobState::Navigating,
                JobState::Scanning,
                JobState::Submitting,
                JobState::Succeeded,
            ]
        );
        assert_eq!(page.calls().last().map(String::as_str), Some("submit"));
    }

    #[tokio::test]
    async fn test_dry_run_never_submits() {
        let (mut h, page) = harness(RecordingPage::default(), vec![]);
        h.settings.dry_run = true;

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert!(!page.calls().contains(&"submit".to_string()));
    }

    #[tokio::test]
    async fn test_low_confidence_waits_for_operator() {
        let page = RecordingPage {
            fields: vec![FieldRequirement::new("#why", "Why us?", "textarea")],
            ..RecordingPage::default()
        };
        let (mut h, page) = harness(
            page,
            vec![("Why us?", Answer::new("Because", 0.4, SourceTag::Generative))],
        );
        let interrupts = h.deps.interrupts.clone();

        let operator = tokio::spawn(async move {
            loop {
                if let Some(request) = interrupts.pending_requests().pop() {
                    assert_eq!(request.default_answer, "Because");
                    interrupts
                        .resolve(&request.id, crate::services::HumanInput::Value("Mission".into()))
                        .unwrap();
                    break;
                }
                tokio::task::yield_now().await;
            }
        });

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;
        operator.await.unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.questions_manual, 1);
        assert!(page.calls().contains(&"fill #why=Mission".to_string()));
        assert!(job_states(&mut h.events).contains(&JobState::AwaitingHuman));
        let stats = h.book.snapshot();
        assert_eq!(stats.questions_manual, 1);
        assert!(stats.pending_prompt.is_none());
    }

    #[tokio::test]
    async fn test_failed_lookup_escalates_even_at_zero_threshold() {
        let page = RecordingPage {
            fields: vec![FieldRequirement::new("#why", "Why us?", "textarea")],
            ..RecordingPage::default()
        };
        let (mut h, page) = harness(page, vec![]);
        h.settings.policy = ConfidencePolicy::new(0.0);
        let interrupts = h.deps.interrupts.clone();

        let operator = tokio::spawn(async move {
            loop {
                if let Some(request) = interrupts.pending_requests().pop() {
                    assert_eq!(request.default_answer, "");
                    interrupts
                        .resolve(&request.id, crate::services::HumanInput::Value("Mission".into()))
                        .unwrap();
                    break;
                }
                tokio::task::yield_now().await;
            }
        });

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;
        operator.await.unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert!(page.calls().contains(&"fill #why=Mission".to_string()));
        assert!(!page.calls().contains(&"fill #why=".to_string()));

        let mut saw_request = false;
        while let Some(event) = h.events.try_recv() {
            if let EventBody::RequestInput { field, .. } = event.body {
                assert_eq!(field, "Why us?");
                saw_request = true;
            }
        }
        assert!(saw_request);
    }

    /// 回答问题的同时发出停止信号
    struct StopWhileAsking(Arc<watch::Sender<RunControl>>);

    #[async_trait]
    impl AnswerLookup for StopWhileAsking {
        async fn ask(&self, _question: &str, _context: &QuestionContext) -> Result<Answer> {
            self.0.send_replace(RunControl::Stopping);
            Ok(Answer::new("Because", 0.4, SourceTag::Generative))
        }
    }

    #[tokio::test]
    async fn test_stop_before_escalation_publishes_no_request() {
        let bus = EventBus::new("s1", 256);
        let book = SessionBook::new(bus.clone());
        book.begin("s1").unwrap();
        let mut events = bus.subscribe(book.snapshot());
        let (control, rx) = watch::channel(RunControl::Running);
        let control = Arc::new(control);
        let page = Arc::new(RecordingPage {
            fields: vec![FieldRequirement::new("#why", "Why us?", "textarea")],
            ..RecordingPage::default()
        });
        let interrupts = InterruptController::new(FallbackPolicy::SkipField);
        let deps = PipelineDeps::new(
            Arc::new(StopWhileAsking(control.clone())),
            page.clone(),
            interrupts.clone(),
        );
        let settings = PipelineSettings::from(&SessionConfig::default());
        let mut gate = StageGate::new(rx, book.clone());

        let report = JobPipeline::new(&deps, &settings, &book, &mut gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert!(matches!(report.outcome, JobOutcome::Skipped { .. }));
        assert!(interrupts.pending_requests().is_empty());
        assert!(book.snapshot().pending_prompt.is_none());
        assert!(page.calls().iter().all(|c| !c.starts_with("fill")));
        while let Some(event) = events.try_recv() {
            assert!(!matches!(event.body, EventBody::RequestInput { .. }));
            assert!(!matches!(
                event.body,
                EventBody::State(StateChange::Job {
                    to_state: JobState::AwaitingHuman,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_prompt_carries_type_and_suggestion() {
        let mut field = FieldRequirement::new("#why", "Why us?", "textarea");
        field.required = true;
        let prompt = build_prompt(&JobCtx::new(job(), 1), &field, "Because");
        assert!(prompt.starts_with("Backend Engineer @ Example"));
        assert!(prompt.contains("Why us?（必填） [textarea]"));
        assert!(prompt.ends_with("建议答案: Because"));

        let bare = build_prompt(&JobCtx::new(job(), 1), &field, "  ");
        assert!(!bare.contains("建议答案"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_abort_policy_skips_job() {
        let page = RecordingPage {
            fields: vec![FieldRequirement::new("#why", "Why us?", "textarea")],
            ..RecordingPage::default()
        };
        let (mut h, page) = harness(page, vec![]);
        h.deps.interrupts.set_fallback(FallbackPolicy::AbortJob);
        h.settings.interrupt_timeout = Some(Duration::from_secs(5));

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert!(matches!(report.outcome, JobOutcome::Skipped { .. }));
        assert!(page.calls().iter().all(|c| !c.starts_with("fill")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_skip_policy_leaves_field_blank() {
        let page = RecordingPage {
            fields: vec![FieldRequirement::new("#why", "Why us?", "textarea")],
            ..RecordingPage::default()
        };
        let (mut h, _page) = harness(page, vec![]);
        h.settings.interrupt_timeout = Some(Duration::from_secs(5));

        let report = JobPipeline::new(&h.deps, &h.settings, &h.book, &mut h.gate, JobCtx::new(job(), 1))
            .run()
            .await;

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.skipped_fields, vec!["Why us?".to_string()]);
        assert_eq!(report.fields_filled, 0);
    }
}
