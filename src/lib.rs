//! # Auto Apply
//!
//! 半自动职位申请编排器：逐个打开职位申请页面，扫描表单，
//! 用个人资料回答问题，低置信度的问题交给操作员，最后提交。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 goto() / eval() / screenshot()
//! - `EventBus` - 有序事件广播，慢订阅者丢弃最旧事件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个问题或单个动作
//! - `LlmAnswerService` - 个人资料问答 + LLM 生成
//! - `BrowserPageService` - 导航 / 扫描 / 填写 / 提交
//! - `ConfidencePolicy` - 自动填写还是转人工
//! - `InterruptController` - 人工答复与超时兜底
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个职位"的完整处理流程
//! - `JobCtx` - 上下文封装（job + 序号）
//! - `JobPipeline` - 状态机（navigate → scan → answer → fill → submit）
//! - `StageGate` - 暂停 / 停止只在阶段边界生效
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_controller` - 会话控制器，管理队列、命令和统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::{Config, SessionConfig};
pub use error::{AppError, AppResult};
pub use infrastructure::{EventBus, JsExecutor, Subscription};
pub use models::{Event, EventBody, Job, JobState, SessionSnapshot, SessionState};
pub use orchestrator::SessionController;
pub use services::{
    AnswerLookup, FallbackPolicy, HumanInput, JobSource, PageAutomation, QuestionContext,
};
pub use workflow::{JobPipeline, PipelineDeps};
