//! 业务能力层（Services）
//!
//! 描述"我能做什么"：协作者契约、置信度策略、人工介入控制器，
//! 以及基于浏览器和 LLM 的具体协作者实现

pub mod confidence_policy;
pub mod contracts;
pub mod interrupt_controller;
pub mod llm_service;
pub mod page_service;
pub mod warn_writer;

pub use confidence_policy::{ConfidencePolicy, Decision};
pub use contracts::{
    AnswerLookup, FolderJobSource, JobSource, PageAutomation, QuestionContext, StaticJobSource,
};
pub use interrupt_controller::{
    FallbackPolicy, HumanInput, InterruptController, InterruptOutcome, PendingInterrupt,
};
pub use llm_service::LlmAnswerService;
pub use page_service::BrowserPageService;
pub use warn_writer::WarnWriter;
