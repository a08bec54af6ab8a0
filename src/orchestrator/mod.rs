//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_controller` - 会话控制器
//! - 管理会话生命周期（开始、暂停、恢复、停止）
//! - 持有职位队列，逐个交给 JobPipeline
//! - 转发人工答复给 InterruptController
//! - 维护会话统计并通过事件总线广播
//!
//! ## 层次关系
//!
//! ```text
//! session_controller (处理 Vec<Job>)
//!     ↓
//! workflow::JobPipeline (处理单个 Job)
//!     ↓
//! services (能力层：answer / page / interrupt / warn)
//!     ↓
//! infrastructure (基础设施：EventBus / JsExecutor)
//! ```

pub mod session_controller;

pub use session_controller::SessionController;
