//! 数据模型
//!
//! 只描述数据，不包含流程逻辑

pub mod answer;
pub mod event;
pub mod field;
pub mod interrupt;
pub mod job;
pub mod loaders;
pub mod profile;
pub mod session;

pub use answer::{Answer, SourceTag};
pub use event::{Event, EventBody, LogLevel, StateChange};
pub use field::FieldRequirement;
pub use interrupt::{InterruptRequest, RequestId};
pub use job::{Job, JobOutcome, JobReport, JobState};
pub use loaders::{load_all_job_files, load_job_file, load_profile};
pub use profile::Profile;
pub use session::{PendingPrompt, SessionSnapshot, SessionState, SessionStats};
