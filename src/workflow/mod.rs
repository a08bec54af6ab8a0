pub mod job_ctx;
pub mod job_pipeline;
pub mod session_book;
pub mod stage_gate;

pub use job_ctx::JobCtx;
pub use job_pipeline::{JobPipeline, PipelineDeps, PipelineSettings};
pub use session_book::SessionBook;
pub use stage_gate::{RunControl, StageGate};
