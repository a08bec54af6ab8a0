pub mod event_bus;
pub mod js_executor;

pub use event_bus::{EventBus, Subscription};
pub use js_executor::JsExecutor;
