//! 会话事件
//!
//! 序列号在发布时由事件总线分配，同一会话内严格递增

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::interrupt::RequestId;
use crate::models::job::JobState;
use crate::models::session::{SessionSnapshot, SessionState};

/// 会话事件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub session_id: String,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }
}

/// 事件内容
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum EventBody {
    Log {
        level: LogLevel,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        message: String,
    },
    Screenshot {
        job_id: String,
        /// base64 编码的 PNG
        image: String,
    },
    #[serde(rename_all = "camelCase")]
    RequestInput {
        request_id: RequestId,
        job_id: String,
        field: String,
        prompt: String,
        default_answer: String,
        deadline: Option<DateTime<Utc>>,
    },
    State(StateChange),
    Stats(SessionSnapshot),
    /// 订阅者缓冲区溢出，`missed` 个最旧的事件被丢弃
    EventsDropped { missed: u64 },
}

impl EventBody {
    pub fn kind(&self) -> &'static str {
        match self {
            EventBody::Log { .. } => "log",
            EventBody::Screenshot { .. } => "screenshot",
            EventBody::RequestInput { .. } => "requestInput",
            EventBody::State(_) => "state",
            EventBody::Stats(_) => "stats",
            EventBody::EventsDropped { .. } => "eventsDropped",
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// 状态迁移
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum StateChange {
    #[serde(rename_all = "camelCase")]
    Job {
        job_id: String,
        from_state: JobState,
        to_state: JobState,
    },
    #[serde(rename_all = "camelCase")]
    Session {
        from_state: SessionState,
        to_state: SessionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_event_wire_shape() {
        let event = Event {
            session_id: "s1".to_string(),
            sequence_number: 7,
            timestamp: Utc::now(),
            body: EventBody::State(StateChange::Job {
                job_id: "job-1".to_string(),
                from_state: JobState::Queued,
                to_state: JobState::Navigating,
            }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["sequenceNumber"], 7);
        assert_eq!(json["kind"], "state");
        assert_eq!(json["payload"]["jobId"], "job-1");
        assert_eq!(json["payload"]["fromState"], "QUEUED");
        assert_eq!(json["payload"]["toState"], "NAVIGATING");
    }

    #[test]
    fn test_request_input_wire_shape() {
        let body = EventBody::RequestInput {
            request_id: RequestId::from("r-1"),
            job_id: "job-1".to_string(),
            field: "Years of experience".to_string(),
            prompt: "How many years?".to_string(),
            default_answer: "3".to_string(),
            deadline: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "requestInput");
        assert_eq!(json["payload"]["requestId"], "r-1");
        assert_eq!(json["payload"]["prompt"], "How many years?");
        assert!(json["payload"]["deadline"].is_null());
    }
}
