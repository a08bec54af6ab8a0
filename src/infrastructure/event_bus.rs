//! 事件总线 - 基础设施层
//!
//! 按发布顺序把会话事件扇出给所有订阅者
//!
//! - 序列号在发布时分配，分配与入队在同一把锁内完成，保证全序
//! - 每个订阅者有独立的有界缓冲区，满了丢弃最旧的事件，
//!   订阅者随后收到一个 `eventsDropped` 标记
//! - 发布永远不会因为慢订阅者而阻塞

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{error, info, warn};

use crate::models::{Event, EventBody, LogLevel, SessionSnapshot};

/// 事件总线
///
/// 克隆开销很小，所有克隆共享同一个序列号
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    sender: broadcast::Sender<Event>,
    cursor: Mutex<Cursor>,
}

struct Cursor {
    session_id: String,
    next_sequence: u64,
}

impl EventBus {
    /// 创建事件总线
    ///
    /// # 参数
    /// - `session_id`: 初始会话 ID
    /// - `capacity`: 每个订阅者的缓冲区大小（tokio 会向上取整到 2 的幂）
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                sender,
                cursor: Mutex::new(Cursor {
                    session_id: session_id.into(),
                    next_sequence: 1,
                }),
            }),
        }
    }

    /// 切换到新的会话 ID
    ///
    /// 序列号继续递增，跨会话的订阅者看到的序列号也不会回退
    pub fn begin_session(&self, session_id: impl Into<String>) {
        self.cursor().session_id = session_id.into();
    }

    pub fn session_id(&self) -> String {
        self.cursor().session_id.clone()
    }

    /// 发布事件，返回分配的序列号
    pub fn publish(&self, body: EventBody) -> u64 {
        mirror_to_tracing(&body);
        let mut cursor = self.cursor();
        Self::send_locked(&self.inner.sender, &mut cursor, body)
    }

    /// 发布日志事件
    pub fn log(&self, level: LogLevel, job_id: Option<&str>, message: impl Into<String>) -> u64 {
        self.publish(EventBody::Log {
            level,
            job_id: job_id.map(str::to_string),
            message: message.into(),
        })
    }

    /// 订阅事件
    ///
    /// 新订阅者首先收到一个 `stats` 快照事件，之后是订阅点之后发布的所有事件
    pub fn subscribe(&self, snapshot: SessionSnapshot) -> Subscription {
        let mut cursor = self.cursor();
        let receiver = self.inner.sender.subscribe();
        let first = Self::send_locked(&self.inner.sender, &mut cursor, EventBody::Stats(snapshot));
        Subscription {
            receiver,
            session_id: cursor.session_id.clone(),
            next_expected: first,
        }
    }

    /// 取消订阅
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    fn send_locked(
        sender: &broadcast::Sender<Event>,
        cursor: &mut Cursor,
        body: EventBody,
    ) -> u64 {
        let sequence_number = cursor.next_sequence;
        cursor.next_sequence += 1;
        let event = Event {
            session_id: cursor.session_id.clone(),
            sequence_number,
            timestamp: Utc::now(),
            body,
        };
        // 没有订阅者时发送失败，事件直接丢弃
        let _ = sender.send(event);
        sequence_number
    }

    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.inner
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 订阅句柄，丢弃即取消订阅
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    session_id: String,
    next_expected: u64,
}

impl Subscription {
    /// 等待下一个事件；总线关闭时返回 None
    pub async fn recv(&mut self) -> Option<Event> {
        match self.receiver.recv().await {
            Ok(event) => Some(self.accept(event)),
            Err(RecvError::Lagged(missed)) => Some(self.dropped_marker(missed)),
            Err(RecvError::Closed) => None,
        }
    }

    /// 非阻塞地取出下一个事件
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.receiver.try_recv() {
            Ok(event) => Some(self.accept(event)),
            Err(TryRecvError::Lagged(missed)) => Some(self.dropped_marker(missed)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    fn accept(&mut self, event: Event) -> Event {
        self.next_expected = event.sequence_number + 1;
        self.session_id.clone_from(&event.session_id);
        event
    }

    /// 用最后一个被丢弃事件的序列号生成标记，保证序列号连续
    fn dropped_marker(&mut self, missed: u64) -> Event {
        let last_dropped = self.next_expected + missed - 1;
        self.next_expected += missed;
        Event {
            session_id: self.session_id.clone(),
            sequence_number: last_dropped,
            timestamp: Utc::now(),
            body: EventBody::EventsDropped { missed },
        }
    }
}

fn mirror_to_tracing(body: &EventBody) {
    if let EventBody::Log { level, message, .. } = body {
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}
