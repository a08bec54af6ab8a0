//! 会话账本
//!
//! 会话计数器和会话状态的唯一存放处。状态迁移事件在持锁期间发布，
//! 保证事件顺序与状态修改顺序一致。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::infrastructure::{EventBus, Subscription};
use crate::models::{EventBody, SessionSnapshot, SessionState, SessionStats, StateChange};

#[derive(Clone)]
pub struct SessionBook {
    stats: Arc<Mutex<SessionStats>>,
    bus: EventBus,
}

impl SessionBook {
    pub fn new(bus: EventBus) -> Self {
        let stats = SessionStats::new(bus.session_id());
        Self {
            stats: Arc::new(Mutex::new(stats)),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// 订阅事件流
    ///
    /// 持有计数器锁时取快照并订阅，期间不会有状态迁移事件插入
    pub fn subscribe(&self) -> Subscription {
        let stats = self.lock();
        self.bus.subscribe(stats.snapshot())
    }

    /// 修改计数器
    pub fn update(&self, f: impl FnOnce(&mut SessionStats)) {
        f(&mut self.lock());
    }

    /// 发布当前统计快照
    pub fn publish_stats(&self) {
        let snapshot = self.snapshot();
        self.bus.publish(EventBody::Stats(snapshot));
    }

    /// 迁移会话状态，返回原状态；状态未变化时返回 None
    pub fn transition(&self, to: SessionState) -> Option<SessionState> {
        self.transition_if(|_| true, to)
    }

    /// 只有当前状态满足条件时才迁移
    pub fn transition_if(
        &self,
        allowed: impl FnOnce(SessionState) -> bool,
        to: SessionState,
    ) -> Option<SessionState> {
        let mut stats = self.lock();
        let from = stats.state;
        if from == to || !allowed(from) {
            return None;
        }
        stats.state = to;
        self.bus.publish(EventBody::State(StateChange::Session {
            from_state: from,
            to_state: to,
        }));
        Some(from)
    }

    /// 开始新会话：重置计数器并进入 RUNNING
    ///
    /// 已有活动会话时返回其 ID
    pub fn begin(&self, session_id: &str) -> Result<(), String> {
        let mut stats = self.lock();
        if stats.state.is_active() {
            return Err(stats.session_id.clone());
        }
        let from = stats.state;
        *stats = SessionStats::new(session_id);
        stats.state = SessionState::Running;
        stats.started_at = Some(std::time::Instant::now());
        self.bus.begin_session(session_id);
        self.bus.publish(EventBody::State(StateChange::Session {
            from_state: from,
            to_state: SessionState::Running,
        }));
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_rejects_active_session() {
        let book = SessionBook::new(EventBus::new("idle", 8));
        book.begin("s1").unwrap();
        assert_eq!(book.state(), SessionState::Running);
        assert_eq!(book.begin("s2"), Err("s1".to_string()));

        book.transition(SessionState::Completed);
        book.begin("s2").unwrap();
        assert_eq!(book.snapshot().session_id, "s2");
    }

    #[test]
    fn test_subscribe_snapshot_matches_latest_transition() {
        let book = SessionBook::new(EventBus::new("idle", 8));
        book.begin("s1").unwrap();
        book.transition(SessionState::Paused);

        let mut sub = book.subscribe();
        match sub.try_recv().map(|e| e.body) {
            Some(EventBody::Stats(snapshot)) => assert_eq!(snapshot.state, SessionState::Paused),
            other => panic!("unexpected first event: {:?}", other),
        }
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_never_sees_stale_state() {
        let book = SessionBook::new(EventBus::new("idle", 1024));
        book.begin("s1").unwrap();

        let flipper = {
            let book = book.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let to = if i % 2 == 0 {
                        SessionState::Paused
                    } else {
                        SessionState::Running
                    };
                    book.transition(to);
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..50 {
            let mut sub = book.subscribe();
            let mut state = match sub.try_recv().map(|e| e.body) {
                Some(EventBody::Stats(snapshot)) => snapshot.state,
                other => panic!("unexpected first event: {:?}", other),
            };
            // 后续迁移事件都必须从快照状态出发
            while let Some(event) = sub.try_recv() {
                if let EventBody::State(StateChange::Session { from_state, to_state }) = event.body {
                    assert_eq!(from_state, state);
                    state = to_state;
                }
            }
            tokio::task::yield_now().await;
        }
        flipper.await.unwrap();
    }

    #[test]
    fn test_transition_if_guards() {
        let book = SessionBook::new(EventBus::new("idle", 8));
        book.begin("s1").unwrap();
        assert_eq!(
            book.transition_if(|s| s == SessionState::Paused, SessionState::Running),
            None
        );
        assert_eq!(
            book.transition(SessionState::Paused),
            Some(SessionState::Running)
        );
        assert_eq!(book.transition(SessionState::Paused), None);
    }
}
