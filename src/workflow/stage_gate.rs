//! 阶段闸门
//!
//! 暂停和停止只在阶段边界生效：流水线在两个阶段之间调用 `checkpoint()`，
//! 正在进行的外部调用永远不会被打断

use tokio::sync::watch;
use tracing::info;

use crate::error::SessionError;
use crate::models::SessionState;
use crate::workflow::session_book::SessionBook;

/// 控制信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    Running,
    Paused,
    Stopping,
}

/// 阶段闸门
pub struct StageGate {
    control: watch::Receiver<RunControl>,
    book: SessionBook,
}

impl StageGate {
    pub fn new(control: watch::Receiver<RunControl>, book: SessionBook) -> Self {
        Self { control, book }
    }

    /// 是否已请求停止
    pub fn is_stopping(&self) -> bool {
        *self.control.borrow() == RunControl::Stopping
    }

    /// 阶段边界检查点
    ///
    /// - 运行中：立即返回
    /// - 已暂停：会话进入 PAUSED，挂起直到恢复或停止
    /// - 已停止：返回 `SessionError::Aborted`
    pub async fn checkpoint(&mut self) -> Result<(), SessionError> {
        let mut halted = false;
        loop {
            let control = *self.control.borrow_and_update();
            match control {
                RunControl::Running => {
                    if halted {
                        self.book.transition_if(
                            |s| s == SessionState::Paused,
                            SessionState::Running,
                        );
                        info!("▶️ 会话已恢复");
                    }
                    return Ok(());
                }
                RunControl::Stopping => return Err(SessionError::Aborted),
                RunControl::Paused => {
                    if !halted {
                        self.book.transition_if(
                            |s| s == SessionState::Running,
                            SessionState::Paused,
                        );
                        info!("⏸ 会话已在阶段边界暂停");
                        halted = true;
                    }
                    if self.control.changed().await.is_err() {
                        // 控制端已被丢弃
                        return Err(SessionError::Aborted);
                    }
                }
            }
        }
    }
}
