//! 置信度策略
//!
//! 纯函数：给定置信度和阈值，决定自动填写还是交给人工

/// 决策结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoFill,
    Escalate,
}

/// 当且仅当 `confidence >= threshold` 时自动填写
///
/// NaN 永远升级为人工
pub fn decide(confidence: f64, threshold: f64) -> Decision {
    if confidence >= threshold {
        Decision::AutoFill
    } else {
        Decision::Escalate
    }
}

/// 绑定了阈值的置信度策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    threshold: f64,
}

impl ConfidencePolicy {
    /// 阈值会被限制在 [0, 1]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, confidence: f64) -> Decision {
        decide(confidence, self.threshold)
    }
}

impl Default for ConfidencePolicy {
    /// 静态资料匹配（0.95）总是自动填写，生成式答案（0.60~0.85）中偏低的交给人工
    fn default() -> Self {
        Self::new(0.7)
    }
}
