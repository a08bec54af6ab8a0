use serde::{Deserialize, Serialize};

/// 答案来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// 个人资料库中的精确匹配
    Static,
    /// LLM 基于资料生成
    Generative,
    /// 答案服务不可用
    Unavailable,
}

/// 答案服务返回的答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// 置信度，范围 [0, 1]
    pub confidence: f64,
    pub source_tag: SourceTag,
}

impl Answer {
    pub fn new(text: impl Into<String>, confidence: f64, source_tag: SourceTag) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_tag,
        }
    }

    /// 答案服务失败时的占位答案（置信度 0，必然升级为人工）
    pub fn unavailable() -> Self {
        Self::new("", 0.0, SourceTag::Unavailable)
    }
}
