use serde::Deserialize;
use std::collections::BTreeMap;

/// 个人资料库
///
/// `answers` 是固定问题的标准答案，`resume` 是提供给 LLM 的背景材料
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}
