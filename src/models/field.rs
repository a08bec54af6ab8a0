use serde::{Deserialize, Serialize};

/// 不需要回答的字段类型
const NON_ANSWERABLE_TYPES: &[&str] = &["button", "submit", "hidden", "reset", "image"];

/// 页面扫描得到的表单字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRequirement {
    pub selector: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldRequirement {
    pub fn new(
        selector: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            label: label.into(),
            field_type: field_type.into(),
            required: false,
        }
    }

    /// 是否需要向答案服务提问
    ///
    /// 按钮、隐藏字段和没有标签的字段直接跳过
    pub fn is_answerable(&self) -> bool {
        let field_type = self.field_type.to_ascii_lowercase();
        !NON_ANSWERABLE_TYPES.contains(&field_type.as_str()) && !self.label.trim().is_empty()
    }
}
