//! 浏览器页面服务 - 业务能力层
//!
//! 基于 JsExecutor 实现页面自动化契约：导航、扫描表单字段、填写、提交、截图

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::infrastructure::JsExecutor;
use crate::models::FieldRequirement;
use crate::services::contracts::PageAutomation;

/// 扫描表单字段的脚本
///
/// 标签优先级：<label for> → 包裹的 <label> → aria-label → placeholder → name
const SCAN_FIELDS_JS: &str = r#"
(() => {
    const fields = [];
    const nodes = document.querySelectorAll('input, textarea, select');
    nodes.forEach((el, index) => {
        let selector = '';
        if (el.id) {
            selector = '#' + CSS.escape(el.id);
        } else if (el.name) {
            selector = el.tagName.toLowerCase() + '[name="' + el.name.replace(/"/g, '\\"') + '"]';
        } else {
            el.setAttribute('data-auto-apply-index', String(index));
            selector = '[data-auto-apply-index="' + index + '"]';
        }
        let label = '';
        if (el.id) {
            const forLabel = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (forLabel) label = forLabel.innerText;
        }
        if (!label) {
            const wrapping = el.closest('label');
            if (wrapping) label = wrapping.innerText;
        }
        label = (label || el.getAttribute('aria-label') || el.placeholder || el.name || '').trim();
        const type = el.tagName.toLowerCase() === 'input'
            ? (el.type || 'text').toLowerCase()
            : el.tagName.toLowerCase();
        fields.push({ selector, label, type, required: !!el.required });
    });
    return fields;
})()
"#;

#[derive(Debug, Deserialize)]
struct ScriptResult {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// 浏览器页面服务
///
/// 职责：
/// - 持有 JsExecutor（也就持有唯一的 page）
/// - 只做页面操作，不判断答案
pub struct BrowserPageService {
    executor: JsExecutor,
    /// 导航后等待页面稳定的时间
    settle_delay: Duration,
}

impl BrowserPageService {
    pub fn new(executor: JsExecutor) -> Self {
        Self {
            executor,
            settle_delay: Duration::from_secs(1),
        }
    }

    /// 执行返回 `{ ok, error }` 的脚本
    async fn run_script(&self, js_code: String) -> Result<()> {
        let result: ScriptResult = self.executor.eval_as(js_code).await?;
        if result.ok {
            Ok(())
        } else {
            anyhow::bail!(result.error.unwrap_or_else(|| "脚本执行失败".to_string()))
        }
    }
}

#[async_trait]
impl PageAutomation for BrowserPageService {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("导航到: {}", url);
        self.executor.goto(url).await?;
        // 等待页面脚本渲染表单
        sleep(self.settle_delay).await;
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<FieldRequirement>> {
        let raw: JsonValue = self.executor.eval(SCAN_FIELDS_JS).await?;
        let fields: Vec<FieldRequirement> =
            serde_json::from_value(raw).context("无法解析表单字段列表")?;
        debug!("扫描到 {} 个字段", fields.len());
        Ok(fields)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                if (!el) return {{ ok: false, error: 'element not found' }};
                if (el.tagName.toLowerCase() === 'select') {{
                    const wanted = {value}.toLowerCase();
                    const option = Array.from(el.options).find(o =>
                        o.value.toLowerCase() === wanted || o.text.trim().toLowerCase() === wanted);
                    if (!option) return {{ ok: false, error: 'no matching option' }};
                    el.value = option.value;
                }} else if (el.type === 'checkbox' || el.type === 'radio') {{
                    el.checked = ['yes', 'true', '1', 'on'].includes({value}.toLowerCase());
                }} else {{
                    el.focus();
                    el.value = {value};
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return {{ ok: true }};
            }})()
            "#,
            selector = serde_json::to_string(selector)?,
            value = serde_json::to_string(value)?,
        );
        self.run_script(js_code)
            .await
            .with_context(|| format!("填写 {} 失败", selector))
    }

    async fn submit(&self) -> Result<()> {
        let js_code = r#"
            (() => {
                const candidates = Array.from(document.querySelectorAll(
                    'button[type="submit"], input[type="submit"], button'));
                const button = candidates.find(b => {
                    const text = (b.innerText || b.value || '').trim().toLowerCase();
                    return b.type === 'submit' || text.startsWith('submit') || text.startsWith('apply');
                });
                if (!button) return { ok: false, error: 'submit button not found' };
                button.click();
                return { ok: true };
            })()
        "#;
        self.run_script(js_code.to_string()).await?;
        // 等待提交请求完成
        sleep(self.settle_delay * 2).await;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.executor.screenshot().await.map_err(|e| {
            warn!("截图失败: {}", e);
            e
        })
    }
}
