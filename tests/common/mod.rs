//! 集成测试用的内存协作者

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use auto_apply::config::SessionConfig;
use auto_apply::infrastructure::Subscription;
use auto_apply::models::{Answer, Event, FieldRequirement, Job, SourceTag};
use auto_apply::services::{AnswerLookup, PageAutomation, QuestionContext};

/// 按问题文本返回固定答案，未登记的问题返回错误
#[derive(Default)]
pub struct ScriptedAnswers {
    answers: HashMap<String, Answer>,
}

impl ScriptedAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, question: &str, text: &str, confidence: f64) -> Self {
        self.answers.insert(
            question.to_string(),
            Answer::new(text, confidence, SourceTag::Static),
        );
        self
    }
}

#[async_trait]
impl AnswerLookup for ScriptedAnswers {
    async fn ask(&self, question: &str, _context: &QuestionContext) -> Result<Answer> {
        self.answers
            .get(question)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("没有登记问题: {}", question))
    }
}

/// 按 URL 返回表单字段的页面替身
#[derive(Default)]
pub struct ScriptedPage {
    forms: HashMap<String, Vec<FieldRequirement>>,
    broken_urls: HashSet<String>,
    /// 导航时等待放行
    navigate_gate: Option<Arc<Notify>>,
    current_url: Mutex<String>,
    pub navigations: Mutex<Vec<String>>,
    pub filled: Mutex<Vec<(String, String, String)>>,
    pub submitted: Mutex<Vec<String>>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(mut self, url: &str, fields: Vec<FieldRequirement>) -> Self {
        self.forms.insert(url.to_string(), fields);
        self
    }

    pub fn broken(mut self, url: &str) -> Self {
        self.broken_urls.insert(url.to_string());
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.navigate_gate = Some(gate);
        self
    }

    pub fn filled(&self) -> Vec<(String, String, String)> {
        self.filled.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageAutomation for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.navigate_gate {
            gate.notified().await;
        }
        if self.broken_urls.contains(url) {
            anyhow::bail!("导航超时: {}", url);
        }
        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<FieldRequirement>> {
        let url = self.current_url.lock().unwrap().clone();
        Ok(self.forms.get(&url).cloned().unwrap_or_default())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let url = self.current_url.lock().unwrap().clone();
        self.filled
            .lock()
            .unwrap()
            .push((url, selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn submit(&self) -> Result<()> {
        let url = self.current_url.lock().unwrap().clone();
        self.submitted.lock().unwrap().push(url);
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}

pub fn job(id: &str) -> Job {
    Job::new(
        id,
        format!("Engineer {}", id),
        "Example",
        format!("https://jobs.example/{}", id),
    )
}

pub fn text_field(selector: &str, label: &str) -> FieldRequirement {
    FieldRequirement::new(selector, label, "text")
}

/// 测试用会话配置：不截图，介入请求不超时
pub fn session_config() -> SessionConfig {
    SessionConfig {
        interrupt_timeout: None,
        capture_screenshots: false,
        ..SessionConfig::default()
    }
}

/// 读取事件直到满足条件，返回沿途收到的全部事件
pub async fn collect_until(
    events: &mut Subscription,
    mut done: impl FnMut(&Event) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            let finished = done(&event);
            seen.push(event);
            if finished {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "等待事件超时，已收到: {:#?}", seen);
    seen
}
