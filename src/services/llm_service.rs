//! LLM 答案服务 - 业务能力层
//!
//! 只负责"回答表单问题"能力，不关心流程
//!
//! ## 回答顺序
//! 1. 个人资料库中的固定问答（置信度 0.95）
//! 2. 基于简历文本由 LLM 生成（置信度 0.60 ~ 0.85，资料越多越高）
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（Groq、Azure 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Answer, Profile, SourceTag};
use crate::services::contracts::{AnswerLookup, QuestionContext};

/// 静态匹配的置信度
const STATIC_CONFIDENCE: f64 = 0.95;
/// 生成式答案的置信度上限
const GENERATIVE_CEILING: f64 = 0.85;
/// 生成式答案的基础置信度
const GENERATIVE_BASE: f64 = 0.60;
/// LLM 表示资料中没有相关信息时的固定回复
const NOT_AVAILABLE_MARKER: &str = "information not available in profile";

/// LLM 答案服务
///
/// 职责：
/// - 从个人资料库回答单个表单问题
/// - 返回答案文本、置信度和来源
/// - 不关心字段是否需要人工确认（由置信度策略决定）
pub struct LlmAnswerService {
    client: Client<OpenAIConfig>,
    model_name: String,
    profile: Profile,
}

impl LlmAnswerService {
    /// 创建新的 LLM 答案服务
    pub fn new(config: &Config, profile: Profile) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            profile,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(512u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    /// 在个人资料库的固定问答中查找
    ///
    /// 问题包含某个键（忽略大小写和标点）即视为命中，键越长越优先
    fn static_answer(&self, question: &str) -> Option<Answer> {
        let normalized_question = normalize(question);
        self.profile
            .answers
            .iter()
            .filter(|(pattern, _)| {
                let pattern = normalize(pattern);
                !pattern.is_empty() && normalized_question.contains(&pattern)
            })
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, answer)| Answer::new(answer.clone(), STATIC_CONFIDENCE, SourceTag::Static))
    }

    /// 由 LLM 基于简历生成答案
    async fn generative_answer(&self, question: &str, context: &QuestionContext) -> Result<Answer> {
        if self.profile.resume.trim().is_empty() {
            anyhow::bail!("个人资料中没有简历文本，无法生成答案");
        }

        let (user_message, system_message) = self.build_answer_messages(question, context);
        let response = self.send_to_llm(&user_message, Some(&system_message)).await?;

        if response.to_ascii_lowercase().contains(NOT_AVAILABLE_MARKER) {
            debug!("LLM 表示资料中没有相关信息: {}", question);
            return Ok(Answer::new(response, 0.0, SourceTag::Generative));
        }

        Ok(Answer::new(
            response,
            generative_confidence(self.profile.resume.len()),
            SourceTag::Generative,
        ))
    }

    /// 构建用于回答表单问题的消息
    ///
    /// 返回 (user_message, system_message)
    fn build_answer_messages(&self, question: &str, context: &QuestionContext) -> (String, String) {
        let system_message = format!(
            r#"You are helping a candidate fill out a job application form.

Answer the question based ONLY on the candidate profile below.

Rules:
1. Keep answers concise (2-3 sentences max for short-answer fields)
2. Use first-person perspective
3. If the profile does not contain relevant information, reply exactly "Information not available in profile"
4. Do NOT make up facts or experiences not in the profile

Candidate profile:
{}"#,
            self.profile.resume
        );

        let user_message = format!(
            "Job: {} at {}\nField type: {}\n\nQuestion: {}\n\nProvide a concise, relevant answer.",
            context.job_title, context.company, context.field_type, question
        );

        (user_message, system_message)
    }
}

#[async_trait]
impl AnswerLookup for LlmAnswerService {
    async fn ask(&self, question: &str, context: &QuestionContext) -> Result<Answer> {
        if let Some(answer) = self.static_answer(question) {
            debug!("✓ 固定问答命中: {}", question);
            return Ok(answer);
        }
        self.generative_answer(question, context).await
    }
}

/// 生成式答案的置信度：资料越长越高，封顶 0.85，保留两位小数
fn generative_confidence(context_len: usize) -> f64 {
    let confidence = (GENERATIVE_BASE + context_len as f64 / 2000.0).min(GENERATIVE_CEILING);
    (confidence * 100.0).round() / 100.0
}

/// 小写并把非字母数字字符折叠成单个空格
fn normalize(text: &str) -> String {
    static NON_WORD: OnceLock<Option<Regex>> = OnceLock::new();
    let lowered = text.to_lowercase();
    match NON_WORD.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").ok()) {
        Some(re) => re.replace_all(&lowered, " ").trim().to_string(),
        None => lowered.trim().to_string(),
    }
}
