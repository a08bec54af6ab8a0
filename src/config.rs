use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::services::FallbackPolicy;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 自动填写所需的最低置信度
    pub confidence_threshold: f64,
    /// 人工介入请求的超时秒数（None 表示无限等待）
    pub interrupt_timeout_secs: Option<u64>,
    /// 介入请求超时后的兜底策略
    pub timeout_fallback: FallbackPolicy,
    /// 每个订阅者的事件缓冲区大小
    ///
    /// 校验时向上取整到 2 的幂（broadcast 通道的实际容量）
    pub event_buffer: usize,
    /// 只填写不提交
    pub dry_run: bool,
    /// 是否在导航和提交后截图
    pub capture_screenshots: bool,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否启动无头浏览器（否则连接到已打开的浏览器）
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件
    pub chrome_executable: Option<String>,
    /// 职位 TOML 文件存放目录
    pub jobs_folder: String,
    /// 个人资料库（静态问答 + 简历文本）
    pub profile_path: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 需要人工跟进的字段记录文件
    pub warn_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            interrupt_timeout_secs: Some(300),
            timeout_fallback: FallbackPolicy::SkipField,
            event_buffer: 256,
            dry_run: false,
            capture_screenshots: true,
            browser_debug_port: 9222,
            headless: false,
            chrome_executable: None,
            jobs_folder: "data/jobs".to_string(),
            profile_path: "data/profile.toml".to_string(),
            output_log_file: "output.txt".to_string(),
            warn_file: "warn.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model_name: "llama-3.3-70b-versatile".to_string(),
        }
    }
}

/// 会话级配置：编排核心真正关心的部分
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub confidence_threshold: f64,
    pub interrupt_timeout: Option<Duration>,
    pub timeout_fallback: FallbackPolicy,
    pub dry_run: bool,
    pub capture_screenshots: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Config::default().session_config()
    }
}

/// TOML 配置文件结构（所有字段可选）
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    confidence_threshold: Option<f64>,
    interrupt_timeout_secs: Option<u64>,
    timeout_fallback: Option<FallbackPolicy>,
    event_buffer: Option<usize>,
    dry_run: Option<bool>,
    capture_screenshots: Option<bool>,
    browser_debug_port: Option<u16>,
    headless: Option<bool>,
    chrome_executable: Option<String>,
    jobs_folder: Option<String>,
    profile_path: Option<String>,
    output_log_file: Option<String>,
    warn_file: Option<String>,
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
}

impl Config {
    /// 从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，然后再应用环境变量覆盖
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoadFailed {
                path: path.display().to_string(),
                source: e.into(),
            })?;
        Self::from_toml_str(&content)
            .map_err(|e| match e {
                ConfigError::FileLoadFailed { source, .. } => ConfigError::FileLoadFailed {
                    path: path.display().to_string(),
                    source,
                },
                other => other,
            })?
            .with_env_overrides()
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::FileLoadFailed {
            path: "<inline>".to_string(),
            source: e.into(),
        })?;

        let default = Self::default();
        let config = Self {
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(default.confidence_threshold),
            interrupt_timeout_secs: match file.interrupt_timeout_secs {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => default.interrupt_timeout_secs,
            },
            timeout_fallback: file.timeout_fallback.unwrap_or(default.timeout_fallback),
            event_buffer: file.event_buffer.unwrap_or(default.event_buffer),
            dry_run: file.dry_run.unwrap_or(default.dry_run),
            capture_screenshots: file
                .capture_screenshots
                .unwrap_or(default.capture_screenshots),
            browser_debug_port: file
                .browser_debug_port
                .unwrap_or(default.browser_debug_port),
            headless: file.headless.unwrap_or(default.headless),
            chrome_executable: file.chrome_executable.or(default.chrome_executable),
            jobs_folder: file.jobs_folder.unwrap_or(default.jobs_folder),
            profile_path: file.profile_path.unwrap_or(default.profile_path),
            output_log_file: file.output_log_file.unwrap_or(default.output_log_file),
            warn_file: file.warn_file.unwrap_or(default.warn_file),
            llm_api_key: file.llm_api_key.unwrap_or(default.llm_api_key),
            llm_api_base_url: file.llm_api_base_url.unwrap_or(default.llm_api_base_url),
            llm_model_name: file.llm_model_name.unwrap_or(default.llm_model_name),
        };
        config.validate()
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let config = Self {
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", "f64")?
                .unwrap_or(self.confidence_threshold),
            interrupt_timeout_secs: match env_parse::<u64>("INTERRUPT_TIMEOUT_SECS", "u64")? {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => self.interrupt_timeout_secs,
            },
            timeout_fallback: match std::env::var("TIMEOUT_FALLBACK").ok() {
                Some(value) => FallbackPolicy::parse(&value).ok_or_else(|| {
                    ConfigError::EnvVarParseFailed {
                        var_name: "TIMEOUT_FALLBACK".to_string(),
                        value,
                        expected_type: "use_default_answer | skip_field | abort_job",
                    }
                })?,
                None => self.timeout_fallback,
            },
            event_buffer: env_parse("EVENT_BUFFER", "usize")?.unwrap_or(self.event_buffer),
            dry_run: env_parse("DRY_RUN", "bool")?.unwrap_or(self.dry_run),
            capture_screenshots: env_parse("CAPTURE_SCREENSHOTS", "bool")?
                .unwrap_or(self.capture_screenshots),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", "u16")?
                .unwrap_or(self.browser_debug_port),
            headless: env_parse("HEADLESS", "bool")?.unwrap_or(self.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .or(self.chrome_executable),
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(self.jobs_folder),
            profile_path: std::env::var("PROFILE_PATH").unwrap_or(self.profile_path),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            warn_file: std::env::var("WARN_FILE").unwrap_or(self.warn_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
        };
        config.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfRange {
                key: "confidence_threshold",
                value: self.confidence_threshold.to_string(),
                range: "[0.0, 1.0]",
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::OutOfRange {
                key: "event_buffer",
                value: "0".to_string(),
                range: "[1, ∞)",
            });
        }
        self.event_buffer = self.event_buffer.next_power_of_two();
        Ok(self)
    }

    /// 提取会话级配置
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            confidence_threshold: self.confidence_threshold,
            interrupt_timeout: self.interrupt_timeout_secs.map(Duration::from_secs),
            timeout_fallback: self.timeout_fallback,
            dry_run: self.dry_run,
            capture_screenshots: self.capture_screenshots,
        }
    }
}

fn env_parse<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &'static str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type,
            }),
        Err(_) => Ok(None),
    }
}
