use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 流水线阶段错误（导航 / 扫描 / 填写 / 提交）
    #[error("阶段错误: {0}")]
    Stage(#[from] StageError),
    /// 答案查询错误
    #[error("答案错误: {0}")]
    Answer(#[from] AnswerError),
    /// 人工介入请求错误
    #[error("介入错误: {0}")]
    Interrupt(#[from] InterruptError),
    /// 会话控制错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 流水线阶段错误
///
/// 只终止当前职位，会话继续处理下一个职位
#[derive(Debug, Error)]
pub enum StageError {
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    /// 扫描表单字段失败
    #[error("扫描表单字段失败: {source}")]
    Scan {
        #[source]
        source: anyhow::Error,
    },
    /// 填写字段失败
    #[error("填写字段 {selector} 失败: {source}")]
    Fill {
        selector: String,
        #[source]
        source: anyhow::Error,
    },
    /// 提交表单失败
    #[error("提交申请失败: {source}")]
    Submission {
        #[source]
        source: anyhow::Error,
    },
}

/// 答案查询错误
#[derive(Debug, Error)]
pub enum AnswerError {
    /// 答案服务不可用（流水线按置信度 0 处理并升级为人工）
    #[error("无法获取问题 '{question}' 的答案: {source}")]
    Unavailable {
        question: String,
        #[source]
        source: anyhow::Error,
    },
}

/// 人工介入请求错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterruptError {
    /// 截止时间已过且未得到答复
    #[error("介入请求 {request_id} 已超时")]
    Timeout { request_id: String },
    /// 请求已经关闭（重复或迟到的答复）
    #[error("介入请求 {request_id} 已关闭")]
    AlreadyClosed { request_id: String },
    /// 未知的请求 ID
    #[error("未知的介入请求: {request_id}")]
    UnknownRequest { request_id: String },
}

/// 会话控制错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// 已有会话在运行
    #[error("会话 {session_id} 正在运行")]
    AlreadyRunning { session_id: String },
    /// 会话被操作员停止
    #[error("会话已被停止")]
    Aborted,
    /// 当前没有活动会话
    #[error("当前没有运行中的会话")]
    NotRunning,
    /// 职位队列无法读取
    #[error("无法读取职位队列: {message}")]
    QueueUnavailable { message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数值超出允许范围
    #[error("配置项 {key} 的值 {value} 超出范围 {range}")]
    OutOfRange {
        key: &'static str,
        value: String,
        range: &'static str,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 无法加载: {source}")]
    FileLoadFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 是否为会话停止导致的错误
    pub fn is_aborted(&self) -> bool {
        matches!(self, AppError::Session(SessionError::Aborted))
    }

    /// 创建导航错误
    pub fn navigation(url: impl Into<String>, source: anyhow::Error) -> Self {
        StageError::Navigation {
            url: url.into(),
            source,
        }
        .into()
    }

    /// 创建扫描错误
    pub fn scan(source: anyhow::Error) -> Self {
        StageError::Scan { source }.into()
    }

    /// 创建填写错误
    pub fn fill(selector: impl Into<String>, source: anyhow::Error) -> Self {
        StageError::Fill {
            selector: selector.into(),
            source,
        }
        .into()
    }

    /// 创建提交错误
    pub fn submission(source: anyhow::Error) -> Self {
        StageError::Submission { source }.into()
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
