use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptGateError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML 解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP 请求错误: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("提供商不支持: {0}")]
    UnsupportedProvider(String),

    #[error("无效的模型字符串: {0}")]
    InvalidModelString(String),

    #[error("上游 API 错误: {status} - {message}")]
    UpstreamError { status: u16, message: String },

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl PromptGateError {
    pub fn config(msg: impl Into<String>) -> Self {
        PromptGateError::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PromptGateError::InternalError(msg.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        PromptGateError::UpstreamError {
            status,
            message: message.into(),
        }
    }
}
