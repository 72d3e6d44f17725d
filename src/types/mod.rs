use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 原始聊天请求（校验前）
///
/// prompt 保留为 JSON 值，以便区分"缺失"和"类型错误"两种情况。
#[derive(Debug, Clone, Deserialize)]
pub struct RawChatRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    /// 调用方附带的自由元数据，不参与转发
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// 校验通过的聊天请求，只有它会被转发到上游
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub prompt: String,
}

impl RawChatRequest {
    /// 按顺序应用校验规则，返回首个违反规则的描述
    pub fn validate(self, max_chars: Option<usize>) -> Result<PromptRequest, String> {
        // 规则 1: prompt 字段必须存在且非空
        let value = match self.prompt {
            Some(v) => v,
            None => return Err("Prompt is required".to_string()),
        };

        // 规则 2: prompt 必须是字符串
        let prompt = match value {
            Value::String(s) => s,
            other => {
                return Err(format!(
                    "Prompt must be a string, got {}",
                    json_type_name(&other)
                ))
            }
        };

        if prompt.is_empty() {
            return Err("Prompt is required".to_string());
        }

        // 规则 3: 长度不超过配置上限
        if let Some(max) = max_chars {
            if prompt.chars().count() > max {
                return Err(format!(
                    "Prompt exceeds maximum length of {} characters",
                    max
                ));
            }
        }

        Ok(PromptRequest { prompt })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 成功响应信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSuccess {
    pub response: String,
    pub model: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// 错误响应信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ChatError {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            help: None,
        }
    }

    pub fn bare(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Token 使用统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub tokens_used: u32,
}
