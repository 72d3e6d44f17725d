use crate::config::ProviderConfig;
use crate::error::PromptGateError;
use crate::providers::{get_http_client, ProviderReply};
use crate::types::Usage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI chat completions 请求格式
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

/// OpenAI chat completions 响应格式
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

/// 构建 OpenAI 请求，系统指令用独立的 system 消息承载
fn build_request(provider: &ProviderConfig, model_id: &str, prompt: &str) -> OpenAiRequest {
    let mut messages = Vec::new();

    if let Some(instruction) = &provider.params.system_instruction {
        messages.push(OpenAiMessage {
            role: "system".to_string(),
            content: instruction.clone(),
        });
    }
    messages.push(OpenAiMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });

    OpenAiRequest {
        model: model_id.to_string(),
        messages,
        temperature: provider.params.temperature,
        max_tokens: provider.params.max_output_tokens,
    }
}

/// 调用 OpenAI
pub async fn invoke(
    provider: &ProviderConfig,
    model_id: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<ProviderReply> {
    let client = get_http_client();

    let openai_req = build_request(provider, model_id, prompt);

    // 构建 URL
    let api_base = if provider.params.api_base.is_empty() {
        "https://api.openai.com/v1"
    } else {
        &provider.params.api_base
    };
    let url = format!("{}/chat/completions", api_base.trim_end_matches('/'));

    // 发送请求
    let response = client
        .post(&url)
        .header(
            "Authorization",
            format!("Bearer {}", provider.params.api_key),
        )
        .header("Content-Type", "application/json")
        .timeout(timeout)
        .json(&openai_req)
        .send()
        .await?;

    // 检查状态码
    let status = response.status();
    if !status.is_success() {
        // 限制错误响应体大小，防止 DoS 攻击
        let error_body = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(4096)
            .collect::<String>();
        return Err(PromptGateError::upstream(
            status.as_u16(),
            format!("OpenAI API 错误: {}", error_body),
        ));
    }

    // 解析响应
    let openai_resp: OpenAiResponse = response.json().await?;

    let choice = openai_resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PromptGateError::internal("OpenAI 响应中没有 choices"))?;

    let usage = openai_resp.usage.map(|u| Usage {
        tokens_used: u.total_tokens,
    });

    Ok(ProviderReply {
        text: choice.message.content,
        model_used: provider.name.clone(),
        usage,
    })
}
