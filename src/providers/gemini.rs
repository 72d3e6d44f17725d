use crate::config::ProviderConfig;
use crate::error::PromptGateError;
use crate::providers::{get_http_client, ProviderReply};
use crate::types::Usage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini API 请求格式
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Gemini API 响应格式
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: GeminiContentResponse,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: u32,
}

/// 构建 Gemini 请求
///
/// Gemini 没有独立的 system 角色，系统指令合并进用户消息。
fn build_request(provider: &ProviderConfig, prompt: &str) -> GeminiRequest {
    let text = match &provider.params.system_instruction {
        Some(instruction) => format!("{}\n\n{}", instruction, prompt),
        None => prompt.to_string(),
    };

    let generation_config = if provider.params.temperature.is_some()
        || provider.params.max_output_tokens.is_some()
    {
        Some(GenerationConfig {
            temperature: provider.params.temperature,
            max_output_tokens: provider.params.max_output_tokens,
        })
    } else {
        None
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart { text }],
        }],
        generation_config,
    }
}

/// 调用 Gemini
pub async fn invoke(
    provider: &ProviderConfig,
    model_id: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<ProviderReply> {
    let client = get_http_client();

    let gemini_req = build_request(provider, prompt);

    // 构建 URL（不在 URL 中暴露 API 密钥）
    let api_base = if provider.params.api_base.is_empty() {
        "https://generativelanguage.googleapis.com"
    } else {
        &provider.params.api_base
    };
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        model_id
    );

    // 发送请求（通过 HTTP 头传递 API 密钥）
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &provider.params.api_key)
        .timeout(timeout)
        .json(&gemini_req)
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
            format!("Gemini API 错误: {}", error_body),
        ));
    }

    // 解析响应
    let gemini_resp: GeminiResponse = response.json().await?;

    let candidate = gemini_resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PromptGateError::internal("Gemini 响应中没有 candidates"))?;

    let text = candidate
        .content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");

    let usage = gemini_resp.usage_metadata.map(|meta| Usage {
        tokens_used: meta.total_token_count,
    });

    Ok(ProviderReply {
        text,
        model_used: provider.name.clone(),
        usage,
    })
}
