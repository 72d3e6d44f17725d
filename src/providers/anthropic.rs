use crate::config::ProviderConfig;
use crate::error::PromptGateError;
use crate::providers::{get_http_client, ProviderReply};
use crate::types::Usage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anthropic Messages API 请求格式
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Anthropic Messages API 响应格式
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// 构建 Anthropic 请求，系统指令走顶层 system 字段
///
/// max_tokens 是必填字段，未配置时使用 1024。
fn build_request(provider: &ProviderConfig, model_id: &str, prompt: &str) -> AnthropicRequest {
    AnthropicRequest {
        model: model_id.to_string(),
        messages: vec![AnthropicMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        system: provider.params.system_instruction.clone(),
        max_tokens: provider.params.max_output_tokens.unwrap_or(1024),
        temperature: provider.params.temperature,
    }
}

/// 调用 Anthropic
pub async fn invoke(
    provider: &ProviderConfig,
    model_id: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<ProviderReply> {
    let client = get_http_client();

    let anthropic_req = build_request(provider, model_id, prompt);

    // 构建 URL
    let api_base = if provider.params.api_base.is_empty() {
        "https://api.anthropic.com"
    } else {
        &provider.params.api_base
    };
    let url = format!("{}/v1/messages", api_base.trim_end_matches('/'));

    // 发送请求
    let response = client
        .post(&url)
        .header("x-api-key", &provider.params.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .timeout(timeout)
        .json(&anthropic_req)
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
            format!("Anthropic API 错误: {}", error_body),
        ));
    }

    // 解析响应，拼接所有 text 块
    let anthropic_resp: AnthropicResponse = response.json().await?;

    let text = anthropic_resp
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(PromptGateError::internal("Anthropic 响应中没有文本内容"));
    }

    let usage = Usage {
        tokens_used: anthropic_resp.usage.input_tokens + anthropic_resp.usage.output_tokens,
    };

    Ok(ProviderReply {
        text,
        model_used: provider.name.clone(),
        usage: Some(usage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderParams;
    use mockito::Server;

    fn create_test_provider(api_base: &str) -> ProviderConfig {
        ProviderConfig {
            name: "claude".to_string(),
            params: ProviderParams {
                model: "anthropic/claude-3-haiku".to_string(),
                api_key: "sk-ant-test".to_string(),
                api_base: api_base.to_string(),
                system_instruction: None,
                max_output_tokens: None,
                temperature: None,
            },
        }
    }

    #[test]
    fn test_build_request_defaults() {
        let provider = create_test_provider("");
        let req = build_request(&provider, "claude-3-haiku", "Hello");

        assert_eq!(req.model, "claude-3-haiku");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert!(req.system.is_none());
        // 未配置时的默认 max_tokens
        assert_eq!(req.max_tokens, 1024);
    }

    #[test]
    fn test_build_request_with_system_and_limits() {
        let mut provider = create_test_provider("");
        provider.params.system_instruction = Some("Be brief".to_string());
        provider.params.max_output_tokens = Some(512);

        let req = build_request(&provider, "claude-3-haiku", "Hello");

        assert_eq!(req.system.as_deref(), Some("Be brief"));
        assert_eq!(req.max_tokens, 512);
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_body(
                r#"{
                "content": [
                    {"type": "text", "text": "Hello from "},
                    {"type": "text", "text": "Claude!"}
                ],
                "usage": {"input_tokens": 8, "output_tokens": 4}
            }"#,
            )
            .create_async()
            .await;

        let provider = create_test_provider(&server.url());
        let result = invoke(&provider, "claude-3-haiku", "Hello", Duration::from_secs(5)).await;

        let reply = result.unwrap();
        // 多个 text 块应该被拼接
        assert_eq!(reply.text, "Hello from Claude!");
        assert_eq!(reply.model_used, "claude");
        assert_eq!(reply.usage.unwrap().tokens_used, 12);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invoke_api_error() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#)
            .create_async()
            .await;

        let provider = create_test_provider(&server.url());
        let result = invoke(&provider, "claude-3-haiku", "Hello", Duration::from_secs(5)).await;

        assert!(matches!(
            result.unwrap_err(),
            PromptGateError::UpstreamError { status: 529, .. }
        ));
    }
}
