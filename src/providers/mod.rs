pub mod chain;
pub mod gemini;
pub mod openai;
pub mod anthropic;
pub mod canned;

use crate::config::{parse_model_string, ProviderConfig};
use crate::error::PromptGateError;
use crate::types::Usage;
use crate::Result;
use reqwest::Client;
use std::time::Duration;

/// 提供商成功回复
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub text: String,
    /// 对外暴露的模型标识，等于配置中的 name
    pub model_used: String,
    pub usage: Option<Usage>,
}

/// 获取全局 HTTP 客户端（连接池复用）
///
/// 超时按单次调用设置，不在客户端级别配置。
pub(crate) fn get_http_client() -> &'static Client {
    use once_cell::sync::Lazy;
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .unwrap()
    });
    &CLIENT
}

/// 调用单个提供商，按模型字符串派发到对应适配器
pub async fn invoke(
    provider: &ProviderConfig,
    prompt: &str,
    timeout: Duration,
) -> Result<ProviderReply> {
    let (kind, model_id) = parse_model_string(&provider.params.model)?;

    match kind.as_str() {
        "gemini" => gemini::invoke(provider, &model_id, prompt, timeout).await,
        "openai" => openai::invoke(provider, &model_id, prompt, timeout).await,
        "anthropic" => anthropic::invoke(provider, &model_id, prompt, timeout).await,
        "canned" => canned::invoke(provider, prompt),
        _ => Err(PromptGateError::UnsupportedProvider(kind)),
    }
}
