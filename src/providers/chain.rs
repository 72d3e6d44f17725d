use crate::classify::{classify, Failure, FailureKind};
use crate::config::Config;
use crate::providers::{self, ProviderReply};
use crate::types::PromptRequest;
use std::time::Duration;
use tracing::{info, warn};

/// 按配置顺序依次尝试提供商
///
/// 首个成功立即返回，后续提供商不再调用；全部失败时返回
/// 最后一次的分类结果，更早的失败只留在日志里。
/// 单提供商的链条走同一条路径，没有特殊分支。
pub async fn dispatch(
    config: &Config,
    request: &PromptRequest,
) -> std::result::Result<ProviderReply, Failure> {
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let mut last_failure: Option<Failure> = None;

    for provider in &config.provider_list {
        match providers::invoke(provider, &request.prompt, timeout).await {
            Ok(reply) => {
                info!(provider = %provider.name, "上游调用成功");
                return Ok(reply);
            }
            Err(e) => {
                let failure = classify(&e);
                // 完整错误原文只进服务端日志，不对外
                warn!(
                    provider = %provider.name,
                    kind = ?failure.kind,
                    error = %failure.raw_message,
                    "上游调用失败，尝试下一个提供商"
                );
                last_failure = Some(failure);
            }
        }
    }

    // provider_list 为空只会出现在未经 validate() 的手工构造配置里
    Err(last_failure.unwrap_or(Failure {
        kind: FailureKind::Unknown,
        raw_message: "没有配置任何提供商".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, ProviderParams};
    use crate::ratelimit::RateLimitConfig;

    fn provider(name: &str, model: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            params: ProviderParams {
                model: model.to_string(),
                api_key: "key".to_string(),
                api_base: String::new(),
                system_instruction: None,
                max_output_tokens: None,
                temperature: None,
            },
        }
    }

    fn config(providers: Vec<ProviderConfig>) -> Config {
        Config {
            provider_list: providers,
            rate_limit: RateLimitConfig::default(),
            max_prompt_chars: None,
            request_timeout_ms: 1_000,
            cors_origin: "*".to_string(),
        }
    }

    fn request(prompt: &str) -> PromptRequest {
        PromptRequest {
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_provider_chain() {
        // 退化情况：只有一个提供商，行为与一般链条一致
        let config = config(vec![provider("solo", "canned/solo")]);

        let reply = dispatch(&config, &request("hello")).await.unwrap();
        assert_eq!(reply.model_used, "solo");
    }

    #[tokio::test]
    async fn test_fallback_on_failure_reports_succeeding_model() {
        // 第一个提供商种类无效必然失败，回退到 canned
        let config = config(vec![
            provider("broken", "nosuch/model-a"),
            provider("backup", "canned/backup"),
        ]);

        let reply = dispatch(&config, &request("hi")).await.unwrap();
        assert_eq!(reply.model_used, "backup");
    }

    #[tokio::test]
    async fn test_short_circuit_on_first_success() {
        // 第一个提供商成功时，model 必须是它的标识
        let config = config(vec![
            provider("primary", "canned/primary"),
            provider("secondary", "canned/secondary"),
        ]);

        let reply = dispatch(&config, &request("hi")).await.unwrap();
        assert_eq!(reply.model_used, "primary");
    }

    #[tokio::test]
    async fn test_all_failed_surfaces_last_failure() {
        let config = config(vec![
            provider("first", "nosuch-alpha/model"),
            provider("second", "nosuch-beta/model"),
        ]);

        let failure = dispatch(&config, &request("hi")).await.unwrap_err();
        // 暴露的是最后一个提供商的失败，不是第一个
        assert!(failure.raw_message.contains("nosuch-beta"));
    }
}
