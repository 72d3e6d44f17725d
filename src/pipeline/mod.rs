use crate::classify::Failure;
use crate::config::Config;
use crate::metrics;
use crate::providers::chain;
use crate::providers::ProviderReply;
use crate::ratelimit::{Admission, RateLimiter, GLOBAL_BUCKET};
use crate::types::{ChatError, ChatSuccess, RawChatRequest};
use hyper::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// 管线共享状态
///
/// 限流器是显式注入的共享对象，不走模块级全局量。
#[derive(Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        AppState { config, limiter }
    }
}

/// 响应信封，按结果区分
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success(ChatSuccess),
    Error(ChatError),
}

/// 管线产出：HTTP 状态码加响应信封
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Envelope,
}

/// 聊天请求的完整处理管线
///
/// 校验 → 限流准入 → 回退链调度 → 信封格式化。
/// 校验或限流失败的请求不会触发任何上游调用。
pub async fn run(state: &AppState, body: &[u8]) -> Reply {
    let request_id = Uuid::new_v4();

    // 解析请求体
    let raw: RawChatRequest = match serde_json::from_slice(body) {
        Ok(raw) => raw,
        Err(e) => {
            info!(%request_id, error = %e, "请求体解析失败");
            metrics::global_metrics().record_rejected();
            return format_rejection("Request body must be a JSON object");
        }
    };

    // 校验
    let validated = match raw.validate(state.config.max_prompt_chars) {
        Ok(validated) => validated,
        Err(reason) => {
            info!(%request_id, %reason, "请求校验未通过");
            metrics::global_metrics().record_rejected();
            return format_rejection(&reason);
        }
    };

    // 限流准入，必须先于任何上游调用
    if state.limiter.admit(GLOBAL_BUCKET) == Admission::Denied {
        info!(%request_id, "请求被限流");
        metrics::global_metrics().record_rate_limited();
        return format_rate_limited();
    }

    // 回退链调度
    match chain::dispatch(&state.config, &validated).await {
        Ok(reply) => {
            metrics::global_metrics().record_success();
            format_success(&reply)
        }
        Err(failure) => {
            error!(
                %request_id,
                kind = ?failure.kind,
                error = %failure.raw_message,
                "所有提供商均失败"
            );
            metrics::global_metrics().record_failure();
            format_all_failed(&failure)
        }
    }
}

/// 200：成功信封，时间戳在格式化时现取
pub fn format_success(reply: &ProviderReply) -> Reply {
    Reply {
        status: StatusCode::OK,
        body: Envelope::Success(ChatSuccess {
            response: reply.text.clone(),
            model: reply.model_used.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            usage: reply.usage,
        }),
    }
}

/// 400：校验拒绝
pub fn format_rejection(details: &str) -> Reply {
    Reply {
        status: StatusCode::BAD_REQUEST,
        body: Envelope::Error(ChatError::new("Invalid request", details)),
    }
}

/// 429：限流拒绝，固定提示语
pub fn format_rate_limited() -> Reply {
    Reply {
        status: StatusCode::TOO_MANY_REQUESTS,
        body: Envelope::Error(ChatError::new(
            "Rate limit exceeded",
            "Too many requests, please try again later",
        )),
    }
}

/// 500：所有提供商失败，细节已脱敏
pub fn format_all_failed(failure: &Failure) -> Reply {
    Reply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: Envelope::Error(
            ChatError::new("AI service error", failure.client_details())
                .with_help("Check provider configuration and API keys"),
        ),
    }
}

/// 500：未预期的内部故障，不带细节
pub fn format_internal_error() -> Reply {
    Reply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: Envelope::Error(ChatError::bare("Internal server error")),
    }
}
