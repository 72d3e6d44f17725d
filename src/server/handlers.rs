use crate::metrics;
use crate::pipeline::{self, AppState};
use crate::ratelimit::{Admission, GLOBAL_BUCKET};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 处理 HTTP 请求的主路由
///
/// 聊天管线自带限流准入；其余路由在进入前统一准入，
/// 保证任何路径上的超限请求都得到 429。
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, BoxError> {
    let cors_origin = state.config.cors_origin.clone();

    let response = match (req.method(), req.uri().path()) {
        // CORS 预检不计入限流
        (&Method::OPTIONS, _) => preflight(),
        (&Method::POST, "/api/chat") => chat(req, state).await,
        _ => {
            if state.limiter.admit(GLOBAL_BUCKET) == Admission::Denied {
                metrics::global_metrics().record_rate_limited();
                rate_limited()
            } else {
                match (req.method(), req.uri().path()) {
                    (&Method::GET, "/health") => health(&state),
                    (&Method::GET, "/api/chat") => usage_hint(&state),
                    (&Method::GET, "/metrics") => metrics_endpoint(),
                    _ => not_found(),
                }
            }
        }
    };

    Ok(with_cors(response, &cors_origin))
}

/// 聊天端点：收集请求体后交给管线
///
/// 任何未预期的故障都折叠成不带细节的 500。
async fn chat(req: Request<hyper::body::Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let reply = match req.collect().await {
        Ok(collected) => pipeline::run(&state, &collected.to_bytes()).await,
        Err(e) => {
            error!(error = %e, "读取请求体失败");
            pipeline::format_internal_error()
        }
    };

    match serde_json::to_string(&reply.body) {
        Ok(body) => json_response(reply.status, body),
        Err(e) => {
            error!(error = %e, "响应序列化失败");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Internal server error"}"#.to_string(),
            )
        }
    }
}

/// 健康检查端点
fn health(state: &AppState) -> Response<Full<Bytes>> {
    let body = json!({
        "status": "ok",
        "service": "promptgate",
        "model": state.config.first_provider().name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    json_response(StatusCode::OK, body.to_string())
}

/// 浏览器直接 GET 聊天端点时的使用提示
fn usage_hint(state: &AppState) -> Response<Full<Bytes>> {
    let body = json!({
        "status": "API is working!",
        "usage": "Send POST requests with {\"prompt\": \"...\"} to this endpoint",
        "model": state.config.first_provider().name,
    });

    json_response(StatusCode::OK, body.to_string())
}

/// 指标端点
fn metrics_endpoint() -> Response<Full<Bytes>> {
    let metrics = metrics::global_metrics();

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(metrics.export_prometheus())))
        .unwrap()
}

/// 429 响应，与管线内的限流信封一致
fn rate_limited() -> Response<Full<Bytes>> {
    let reply = pipeline::format_rate_limited();
    let body = serde_json::to_string(&reply.body)
        .unwrap_or_else(|_| r#"{"error":"Rate limit exceeded"}"#.to_string());
    json_response(reply.status, body)
}

/// CORS 预检响应
fn preflight() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 404 响应
fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("Not Found")))
        .unwrap()
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// 给所有出站响应补上配置的 CORS 来源
fn with_cors(mut response: Response<Full<Bytes>>, origin: &str) -> Response<Full<Bytes>> {
    if let Ok(value) = HeaderValue::from_str(origin) {
        response
            .headers_mut()
            .insert("Access-Control-Allow-Origin", value);
    }
    response
}
