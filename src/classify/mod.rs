use crate::error::PromptGateError;
use once_cell::sync::Lazy;
use regex::Regex;

/// 脱敏占位符
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// 上游失败的稳定分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidKey,
    ModelUnavailable,
    QuotaExceeded,
    Timeout,
    Unknown,
}

/// 分类后的上游失败
///
/// raw_message 保留完整原文，只允许写入服务端日志；
/// 任何对外展示必须经过 client_details()。
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    pub raw_message: String,
}

impl Failure {
    /// 对外展示的失败描述，已脱敏
    pub fn client_details(&self) -> String {
        let details = match self.kind {
            FailureKind::InvalidKey => "Invalid API key configuration".to_string(),
            FailureKind::ModelUnavailable => "Model service unavailable".to_string(),
            FailureKind::QuotaExceeded => "Provider quota exhausted".to_string(),
            FailureKind::Timeout => "Provider request timed out".to_string(),
            // Unknown 没有稳定的描述，返回截断后的原文
            FailureKind::Unknown => truncate(&self.raw_message, 200),
        };
        redact(&details)
    }
}

/// 将上游错误映射到稳定分类
pub fn classify(err: &PromptGateError) -> Failure {
    // reqwest 客户端超时不依赖文本匹配
    if let PromptGateError::HttpError(e) = err {
        if e.is_timeout() {
            return Failure {
                kind: FailureKind::Timeout,
                raw_message: err.to_string(),
            };
        }
    }

    classify_text(&err.to_string())
}

/// 基于错误文本的优先级匹配
pub fn classify_text(raw: &str) -> Failure {
    static INVALID_KEY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)api[ _-]?key|unauthenticated|unauthorized|invalid authentication")
            .unwrap()
    });
    static MODEL_UNAVAILABLE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)model|not found|unsupported|unavailable").unwrap()
    });
    static QUOTA_EXCEEDED: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)quota|billing|rate limit|resource[ _]?exhausted").unwrap()
    });
    static TIMEOUT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)timed? ?out|deadline").unwrap());

    let kind = if INVALID_KEY.is_match(raw) {
        FailureKind::InvalidKey
    } else if MODEL_UNAVAILABLE.is_match(raw) {
        FailureKind::ModelUnavailable
    } else if QUOTA_EXCEEDED.is_match(raw) {
        FailureKind::QuotaExceeded
    } else if TIMEOUT.is_match(raw) {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown
    };

    Failure {
        kind,
        raw_message: raw.to_string(),
    }
}

/// 把文本中疑似 API 密钥的片段替换为占位符
pub fn redact(text: &str) -> String {
    static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
        vec![
            // OpenAI / Anthropic 风格密钥
            Regex::new(r"sk-[A-Za-z0-9_\-]{8,}").unwrap(),
            // Google 风格密钥
            Regex::new(r"AIza[0-9A-Za-z_\-]{10,}").unwrap(),
            // Authorization 头
            Regex::new(r"(?i)bearer\s+[A-Za-z0-9._\-]+").unwrap(),
            // key=value / key: value 形式
            Regex::new(r#"(?i)api[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._\-]+"#).unwrap(),
        ]
    });

    let mut result = text.to_string();
    for pattern in PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTION_MARKER).into_owned();
    }
    result
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
