use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 固定窗口限流配置
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// 每分钟 60 次（默认预设）
    pub const PER_MINUTE: RateLimitConfig = RateLimitConfig {
        max_requests: 60,
        window_ms: 60_000,
    };

    /// 每 15 分钟 100 次（宽松预设）
    pub const PER_QUARTER_HOUR: RateLimitConfig = RateLimitConfig {
        max_requests: 100,
        window_ms: 900_000,
    };
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig::PER_MINUTE
    }
}

/// 准入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied,
}

/// 单个桶的窗口状态，首次请求时惰性创建
#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// 默认桶：当前不区分调用方，全局共用一个桶
pub const GLOBAL_BUCKET: &str = "global";

/// 固定窗口限流器
///
/// 状态是显式持有的共享对象（通过 Arc 注入各处），
/// 同一个桶的 检查-计数 操作在锁内完成。
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        RateLimiter {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// 判定一次请求是否准入
    pub fn admit(&self, bucket: &str) -> Admission {
        self.admit_at(bucket, Instant::now())
    }

    fn admit_at(&self, bucket: &str, now: Instant) -> Admission {
        let window = Duration::from_millis(self.config.window_ms);
        let mut buckets = self.buckets.lock().unwrap();

        let entry = buckets
            .entry(bucket.to_string())
            .or_insert_with(|| RateWindow {
                window_start: now,
                count: 0,
            });

        // 窗口按墙钟时间翻转
        if now.duration_since(entry.window_start) >= window {
            entry.window_start = now;
            entry.count = 0;
        }

        // 拒绝时也计数，持续超限的洪峰不会提前重置窗口
        entry.count += 1;
        if entry.count > self.config.max_requests {
            Admission::Denied
        } else {
            Admission::Allowed
        }
    }
}
