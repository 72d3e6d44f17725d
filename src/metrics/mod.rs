use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 简单的指标收集器
#[derive(Debug, Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    rejected_requests: AtomicU64,
    rate_limited_requests: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录成功请求
    pub fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录上游全部失败的请求
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录校验未通过的请求
    pub fn record_rejected(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录被限流的请求
    pub fn record_rate_limited(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rate_limited_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// 导出 Prometheus 格式
    pub fn export_prometheus(&self) -> String {
        format!(
            "# HELP promptgate_requests_total Total number of requests\n\
             # TYPE promptgate_requests_total counter\n\
             promptgate_requests_total {}\n\
             # HELP promptgate_requests_successful Successful requests\n\
             # TYPE promptgate_requests_successful counter\n\
             promptgate_requests_successful {}\n\
             # HELP promptgate_requests_failed Requests with all providers failed\n\
             # TYPE promptgate_requests_failed counter\n\
             promptgate_requests_failed {}\n\
             # HELP promptgate_requests_rejected Requests rejected by validation\n\
             # TYPE promptgate_requests_rejected counter\n\
             promptgate_requests_rejected {}\n\
             # HELP promptgate_requests_rate_limited Requests denied by the rate limiter\n\
             # TYPE promptgate_requests_rate_limited counter\n\
             promptgate_requests_rate_limited {}\n",
            self.total_requests.load(Ordering::Relaxed),
            self.successful_requests.load(Ordering::Relaxed),
            self.failed_requests.load(Ordering::Relaxed),
            self.rejected_requests.load(Ordering::Relaxed),
            self.rate_limited_requests.load(Ordering::Relaxed)
        )
    }
}

/// 获取全局指标实例
pub fn global_metrics() -> &'static Arc<Metrics> {
    use once_cell::sync::Lazy;
    static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| Arc::new(Metrics::new()));
    &METRICS
}
