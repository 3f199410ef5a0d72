//! API 요청 속도 제한.
//!
//! 클라이언트 IP별 Token Bucket. 포털 수집용 `RequestLimiter`와 달리 초과 요청은
//! 기다리지 않고 즉시 429로 거절합니다.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use tokio::sync::RwLock;

use crate::error::ApiErrorResponse;

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 순간적으로 추가 허용되는 요청 수
    pub burst_size: u32,
    /// 사용하지 않는 버킷을 정리하는 기준 시간
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(600)
    }
}

impl RateLimitConfig {
    /// 버스트는 분당 요청 수의 10%.
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size: requests_per_minute / 10,
            idle_timeout: Duration::from_secs(600),
        }
    }

    /// 버스트 없음.
    pub fn strict(requests_per_minute: u32) -> Self {
        Self {
            burst_size: 0,
            ..Self::new(requests_per_minute)
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    /// 초당 충전량
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let refill_rate = config.requests_per_minute as f64 / 60.0;
        let max_tokens = refill_rate + config.burst_size as f64;
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// 다음 토큰까지 대기 시간 (초).
    fn retry_after_secs(&self) -> u64 {
        if self.refill_rate <= 0.0 {
            return 60;
        }
        ((1.0 - self.tokens).max(0.0) / self.refill_rate).ceil() as u64
    }
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u64 },
}

/// IP별 Rate Limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(&self.config));

        if bucket.try_acquire() {
            RateLimitResult::Allowed
        } else {
            RateLimitResult::Limited {
                retry_after: bucket.retry_after_secs().max(1),
            }
        }
    }

    /// 오래 쓰이지 않은 버킷 정리.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let idle = self.config.idle_timeout;
        self.buckets
            .write()
            .await
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < idle);
    }

    pub async fn tracked_ips(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// 미들웨어 상태.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

/// IP별 요청 수를 제한하는 미들웨어.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request);

    match state.limiter.check(ip).await {
        RateLimitResult::Allowed => {
            counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            counter!("rate_limit_requests_total", "status" => "limited").increment(1);
            tracing::warn!(client_ip = %ip, retry_after, "Rate limit exceeded");

            let body = ApiErrorResponse::simple(
                "RATE_LIMITED",
                "요청 한도를 초과했습니다. 잠시 후 다시 시도해주세요.",
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

/// 프록시 헤더(X-Forwarded-For, X-Real-IP)에서 클라이언트 IP를 찾습니다.
/// 헤더가 없으면 루프백 주소로 묶입니다.
fn extract_client_ip(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_burst_then_limited() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 60,
            burst_size: 5,
            idle_timeout: Duration::from_secs(60),
        });

        // 초당 1 + 버스트 5
        for i in 0..6 {
            assert_eq!(
                limiter.check(ip("10.0.0.1")).await,
                RateLimitResult::Allowed,
                "request {}",
                i
            );
        }
        assert!(matches!(
            limiter.check(ip("10.0.0.1")).await,
            RateLimitResult::Limited { retry_after } if retry_after >= 1
        ));
    }

    #[tokio::test]
    async fn test_separate_buckets_per_ip() {
        let limiter = RateLimiter::new(RateLimitConfig::strict(60));

        assert_eq!(limiter.check(ip("10.0.0.1")).await, RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check(ip("10.0.0.1")).await,
            RateLimitResult::Limited { .. }
        ));
        assert_eq!(limiter.check(ip("10.0.0.2")).await, RateLimitResult::Allowed);
        assert_eq!(limiter.tracked_ips().await, 2);
    }

    #[tokio::test]
    async fn test_refill_over_time() {
        let limiter = RateLimiter::new(RateLimitConfig::strict(6000));
        for _ in 0..100 {
            let _ = limiter.check(ip("10.0.0.1")).await;
        }
        assert!(matches!(
            limiter.check(ip("10.0.0.1")).await,
            RateLimitResult::Limited { .. }
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(limiter.check(ip("10.0.0.1")).await, RateLimitResult::Allowed);
    }

    #[tokio::test]
    async fn test_cleanup_idle_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            idle_timeout: Duration::from_millis(10),
            ..RateLimitConfig::strict(60)
        });
        let _ = limiter.check(ip("10.0.0.1")).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_ips().await, 0);
    }

    #[test]
    fn test_config_burst() {
        assert_eq!(RateLimitConfig::new(600).burst_size, 60);
        assert_eq!(RateLimitConfig::strict(600).burst_size, 0);
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_retry_after() {
        let state = RateLimitState::new(RateLimitConfig::strict(60));
        let app = Router::new()
            .route("/api/v1/stocks/search", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware));

        let request = || {
            Request::builder()
                .uri("/api/v1/stocks/search")
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(RETRY_AFTER));
    }

    #[test]
    fn test_extract_client_ip() {
        let request = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request), ip("198.51.100.2"));

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), ip("127.0.0.1"));
    }
}
