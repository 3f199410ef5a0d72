//! 외부 요청 속도 제한.
//!
//! Token Bucket 알고리즘으로 포털에 보내는 요청 간격을 조절합니다.
//! 여러 요청이 하나의 버킷을 공유하므로 동시에 들어온 크롤링 요청도
//! 전체 예산을 넘지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// 요청 제한 설정.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    /// 초당 허용 요청 수
    pub requests_per_second: f64,
    /// 버킷 용량 (순간적으로 허용되는 요청 수)
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 1,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &LimiterConfig) -> Self {
        let max_tokens = config.burst.max(1) as f64;
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate: config.requests_per_second,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 토큰을 소비하거나, 다음 토큰까지 남은 시간을 반환합니다.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - self.tokens) / self.refill_rate;
            Err(Duration::from_secs_f64(wait))
        }
    }
}

/// 공유 요청 제한기.
///
/// `acquire`는 토큰이 생길 때까지 대기합니다. 실패하지 않으며 재시도도 하지 않습니다.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    bucket: Option<Arc<Mutex<TokenBucket>>>,
}

impl RequestLimiter {
    /// 새 제한기 생성. `requests_per_second`가 0 이하이면 제한하지 않습니다.
    pub fn new(config: LimiterConfig) -> Self {
        if config.requests_per_second <= 0.0 || !config.requests_per_second.is_finite() {
            return Self::unlimited();
        }
        Self {
            bucket: Some(Arc::new(Mutex::new(TokenBucket::new(&config)))),
        }
    }

    /// 제한 없는 제한기 (테스트용).
    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// 요청 한 건을 보낼 수 있을 때까지 대기합니다.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            trace!(wait_ms = wait.as_millis() as u64, "Waiting for request token");
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

impl From<&brief_core::CrawlerConfig> for LimiterConfig {
    fn from(config: &brief_core::CrawlerConfig) -> Self {
        Self {
            requests_per_second: config.requests_per_second,
            burst: config.burst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let limiter = RequestLimiter::new(LimiterConfig {
            requests_per_second: 2.0,
            burst: 2,
        });

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        // 세 번째 요청은 토큰 리필(0.5초)을 기다려야 함
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(490));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_between_clones() {
        let limiter = RequestLimiter::new(LimiterConfig {
            requests_per_second: 1.0,
            burst: 1,
        });
        let other = limiter.clone();

        let start = Instant::now();
        limiter.acquire().await;
        other.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RequestLimiter::new(LimiterConfig {
            requests_per_second: 0.0,
            burst: 1,
        });
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }
}
