//! HTTP 미들웨어.

pub mod metrics;
pub mod rate_limit;

pub use metrics::metrics_layer;
pub use rate_limit::{
    rate_limit_middleware, RateLimitConfig, RateLimitResult, RateLimitState, RateLimiter,
};
