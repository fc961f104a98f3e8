//! HTTP middleware components.

pub mod rate_limit;

pub use rate_limit::{
    RateCategory, RateLimitConfig, RateLimiter, get_client_id, rate_limit_response,
};
