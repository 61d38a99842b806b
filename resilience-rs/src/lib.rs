//! resilience-rs/lib.rs
//! Resilience primitives shared across services: a circuit breaker for
//! flaky upstream dependencies, a per-client token bucket rate limiter,
//! and a TTL cache for expensive lookups.

pub mod cache;
pub mod circuit_breaker;
pub mod rate_limit;

pub use cache::TtlCache;
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
