//! Runtime settings for the advisor service, loaded from the environment.

use std::time::Duration;

use config_rs::{env_duration_ms, env_duration_secs, env_opt, env_or};
use resilience::{CircuitBreakerConfig, RateLimiterConfig};

use crate::decision::DecisionConfig;

/// How forecasts from the reasoning service are blended with the numeric
/// projection. Weight is the reasoning share; the numeric model keeps the
/// remainder.
#[derive(Debug, Clone)]
pub struct BlendWeights {
    pub blend_30d: f64,
    pub blend_90d: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            blend_30d: 0.6,
            blend_90d: 0.7,
        }
    }
}

/// Connection settings for the OpenAI-compatible reasoning endpoint.
#[derive(Debug, Clone)]
pub struct ReasoningSettings {
    pub api_url: String,
    /// Absent key means the reasoning layer is unconfigured and every
    /// reasoning stage falls straight back to its numeric path.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_millis(3000),
        }
    }
}

impl ReasoningSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_opt("REASONING_API_URL").unwrap_or(defaults.api_url),
            api_key: env_opt("REASONING_API_KEY"),
            model: env_opt("REASONING_MODEL").unwrap_or(defaults.model),
            timeout: env_duration_ms("REASONING_TIMEOUT_MS", 3000),
        }
    }
}

/// All tunables of the advisor pipeline.
#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    /// Per-stage execution budget.
    pub stage_timeout: Duration,
    /// Extra time the fan-in collector waits past the stage budget before
    /// declaring stragglers timed out.
    pub phase_grace: Duration,
    /// TTL for cached market contexts.
    pub cache_ttl: Duration,
    pub rate_limit: RateLimiterConfig,
    pub breaker: CircuitBreakerConfig,
    pub decision: DecisionConfig,
    pub blend: BlendWeights,
    pub reasoning: ReasoningSettings,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_millis(4000),
            phase_grace: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(1800),
            rate_limit: RateLimiterConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            decision: DecisionConfig::default(),
            blend: BlendWeights::default(),
            reasoning: ReasoningSettings::default(),
        }
    }
}

impl AdvisorSettings {
    pub fn from_env() -> Self {
        Self {
            stage_timeout: env_duration_ms("STAGE_TIMEOUT_MS", 4000),
            phase_grace: env_duration_ms("PHASE_GRACE_MS", 1000),
            cache_ttl: env_duration_secs("MARKET_CACHE_TTL_SECS", 1800),
            rate_limit: RateLimiterConfig {
                capacity: env_or("RATE_LIMIT_CAPACITY", 60.0),
                refill_per_sec: env_or("RATE_LIMIT_REFILL_PER_SEC", 1.0),
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: env_or("BREAKER_FAILURE_THRESHOLD", 5),
                cooldown: env_duration_secs("BREAKER_COOLDOWN_SECS", 30),
            },
            decision: DecisionConfig::from_env(),
            blend: BlendWeights {
                blend_30d: env_or("FORECAST_BLEND_30D", 0.6),
                blend_90d: env_or("FORECAST_BLEND_90D", 0.7),
            },
            reasoning: ReasoningSettings::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = AdvisorSettings::default();
        assert_eq!(s.stage_timeout, Duration::from_millis(4000));
        assert_eq!(s.cache_ttl, Duration::from_secs(1800));
        assert_eq!(s.breaker.failure_threshold, 5);
        assert_eq!(s.rate_limit.capacity, 60.0);
        assert!(s.reasoning.api_key.is_none());
    }
}
