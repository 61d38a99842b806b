//! Service entry point.

use std::time::Duration;

use advisor_service::{build_app_state, gateway, settings::AdvisorSettings};

/// How often idle rate-limit buckets are swept.
const BUCKET_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
/// Idle time after which a client's bucket is dropped.
const BUCKET_MAX_IDLE: Duration = Duration::from_secs(900);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config_rs::load_env();
    env_logger::init();

    let settings = AdvisorSettings::from_env();
    log::info!(
        "Starting advisor service (stage budget {}ms, cache ttl {}s)",
        settings.stage_timeout.as_millis(),
        settings.cache_ttl.as_secs()
    );
    if settings.reasoning.api_key.is_none() {
        log::warn!("REASONING_API_KEY not set; running on numeric forecasts only");
    }

    let state = build_app_state(settings)?;

    {
        let rate_limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BUCKET_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                rate_limiter.evict_idle(BUCKET_MAX_IDLE).await;
            }
        });
    }

    let addr = config_rs::get_bind_address("ADVISOR", 8090);
    log::info!("Advisor service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, gateway::router(state)).await?;
    Ok(())
}
