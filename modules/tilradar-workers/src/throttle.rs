use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Uniformly jittered delay: `base` plus up to `jitter` extra, so parallel
/// deployments do not hit the platform in lockstep.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra_ms = rand::rng().random_range(0..=jitter.as_millis() as u64);
    base + Duration::from_millis(extra_ms)
}

/// Sleep the jittered delay that precedes every platform call.
pub async fn pre_call_delay(base: Duration, jitter: Duration) {
    let delay = jittered(base, jitter);
    debug!(delay_secs = delay.as_secs(), "Throttling before platform call");
    tokio::time::sleep(delay).await;
}
