use crate::rate_limit::RateLimiter;
use crate::upstream::Upstream;
// app's shared state

pub struct AppState {
    pub upstream: Upstream,
    pub rate_limiter: RateLimiter,
    pub enforce_rate_limit: bool, // reject over-quota requests instead of only counting
}
