use std::sync::Arc;

use crate::config::{ConfigError, Profile, RelayConfig};
use crate::page::RedirectDelay;
use crate::rate_limit::RateLimiter;
use crate::store::TokenStore;

// app's shared state
pub struct AppState {
    pub store: TokenStore,
    pub rate_limiter: RateLimiter,
    pub delay: RedirectDelay,
    pub profile: Profile,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Result<Arc<Self>, ConfigError> {
        Ok(Arc::new(Self {
            store: TokenStore::new(config.cipher()?, config.token_ttl),
            rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window),
            delay: config.delay,
            profile: config.profile,
        }))
    }
}
