use std::net::IpAddr;
use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

// Rate limit entry - tracks requests per client key
pub struct QuotaEntry {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    RateLimited { retry_after: Duration },
}

// Fixed window per client, started by its first request
pub struct RateLimiter {
    quotas: DashMap<String, QuotaEntry>,
    limit: u32,
    window: Duration,
    // keeps hashed client keys from being reversed by enumerating addresses
    salt: [u8; 16],
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        Self {
            quotas: DashMap::new(),
            limit,
            window,
            salt,
        }
    }

    /// Key a client by its network address without keeping the address itself
    pub fn client_key(&self, ip: IpAddr) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(ip.to_string());
        format!("{:x}", hasher.finalize())
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        let now = Instant::now();

        // the entry guard holds the shard lock for the whole read-modify-write
        let mut entry = self
            .quotas
            .entry(client_key.to_string())
            .or_insert(QuotaEntry {
                count: 0,
                window_start: now,
            });

        // window elapsed? start a new one
        let elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window {
            entry.count = 1;
            entry.window_start = now;
            return Admission::Allowed;
        }

        // under limit? allow
        if entry.count < self.limit {
            entry.count += 1;
            return Admission::Allowed;
        }

        Admission::RateLimited {
            retry_after: self.window - elapsed,
        }
    }

    /// Remove clients whose window has fully elapsed.
    pub fn evict_expired(&self) -> usize {
        let window = self.window;
        let mut removed = 0;
        self.quotas.retain(|_, quota| {
            let keep = quota.window_start.elapsed() < window;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.quotas.len(), "evicted idle rate limit windows");
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.quotas.len()
    }
}
