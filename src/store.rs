use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cipher::{CipherError, UrlCipher};

/// 128 bits of token entropy
pub const TOKEN_BYTES: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("URL is empty")]
    EmptyUrl,
    #[error("token not found")]
    NotFound,
    #[error("cipher failure: {0}")]
    Cipher(#[from] CipherError),
}

/// Opaque handle for a stored URL, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    // only what generate() could have produced
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == TOKEN_BYTES * 2
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Sealed URL with its insertion time
#[derive(Clone)]
pub struct StoredEntry {
    pub sealed: Vec<u8>,
    pub created_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

pub struct TokenStore {
    entries: DashMap<Token, StoredEntry>,
    cipher: UrlCipher,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(cipher: UrlCipher, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            cipher,
            ttl,
        }
    }

    pub fn register(&self, url: &str) -> Result<Token, StoreError> {
        if url.trim().is_empty() {
            return Err(StoreError::EmptyUrl);
        }

        let token = Token::generate();
        // the token is the associated data, so a sealed value only opens under
        // the token it was stored with
        let sealed = self.cipher.seal(url.as_bytes(), token.as_str().as_bytes())?;

        self.entries.insert(
            token.clone(),
            StoredEntry {
                sealed,
                created_at: Instant::now(),
            },
        );
        Ok(token)
    }

    // unknown, malformed, expired and corrupt tokens are all NotFound
    pub fn resolve(&self, raw: &str) -> Result<String, StoreError> {
        let token = Token::parse(raw).ok_or(StoreError::NotFound)?;

        let sealed = {
            let entry = self.entries.get(&token).ok_or(StoreError::NotFound)?;
            if entry.is_expired(self.ttl) {
                None
            } else {
                Some(entry.sealed.clone())
            }
        };

        let Some(sealed) = sealed else {
            // the shard guard is released above; remove only if still stale
            self.entries.remove_if(&token, |_, e| e.is_expired(self.ttl));
            return Err(StoreError::NotFound);
        };

        let plaintext = self
            .cipher
            .open(&sealed, token.as_str().as_bytes())
            .map_err(|e| {
                warn!(error = %e, "stored entry failed to open");
                StoreError::NotFound
            })?;

        String::from_utf8(plaintext).map_err(|_| {
            warn!("stored entry is not valid UTF-8");
            StoreError::NotFound
        })
    }

    /// Returns how many entries were dropped
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(ttl);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "purged expired tokens");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn corrupt(&self, token: &Token) {
        if let Some(mut entry) = self.entries.get_mut(token) {
            if let Some(byte) = entry.sealed.last_mut() {
                *byte ^= 0xff;
            }
        }
    }
}
