use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::cipher::UrlCipher;
use crate::page::{MAX_DELAY, RedirectDelay};

/// Which routes a deployment exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Token store plus direct redirects
    Server,
    /// Stateless: only the direct `?url=` redirect
    Edge,
}

impl Profile {
    pub fn uses_token_store(self) -> bool {
        matches!(self, Profile::Server)
    }
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "redirect-relay")]
#[command(about = "Anonymizing redirect relay")]
pub struct Args {
    // Address to bind
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    // Origin allowed to call the API cross-origin
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub allowed_origin: String,

    // 64 hex chars; a random key is generated when absent
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    // Token TTL in seconds
    #[arg(long, env = "RELAY_TOKEN_TTL", default_value_t = 24 * 60 * 60)]
    pub token_ttl: u64,

    // Rate limit max requests per window
    #[arg(long, env = "RELAY_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RELAY_RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // How often expired tokens and idle rate windows are swept, in seconds
    #[arg(long, env = "RELAY_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Lower bound of the randomized hand-off delay
    #[arg(long, default_value_t = 1000)]
    pub delay_min_ms: u64,

    // Upper bound of the randomized hand-off delay
    #[arg(long, default_value_t = 3000)]
    pub delay_max_ms: u64,

    #[arg(long, env = "RELAY_PROFILE", value_enum, default_value_t = Profile::Server)]
    pub profile: Profile,

    // tracing filter directive, e.g. "info" or "redirect_relay=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("encryption key must be {} hex characters", crate::cipher::KEY_LEN * 2)]
    InvalidKey,
    #[error("allowed origin must be a single concrete origin: {0}")]
    InvalidOrigin(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("redirect delay must satisfy min <= max <= {}ms", MAX_DELAY.as_millis())]
    InvalidDelay,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub allowed_origin: HeaderValue,
    pub encryption_key: Option<String>,
    pub token_ttl: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub sweep_interval: Duration,
    pub delay: RedirectDelay,
    pub profile: Profile,
}

impl RelayConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if let Some(key) = &args.encryption_key {
            UrlCipher::from_hex(key).map_err(|_| ConfigError::InvalidKey)?;
        }
        // credentialed CORS needs a concrete origin
        if args.allowed_origin.trim() == "*" {
            return Err(ConfigError::InvalidOrigin(args.allowed_origin.clone()));
        }
        let allowed_origin = HeaderValue::from_str(&args.allowed_origin)
            .map_err(|_| ConfigError::InvalidOrigin(args.allowed_origin.clone()))?;

        if args.token_ttl == 0 {
            return Err(ConfigError::Zero("token ttl"));
        }
        if args.rate_limit == 0 {
            return Err(ConfigError::Zero("rate limit"));
        }
        if args.rate_window == 0 {
            return Err(ConfigError::Zero("rate window"));
        }
        if args.sweep_interval == 0 {
            return Err(ConfigError::Zero("sweep interval"));
        }

        let delay = RedirectDelay::new(
            Duration::from_millis(args.delay_min_ms),
            Duration::from_millis(args.delay_max_ms),
        )
        .ok_or(ConfigError::InvalidDelay)?;

        Ok(Self {
            listen: SocketAddr::new(args.host, args.port),
            allowed_origin,
            encryption_key: args.encryption_key.clone(),
            token_ttl: Duration::from_secs(args.token_ttl),
            rate_limit: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window),
            sweep_interval: Duration::from_secs(args.sweep_interval),
            delay,
            profile: args.profile,
        })
    }

    /// Cipher for the configured key, or a fresh one for this process
    pub fn cipher(&self) -> Result<UrlCipher, ConfigError> {
        match &self.encryption_key {
            Some(key) => UrlCipher::from_hex(key).map_err(|_| ConfigError::InvalidKey),
            None => Ok(UrlCipher::random()),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3001)),
            allowed_origin: HeaderValue::from_static("http://localhost:5173"),
            encryption_key: None,
            token_ttl: Duration::from_secs(24 * 60 * 60),
            rate_limit: 60,
            rate_window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
            delay: RedirectDelay::default(),
            profile: Profile::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["redirect-relay"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn explicit_values_are_used() {
        let args = parse(&[
            "--port",
            "8080",
            "--rate-limit",
            "5",
            "--token-ttl",
            "120",
            "--profile",
            "edge",
            "--allowed-origin",
            "https://app.example",
        ]);
        let config = RelayConfig::from_args(&args).unwrap();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.token_ttl, Duration::from_secs(120));
        assert_eq!(config.profile, Profile::Edge);
        assert_eq!(config.allowed_origin, "https://app.example");
    }

    #[test]
    fn hex_key_is_validated() {
        let args = parse(&["--encryption-key", "not-hex"]);
        assert_eq!(RelayConfig::from_args(&args).unwrap_err(), ConfigError::InvalidKey);

        let key = "0f".repeat(32);
        let args = parse(&["--encryption-key", &key]);
        let config = RelayConfig::from_args(&args).unwrap();
        assert!(config.cipher().is_ok());
    }

    #[test]
    fn wildcard_origin_is_rejected() {
        let args = parse(&["--allowed-origin", "*"]);
        assert_eq!(
            RelayConfig::from_args(&args).unwrap_err(),
            ConfigError::InvalidOrigin("*".to_string())
        );
        let args = parse(&["--allowed-origin", "https://app.example\n"]);
        assert!(matches!(
            RelayConfig::from_args(&args),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn zero_values_are_rejected() {
        let args = parse(&["--rate-limit", "0"]);
        assert_eq!(RelayConfig::from_args(&args).unwrap_err(), ConfigError::Zero("rate limit"));
        let args = parse(&["--token-ttl", "0"]);
        assert_eq!(RelayConfig::from_args(&args).unwrap_err(), ConfigError::Zero("token ttl"));
    }

    #[test]
    fn delay_window_is_checked() {
        let args = parse(&["--delay-min-ms", "3000", "--delay-max-ms", "1000"]);
        assert_eq!(RelayConfig::from_args(&args).unwrap_err(), ConfigError::InvalidDelay);
        let args = parse(&["--delay-max-ms", "60000"]);
        assert_eq!(RelayConfig::from_args(&args).unwrap_err(), ConfigError::InvalidDelay);
    }
}
