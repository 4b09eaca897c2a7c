use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Shared secret for signing session tokens.
    pub jwt_secret: String,
    /// Phone numbers granted the administrative tier.
    pub admin_phones: Vec<String>,
    /// Fixed rate-limit window, milliseconds.
    pub rate_limit_window_ms: u64,
    /// Maximum requests per key per window.
    pub rate_limit_max: u32,
    /// Response cache entry time-to-live, milliseconds.
    pub cache_ttl_ms: u64,
    /// Response cache capacity in entries.
    pub cache_capacity: usize,
    /// When set, token verification failures are logged with their cause.
    pub log_auth: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: match std::env::var("JWT_SECRET") {
                Ok(secret) if !secret.trim().is_empty() => secret,
                _ => {
                    tracing::warn!("JWT_SECRET not set, using development fallback");
                    "dev".to_string()
                }
            },
            admin_phones: std::env::var("ADMIN_PHONES")
                .unwrap_or_default()
                .split([',', ';'])
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            rate_limit_window_ms: std::env::var("RATE_LIMIT_WINDOW_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_WINDOW_MS must be a positive integer"))?,
            rate_limit_max: std::env::var("RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_MAX must be a positive integer"))?,
            cache_ttl_ms: std::env::var("CACHE_TTL_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CACHE_TTL_MS must be a positive integer"))?,
            cache_capacity: std::env::var("CACHE_CAPACITY")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CACHE_CAPACITY must be a positive integer"))?,
            log_auth: std::env::var("LOG_AUTH").map(|v| v == "1").unwrap_or(false),
        };

        if config.rate_limit_max == 0 {
            anyhow::bail!("RATE_LIMIT_MAX must be greater than zero");
        }
        if config.cache_capacity == 0 {
            anyhow::bail!("CACHE_CAPACITY must be greater than zero");
        }

        tracing::debug!("Server port: {}", config.port);
        tracing::debug!(
            "Rate limit: {} requests / {} ms",
            config.rate_limit_max,
            config.rate_limit_window_ms
        );
        tracing::debug!(
            "Response cache: {} entries, {} ms TTL",
            config.cache_capacity,
            config.cache_ttl_ms
        );
        if !config.admin_phones.is_empty() {
            tracing::debug!("Admin allow-list: {} phone(s)", config.admin_phones.len());
        }

        Ok(config)
    }
}

impl Default for Config {
    /// Defaults matching the documented production values, with a fixed test
    /// secret. Used by the test suites; `from_env` is the production path.
    fn default() -> Self {
        Self {
            port: 4000,
            jwt_secret: "test-secret".to_string(),
            admin_phones: Vec::new(),
            rate_limit_window_ms: 60_000,
            rate_limit_max: 60,
            cache_ttl_ms: 30_000,
            cache_capacity: 500,
            log_auth: false,
        }
    }
}
