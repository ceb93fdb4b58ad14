/// Configuration management for post-feed-service
///
/// All settings come from environment variables (a `.env` file is loaded by
/// `main` through dotenvy before this runs).
use anyhow::{anyhow, bail, Context};
use db_pool::{env_optional, env_or, DbConfig};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const SERVICE_NAME: &str = "post-feed-service";
/// Upper bound for `FEED_MAX_PAGE_SIZE`
pub const MAX_PAGE_SIZE_LIMIT: usize = 1_000;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub log_format: LogFormat,
}

/// Application settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Postgres(DbConfig),
    Memory { seed_path: Option<PathBuf> },
}

impl StoreConfig {
    pub fn kind(&self) -> StoreKind {
        match self {
            StoreConfig::Postgres(_) => StoreKind::Postgres,
            StoreConfig::Memory { .. } => StoreKind::Memory,
        }
    }
}

/// Token verification key material
#[derive(Clone)]
pub enum AuthConfig {
    Hs256Secret(String),
    Rs256PublicKey(String),
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::Hs256Secret(_) => f.write_str("Hs256Secret([REDACTED])"),
            AuthConfig::Rs256PublicKey(_) => f.write_str("Rs256PublicKey(..)"),
        }
    }
}

/// Feed and comment limits
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub read_timeout: Duration,
    /// Max comment length in characters, after trimming
    pub comment_max_length: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            read_timeout: Duration::from_millis(5_000),
            comment_max_length: 2_200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let app = AppConfig {
            env: env_or("APP_ENV", "development".to_string())?,
            host: env_or("APP_HOST", "0.0.0.0".to_string())?,
            port: env_or("APP_PORT", 8082u16)?,
        };

        let kind = match env_optional::<String>("FEED_STORE")? {
            Some(raw) => raw.parse::<StoreKind>().map_err(|e| anyhow!("FEED_STORE: {e}"))?,
            None => StoreKind::Postgres,
        };
        if kind == StoreKind::Memory && app.is_production() {
            bail!("FEED_STORE=memory is not allowed in production");
        }
        let store = match kind {
            StoreKind::Postgres => StoreConfig::Postgres(
                DbConfig::from_env(SERVICE_NAME).context("Invalid database configuration")?,
            ),
            StoreKind::Memory => StoreConfig::Memory {
                seed_path: env_optional::<PathBuf>("FEED_SEED_PATH")?,
            },
        };

        let auth = load_auth()?;

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            default_page_size: env_or("FEED_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: env_or("FEED_MAX_PAGE_SIZE", defaults.max_page_size)?,
            read_timeout: Duration::from_millis(env_or(
                "FEED_READ_TIMEOUT_MS",
                defaults.read_timeout.as_millis() as u64,
            )?),
            comment_max_length: env_or("COMMENT_MAX_LENGTH", defaults.comment_max_length)?,
        };
        if feed.max_page_size == 0 || feed.default_page_size == 0 {
            bail!("FEED_DEFAULT_PAGE_SIZE and FEED_MAX_PAGE_SIZE must be positive");
        }
        if feed.max_page_size > MAX_PAGE_SIZE_LIMIT {
            bail!("FEED_MAX_PAGE_SIZE cannot exceed {MAX_PAGE_SIZE_LIMIT}");
        }
        if feed.default_page_size > feed.max_page_size {
            bail!("FEED_DEFAULT_PAGE_SIZE cannot exceed FEED_MAX_PAGE_SIZE");
        }

        let log_format = match env_optional::<String>("LOG_FORMAT")?.as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            app,
            store,
            auth,
            feed,
            log_format,
        })
    }
}

fn load_auth() -> anyhow::Result<AuthConfig> {
    if let Some(pem) = env_optional::<String>("JWT_PUBLIC_KEY_PEM")? {
        return Ok(AuthConfig::Rs256PublicKey(pem));
    }
    match env_optional::<String>("JWT_SECRET")? {
        Some(secret) => Ok(AuthConfig::Hs256Secret(secret)),
        None => bail!("JWT_SECRET or JWT_PUBLIC_KEY_PEM must be set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "FEED_STORE",
        "FEED_SEED_PATH",
        "DATABASE_URL",
        "JWT_SECRET",
        "JWT_PUBLIC_KEY_PEM",
        "FEED_DEFAULT_PAGE_SIZE",
        "FEED_MAX_PAGE_SIZE",
        "FEED_READ_TIMEOUT_MS",
        "COMMENT_MAX_LENGTH",
        "LOG_FORMAT",
    ];

    fn reset_env() {
        for key in VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn memory_store_with_defaults() {
        reset_env();
        std::env::set_var("FEED_STORE", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.port, 8082);
        assert_eq!(config.store.kind(), StoreKind::Memory);
        assert_eq!(config.feed.default_page_size, 20);
        assert_eq!(config.feed.max_page_size, 100);
        assert_eq!(config.feed.read_timeout, Duration::from_secs(5));
        assert_eq!(config.feed.comment_max_length, 2200);
        assert_eq!(config.log_format, LogFormat::Text);
        reset_env();
    }

    #[test]
    #[serial]
    fn production_refuses_memory_store() {
        reset_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("FEED_STORE", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");

        assert!(Config::from_env().is_err());
        reset_env();
    }

    #[test]
    #[serial]
    fn postgres_store_requires_database_url() {
        reset_env();
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");

        assert!(Config::from_env().is_err());

        std::env::set_var("DATABASE_URL", "postgres://localhost/feed");
        let config = Config::from_env().unwrap();
        assert_eq!(config.store.kind(), StoreKind::Postgres);
        reset_env();
    }

    #[test]
    #[serial]
    fn missing_key_material_is_an_error() {
        reset_env();
        std::env::set_var("FEED_STORE", "memory");

        assert!(Config::from_env().is_err());
        reset_env();
    }

    #[test]
    #[serial]
    fn malformed_number_is_an_error() {
        reset_env();
        std::env::set_var("FEED_STORE", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        std::env::set_var("FEED_MAX_PAGE_SIZE", "lots");

        assert!(Config::from_env().is_err());
        reset_env();
    }

    #[test]
    #[serial]
    fn oversized_max_page_size_is_an_error() {
        reset_env();
        std::env::set_var("FEED_STORE", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        std::env::set_var("FEED_MAX_PAGE_SIZE", "1001");
        assert!(Config::from_env().is_err());

        std::env::set_var("FEED_MAX_PAGE_SIZE", &MAX_PAGE_SIZE_LIMIT.to_string());
        let config = Config::from_env().unwrap();
        assert_eq!(config.feed.max_page_size, MAX_PAGE_SIZE_LIMIT);
        reset_env();
    }
}
