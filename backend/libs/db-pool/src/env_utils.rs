//! Environment variable parsing utilities
//!
//! Unlike a plain `.ok().and_then(parse)`, a variable that is set but cannot
//! be parsed is reported as an error instead of silently falling back to the
//! default.

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("environment variable {0} not set")]
    Missing(String),

    #[error("environment variable {key} has invalid value '{value}'")]
    Invalid { key: String, value: String },
}

fn parse_value<T: FromStr>(key: &str, raw: String) -> Result<T, EnvError> {
    raw.trim().parse().map_err(|_| EnvError::Invalid {
        key: key.to_string(),
        value: raw,
    })
}

/// Parse `key`, or return `default` when unset or empty.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, EnvError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, raw),
        _ => Ok(default),
    }
}

/// Parse `key` when set; `None` when unset or empty.
pub fn env_optional<T: FromStr>(key: &str) -> Result<Option<T>, EnvError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, raw).map(Some),
        _ => Ok(None),
    }
}

/// Parse `key`, failing when it is unset.
pub fn env_required<T: FromStr>(key: &str) -> Result<T, EnvError> {
    env_optional(key)?.ok_or_else(|| EnvError::Missing(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn default_used_when_unset() {
        std::env::remove_var("DB_POOL_TEST_VALUE");
        assert_eq!(env_or("DB_POOL_TEST_VALUE", 42u32), Ok(42));
        assert_eq!(env_optional::<u32>("DB_POOL_TEST_VALUE"), Ok(None));
    }

    #[test]
    #[serial_test::serial]
    fn set_value_is_parsed() {
        std::env::set_var("DB_POOL_TEST_VALUE", " 8080 ");
        assert_eq!(env_or("DB_POOL_TEST_VALUE", 3000u16), Ok(8080));
        assert_eq!(env_required::<u16>("DB_POOL_TEST_VALUE"), Ok(8080));
        std::env::remove_var("DB_POOL_TEST_VALUE");
    }

    #[test]
    #[serial_test::serial]
    fn invalid_value_is_an_error() {
        std::env::set_var("DB_POOL_TEST_VALUE", "twenty");
        assert!(matches!(
            env_or("DB_POOL_TEST_VALUE", 20u32),
            Err(EnvError::Invalid { .. })
        ));
        std::env::remove_var("DB_POOL_TEST_VALUE");
    }

    #[test]
    #[serial_test::serial]
    fn required_reports_missing() {
        std::env::remove_var("DB_POOL_TEST_VALUE");
        assert_eq!(
            env_required::<String>("DB_POOL_TEST_VALUE"),
            Err(EnvError::Missing("DB_POOL_TEST_VALUE".to_string()))
        );
    }
}
