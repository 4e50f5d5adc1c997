//! Runtime configuration loaded from the process environment
//!
//! `dotenv` is applied by the binaries before `AppConfig::from_env` runs, so a
//! local `.env` file works the same as exported variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ResearchError;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://market_research.db";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CHUNK_PAGES: u32 = 50;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CHUNK_PACING_MS: u64 = 1500;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub database_url: String,
    pub port: u16,
    pub default_model: String,
    pub max_retries: u32,
    pub chunk_pages: u32,
    pub chunk_pacing: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            default_model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_pages: DEFAULT_CHUNK_PAGES,
            chunk_pacing: Duration::from_millis(DEFAULT_CHUNK_PACING_MS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
            warn!("OPENAI_API_KEY not set; model calls will fail");
            String::new()
        });

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => parse_var("PORT", &raw)?,
            Err(_) => defaults.port,
        };

        let chunk_pages: u32 = parse_or("PDF_CHUNK_PAGES", defaults.chunk_pages)?;
        if chunk_pages == 0 {
            return Err(ResearchError::ConfigError(
                "PDF_CHUNK_PAGES must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port,
            default_model: env::var("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            max_retries: parse_or("LLM_MAX_RETRIES", defaults.max_retries)?,
            chunk_pages,
            chunk_pacing: Duration::from_millis(parse_or(
                "CHUNK_PACING_MS",
                DEFAULT_CHUNK_PACING_MS,
            )?),
        })
    }
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ResearchError::ConfigError(format!("{} has invalid value '{}'", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.chunk_pages, 50);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.chunk_pacing, Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let result: Result<u16> = parse_var("PORT", "eighty");
        assert!(matches!(result, Err(ResearchError::ConfigError(_))));

        let port: u16 = parse_var("PORT", " 9000 ").unwrap();
        assert_eq!(port, 9000);
    }
}
