use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_OPENITI_BASE_URL: &str = "https://raw.githubusercontent.com/OpenITI/RELEASE/master/data";
const DEFAULT_TURATH_BASE_URL: &str = "https://files.turath.io/books-v3";
const DEFAULT_CACHE_PATH: &str = "data/usul.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    /// Release root; book files live under `{base}/{author}/{book}/{version}`.
    pub openiti_base_url: String,
    pub turath_base_url: String,
    /// Applied to each fetch attempt separately.
    pub fetch_timeout: Duration,
    pub cache_path: String,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openiti_base_url: DEFAULT_OPENITI_BASE_URL.to_string(),
            turath_base_url: DEFAULT_TURATH_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let timeout_secs = match get("USUL_FETCH_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("USUL_FETCH_TIMEOUT_SECS is not a number: {v:?}"))?
                .max(1),
            None => DEFAULT_TIMEOUT_SECS,
        };
        let concurrency = match get("USUL_WARM_CONCURRENCY") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("USUL_WARM_CONCURRENCY is not a number: {v:?}"))?
                .max(1),
            None => DEFAULT_CONCURRENCY,
        };

        Ok(Self {
            openiti_base_url: get("USUL_OPENITI_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openiti_base_url),
            turath_base_url: get("USUL_TURATH_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.turath_base_url),
            fetch_timeout: Duration::from_secs(timeout_secs),
            cache_path: get("USUL_CACHE_PATH").unwrap_or(defaults.cache_path),
            concurrency,
        })
    }
}
