//! Configuration for the remote content API client.

use url::Url;
use zeroize::Zeroizing;

/// Default API root of the hosted contents API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Repository used when `STORAGE_REPO` is unset.
pub const DEFAULT_REPO: &str = "site-storage";

/// Where the storage repository lives and how to reach it.
///
/// The access token is held in [`Zeroizing`] so it is wiped from memory on
/// drop, and is never printed by `Debug`.
#[derive(Clone)]
pub struct ContentApiConfig {
    /// API root, e.g. `https://api.github.com`.
    pub api_url: Url,
    /// Account owning the storage repository.
    pub owner: String,
    /// Storage repository name.
    pub repo: String,
    /// Branch to read from and commit to. `None` uses the repository default.
    pub branch: Option<String>,
    /// Bearer token for the `Authorization` header.
    pub token: Zeroizing<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transport errors and 5xx replies.
    pub max_retries: u32,
}

impl std::fmt::Debug for ContentApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentApiConfig")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ContentApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CONTENT_API_URL` (default: `https://api.github.com`)
    /// - `STORAGE_OWNER` (required)
    /// - `STORAGE_REPO` (default: `site-storage`)
    /// - `STORAGE_BRANCH` (optional)
    /// - `STORAGE_TOKEN` (required)
    /// - `STORAGE_TIMEOUT_SECS` (default: 30)
    /// - `STORAGE_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let token = non_empty("STORAGE_TOKEN").ok_or(ConfigError::Missing("STORAGE_TOKEN"))?;
        let owner = non_empty("STORAGE_OWNER").ok_or(ConfigError::Missing("STORAGE_OWNER"))?;
        let raw_url = non_empty("CONTENT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("CONTENT_API_URL".to_string(), e.to_string()))?;

        Ok(Self {
            api_url,
            owner,
            repo: non_empty("STORAGE_REPO").unwrap_or_else(|| DEFAULT_REPO.to_string()),
            branch: non_empty("STORAGE_BRANCH"),
            token: Zeroizing::new(token),
            timeout_secs: parse_or(&non_empty, "STORAGE_TIMEOUT_SECS", 30)?,
            max_retries: parse_or(&non_empty, "STORAGE_MAX_RETRIES", 3)?,
        })
    }

    /// Configuration pointing at a local server (stub or mock), for tests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` does not parse.
    pub fn local(base_url: &str, token: &str) -> Result<Self, ConfigError> {
        let api_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?;
        Ok(Self {
            api_url,
            owner: "sitehost".to_string(),
            repo: DEFAULT_REPO.to_string(),
            branch: None,
            token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
            max_retries: 0,
        })
    }
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("authorization token contains characters not allowed in a header")]
    InvalidToken,
}
