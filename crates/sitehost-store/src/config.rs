//! Store tuning and presentation settings.

use chrono::Duration;
use sitehost_content_client::{ConfigError, ContentApiConfig};
use sitehost_core::WatermarkPolicy;

/// Upload cap for a single deployed file.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Freshness window of the cached user registry.
    pub cache_ttl: Duration,
    /// Compare-and-swap attempts before a mutation reports contention.
    pub cas_max_attempts: u32,
    pub max_upload_bytes: usize,
    /// Usernames nobody may register, compared case-insensitively.
    pub reserved_usernames: Vec<String>,
    pub watermark: WatermarkPolicy,
    /// Public root under which `hosting/` is served, without trailing slash.
    pub public_site_base: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(60),
            cas_max_attempts: 3,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            reserved_usernames: vec!["admin".to_string()],
            watermark: WatermarkPolicy::default(),
            public_site_base: "http://localhost:8091/raw".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CACHE_TTL_SECS` (default: 60)
    /// - `CAS_MAX_ATTEMPTS` (default: 3)
    /// - `MAX_UPLOAD_BYTES` (default: 25 MiB)
    /// - `RESERVED_USERNAMES` (comma-separated, default: `admin`)
    /// - `WATERMARK_BRAND`, `WATERMARK_URL` (default: SiteHost branding)
    /// - `PUBLIC_SITE_BASE` (default: the repository's pages site,
    ///   `https://{owner}.github.io/{repo}`)
    pub fn from_env(content: &ContentApiConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(content, |var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(content: &ContentApiConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let ttl_secs: u32 = parse_or(&non_empty, "CACHE_TTL_SECS", 60)?;
        let reserved_usernames = match non_empty("RESERVED_USERNAMES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.reserved_usernames,
        };
        let default_policy = WatermarkPolicy::default();
        let watermark = match (non_empty("WATERMARK_BRAND"), non_empty("WATERMARK_URL")) {
            (None, None) => default_policy,
            (brand, url) => WatermarkPolicy::new(
                brand.unwrap_or_else(|| "SiteHost".to_string()),
                url.unwrap_or_else(|| "https://sitehost.app".to_string()),
            ),
        };
        let public_site_base = non_empty("PUBLIC_SITE_BASE")
            .unwrap_or_else(|| format!("https://{}.github.io/{}", content.owner, content.repo));

        Ok(Self {
            cache_ttl: Duration::seconds(i64::from(ttl_secs)),
            cas_max_attempts: parse_or(&non_empty, "CAS_MAX_ATTEMPTS", defaults.cas_max_attempts)?,
            max_upload_bytes: parse_or(&non_empty, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            reserved_usernames,
            watermark,
            public_site_base: public_site_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_reserved(&self, username: &str) -> bool {
        self.reserved_usernames
            .iter()
            .any(|r| r.eq_ignore_ascii_case(username))
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
