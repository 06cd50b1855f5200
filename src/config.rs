use crate::cache::MATCH_CACHE_TTL;
use crate::store::DEFAULT_TREE_TTL;
use anyhow::anyhow;
use catalog_types::{parse_duration, Marketplace};
use derive_builder::Builder;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_UPSTREAM_RPM: u64 = 120;

/// Settings of one marketplace catalog.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    pub marketplace: Marketplace,
    #[builder(default = "DEFAULT_TREE_TTL")]
    pub tree_ttl: Duration,
    /// Falls back to `tree_ttl` when unset.
    #[builder(default, setter(strip_option))]
    pub attribute_ttl: Option<Duration>,
    #[builder(default = "MATCH_CACHE_TTL")]
    pub match_cache_ttl: Duration,
    #[builder(default = "false")]
    pub warm_on_start: bool,
}

impl CatalogConfig {
    pub fn new(marketplace: Marketplace) -> Self {
        Self {
            marketplace,
            tree_ttl: DEFAULT_TREE_TTL,
            attribute_ttl: None,
            match_cache_ttl: MATCH_CACHE_TTL,
            warm_on_start: false,
        }
    }

    pub fn attribute_ttl(&self) -> Duration {
        self.attribute_ttl.unwrap_or(self.tree_ttl)
    }

    /// Reads `<MARKETPLACE>_CATEGORY_TTL`, `<MARKETPLACE>_ATTRIBUTE_TTL`,
    /// `MATCH_CACHE_TTL` and `CATALOG_WARM_ON_START`.
    pub fn from_env(marketplace: Marketplace) -> anyhow::Result<Self> {
        let prefix = marketplace.env_prefix();
        let mut builder = CatalogConfigBuilder::default();
        builder
            .marketplace(marketplace)
            .warm_on_start(env_flag("CATALOG_WARM_ON_START", true));
        if let Some(ttl) = env_duration(&format!("{prefix}_CATEGORY_TTL"))? {
            builder.tree_ttl(ttl);
        }
        if let Some(ttl) = env_duration(&format!("{prefix}_ATTRIBUTE_TTL"))? {
            builder.attribute_ttl(ttl);
        }
        if let Some(ttl) = env_duration("MATCH_CACHE_TTL")? {
            builder.match_cache_ttl(ttl);
        }
        Ok(builder.build()?)
    }
}

/// Process-wide settings of the HTTP side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub http_timeout: Duration,
    pub upstream_rpm: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let upstream_rpm = match env_string("UPSTREAM_RPM") {
            Some(_) => envmnt::get_parse("UPSTREAM_RPM")
                .map_err(|err| anyhow!("Invalid UPSTREAM_RPM: {err}"))?,
            None => DEFAULT_UPSTREAM_RPM,
        };
        Ok(Self {
            bind_addr: env_string("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            http_timeout: env_duration("HTTP_TIMEOUT")?.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            upstream_rpm,
        })
    }
}

/// Trimmed value of `key`; unset and blank are the same.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_flag(key: &str, default_value: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default_value,
        },
        Err(_) => default_value,
    }
}

pub fn env_duration(key: &str) -> anyhow::Result<Option<Duration>> {
    env_string(key)
        .map(|v| parse_duration(&v).map_err(|err| anyhow!("Invalid {key}: {err}")))
        .transpose()
}
