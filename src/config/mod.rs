//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::{NonZeroU64, NonZeroUsize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::Duration;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "campanile";
const DEFAULT_LIST_TTL_SECS: u64 = 300;
const DEFAULT_ITEM_TTL_SECS: u64 = 300;
const DEFAULT_CONFIG_TTL_SECS: u64 = 300;
const DEFAULT_ASSET_URL_TTL_SECS: u64 = 86_400;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 120;
const DEFAULT_HOT_CAPACITY: usize = 256;
const DEFAULT_PAGE_SIZE: usize = 6;
const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Settings for the cache core, from `campanile.toml` and `CAMPANILE_*`
/// environment overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub feed: FeedSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Seconds a cached content list stays fresh.
    pub list_ttl_secs: u64,
    /// Seconds a cached single item (record or body) stays fresh.
    pub item_ttl_secs: u64,
    /// Seconds the cached remote config map stays fresh.
    pub config_ttl_secs: u64,
    /// Seconds a resolved asset URL stays fresh.
    pub asset_url_ttl_secs: u64,
    /// Seconds between background revalidations of an active feed view.
    pub refresh_interval_secs: u64,
    /// Maximum entries in the in-process hot layer.
    pub hot_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_ttl_secs: DEFAULT_LIST_TTL_SECS,
            item_ttl_secs: DEFAULT_ITEM_TTL_SECS,
            config_ttl_secs: DEFAULT_CONFIG_TTL_SECS,
            asset_url_ttl_secs: DEFAULT_ASSET_URL_TTL_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            hot_capacity: DEFAULT_HOT_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn list_ttl(&self) -> Duration {
        secs(self.list_ttl_secs)
    }

    pub fn item_ttl(&self) -> Duration {
        secs(self.item_ttl_secs)
    }

    pub fn config_ttl(&self) -> Duration {
        secs(self.config_ttl_secs)
    }

    pub fn asset_url_ttl(&self) -> Duration {
        secs(self.asset_url_ttl_secs)
    }

    /// Returns the refresh interval, clamping to 1 s so a zero cannot spin.
    pub fn refresh_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Returns the hot layer capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn hot_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.hot_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Items per sponsored-insertion page when the remote config map has no
    /// per-kind override.
    pub page_size: usize,
    /// IANA timezone the tenant's calendar days are evaluated in.
    pub timezone: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl FeedSettings {
    /// Returns the page size as NonZeroUsize, clamping to 1 if zero.
    pub fn page_size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.page_size).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the tenant timezone, falling back to the default when the
    /// configured name does not parse. `load` rejects such a name up front.
    pub fn tz(&self) -> Tz {
        Tz::from_str(&self.timezone).unwrap_or(chrono_tz::Asia::Seoul)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Base URL of the content API, without the `/api` suffix.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl HttpSettings {
    /// Returns the timeout as NonZeroU64, clamping to 1 if zero.
    pub fn timeout_secs_non_zero(&self) -> NonZeroU64 {
        NonZeroU64::new(self.timeout_secs).unwrap_or(NonZeroU64::MIN)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Base log level (trace|debug|info|warn|error).
    pub level: String,
    /// Emit JSON log lines instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::INFO)
    }

    pub fn format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings from the default file locations and the environment.
pub fn load() -> Result<Settings, LoadError> {
    load_from(None)
}

/// Load settings with an explicit configuration file taking precedence over
/// the default locations; `CAMPANILE_*` environment variables override both.
pub fn load_from(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CAMPANILE").separator("__"));

    let settings: Settings = builder.build()?.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), LoadError> {
    if settings.http.base_url.trim().is_empty() {
        return Err(LoadError::invalid("http.base_url", "must not be empty"));
    }
    Tz::from_str(&settings.feed.timezone)
        .map_err(|err| LoadError::invalid("feed.timezone", err.to_string()))?;
    LevelFilter::from_str(&settings.logging.level)
        .map_err(|err| LoadError::invalid("logging.level", format!("failed to parse: {err}")))?;
    Ok(())
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
