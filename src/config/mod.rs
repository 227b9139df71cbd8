//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CacheBackend, CliArgs, Command, CreateArgs, OwnerArgs, Overrides, PairArgs, PairsArgs,
    StoreBackend,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "relcache";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_VIEW_TTL_SECS: u64 = 60 * 60 * 12;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub store: StoreBackend,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub operations: OperationSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub follower_ttl: Duration,
    pub subscriber_ttl: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct OperationSettings {
    /// Deadline applied to every command; `None` runs without one.
    pub timeout: Option<Duration>,
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("RELCACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    operations: RawOperationSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(store) = overrides.store {
            self.store.backend = Some(store);
        }
        if let Some(cache) = overrides.cache {
            self.cache.backend = Some(cache);
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.operations.timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            store,
            database,
            cache,
            operations,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let store = store.backend.unwrap_or_default();
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let operations = build_operation_settings(operations);

        Ok(Self {
            logging,
            store,
            database,
            cache,
            operations,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = cache.backend.unwrap_or_default();
    let redis_url = non_blank(cache.redis_url);
    if backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is redis",
        ));
    }

    let follower_ttl = ttl(cache.follower_ttl_seconds, "cache.follower_ttl_seconds")?;
    let subscriber_ttl = ttl(cache.subscriber_ttl_seconds, "cache.subscriber_ttl_seconds")?;

    let memory_capacity = cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY);
    let memory_capacity = NonZeroUsize::new(memory_capacity).ok_or_else(|| {
        LoadError::invalid("cache.memory_capacity", "must be greater than zero")
    })?;

    Ok(CacheSettings {
        backend,
        redis_url,
        follower_ttl,
        subscriber_ttl,
        memory_capacity,
    })
}

fn build_operation_settings(operations: RawOperationSettings) -> OperationSettings {
    let timeout = operations
        .timeout_ms
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis);
    OperationSettings { timeout }
}

fn ttl(seconds: Option<u64>, key: &'static str) -> Result<Duration, LoadError> {
    let seconds = seconds.unwrap_or(DEFAULT_VIEW_TTL_SECS);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<StoreBackend>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<CacheBackend>,
    redis_url: Option<String>,
    follower_ttl_seconds: Option<u64>,
    subscriber_ttl_seconds: Option<u64>,
    memory_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOperationSettings {
    timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests;
