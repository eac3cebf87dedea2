//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, PurgeArgs, ServeArgs, ServeOverrides};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{igdb_cache::TtlPolicy, jobs::parse_purge_schedule};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "igdb-cache";
const ENV_PREFIX: &str = "IGDB_CACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_IGDB_BASE_URL: &str = "https://api.igdb.com/v4/";
const DEFAULT_IGDB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub igdb: IgdbSettings,
    pub cache: CacheSettings,
    pub housekeeping: HousekeepingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
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

/// Upstream endpoint and credentials. Credentials stay optional here; a
/// missing pair surfaces on the first fetch instead of at startup.
#[derive(Clone)]
pub struct IgdbSettings {
    pub base_url: Url,
    pub client_id: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for IgdbSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgdbSettings")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: TtlPolicy,
    pub coalesce_misses: bool,
}

#[derive(Debug, Clone)]
pub struct HousekeepingSettings {
    pub enabled: bool,
    pub schedule: String,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut files = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        files = files.add_source(File::from(path.as_path()).required(true));
    }

    load_layered(
        files,
        Environment::with_prefix(ENV_PREFIX).separator("__"),
        cli,
    )
}

/// Stacks `env` over the file layers already in `files`, then applies the CLI overrides.
fn load_layered(
    files: ConfigBuilder<DefaultState>,
    env: Environment,
    cli: &CliArgs,
) -> Result<Settings, LoadError> {
    let mut raw: RawSettings = files.add_source(env).build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::PurgeExpired(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    igdb: RawIgdbSettings,
    cache: RawCacheSettings,
    housekeeping: RawHousekeepingSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(client_id) = overrides.igdb_client_id.as_ref() {
            self.igdb.client_id = Some(client_id.clone());
        }
        if let Some(base_url) = overrides.igdb_base_url.as_ref() {
            self.igdb.base_url = Some(base_url.clone());
        }
        if let Some(seconds) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(seconds);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            igdb,
            cache,
            housekeeping,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            igdb: build_igdb_settings(igdb)?,
            cache: build_cache_settings(cache)?,
            housekeeping: build_housekeeping_settings(housekeeping)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    Ok(ServerSettings { public_addr })
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
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_igdb_settings(igdb: RawIgdbSettings) -> Result<IgdbSettings, LoadError> {
    let raw_url = igdb
        .base_url
        .unwrap_or_else(|| DEFAULT_IGDB_BASE_URL.to_string());
    let base_url = parse_base_url(raw_url.trim())
        .map_err(|reason| LoadError::invalid("igdb.base_url", reason))?;

    let timeout_secs = igdb
        .request_timeout_seconds
        .unwrap_or(DEFAULT_IGDB_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "igdb.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(IgdbSettings {
        base_url,
        client_id: non_blank(igdb.client_id),
        access_token: non_blank(igdb.access_token),
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let default_secs = cache
        .default_ttl_seconds
        .unwrap_or(igdb_cache_types::DEFAULT_TTL_SECONDS);
    let max_secs = cache.max_ttl_seconds.unwrap_or(DEFAULT_MAX_TTL_SECS);

    if max_secs == 0 {
        return Err(LoadError::invalid(
            "cache.max_ttl_seconds",
            "must be greater than zero",
        ));
    }
    if default_secs > max_secs {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            format!("must not exceed cache.max_ttl_seconds ({max_secs})"),
        ));
    }

    let default = seconds_to_duration(default_secs, "cache.default_ttl_seconds")?;
    let max = seconds_to_duration(max_secs, "cache.max_ttl_seconds")?;

    Ok(CacheSettings {
        ttl: TtlPolicy { default, max },
        coalesce_misses: cache.coalesce_misses.unwrap_or(false),
    })
}

fn build_housekeeping_settings(
    housekeeping: RawHousekeepingSettings,
) -> Result<HousekeepingSettings, LoadError> {
    let schedule = non_blank(housekeeping.schedule)
        .unwrap_or_else(|| crate::application::jobs::DEFAULT_PURGE_SCHEDULE.to_string());
    parse_purge_schedule(&schedule)
        .map_err(|reason| LoadError::invalid("housekeeping.schedule", reason))?;

    Ok(HousekeepingSettings {
        enabled: housekeeping.enabled.unwrap_or(true),
        schedule,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawIgdbSettings {
    base_url: Option<String>,
    client_id: Option<String>,
    access_token: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_ttl_seconds: Option<u64>,
    max_ttl_seconds: Option<u64>,
    coalesce_misses: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHousekeepingSettings {
    enabled: Option<bool>,
    schedule: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Relative joins drop the last path segment unless the base ends in `/`.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|err| format!("invalid url `{raw}`: {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    Ok(url)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn seconds_to_duration(value: u64, key: &'static str) -> Result<time::Duration, LoadError> {
    let seconds = i64::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for i64"))?;
    Ok(time::Duration::seconds(seconds))
}

#[cfg(test)]
mod tests;
