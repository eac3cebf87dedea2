use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.igdb.base_url.as_str(), "https://api.igdb.com/v4/");
    assert_eq!(settings.igdb.request_timeout, Duration::from_secs(30));
    assert!(settings.igdb.client_id.is_none());
    assert_eq!(settings.cache.ttl.default, time::Duration::hours(1));
    assert_eq!(settings.cache.ttl.max, time::Duration::days(30));
    assert!(!settings.cache.coalesce_misses);
    assert!(settings.housekeeping.enabled);
    assert_eq!(settings.housekeeping.schedule, "0 0 * * * *");
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.igdb.client_id = Some("from-env".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        igdb_client_id: Some("from-cli".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.igdb.client_id.as_deref(), Some("from-cli"));
}

fn toml_layer(contents: &str) -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(config::File::from_str(contents, config::FileFormat::Toml))
}

fn env_layer(vars: &[(&str, &str)]) -> Environment {
    let vars: config::Map<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .source(Some(vars))
}

const LAYERED_TOML: &str = r#"
[server]
port = 4000

[logging]
level = "warn"

[igdb]
client_id = "from-file"
"#;

#[test]
fn environment_overrides_file_values() {
    let cli = CliArgs::parse_from(["igdb-cache", "serve"]);
    let env = env_layer(&[
        ("IGDB_CACHE__SERVER__PORT", "5000"),
        ("IGDB_CACHE__IGDB__CLIENT_ID", "from-env"),
    ]);

    let settings = load_layered(toml_layer(LAYERED_TOML), env, &cli).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 5000);
    assert_eq!(settings.igdb.client_id.as_deref(), Some("from-env"));
    assert_eq!(settings.logging.level, LevelFilter::WARN);
}

#[test]
fn cli_flags_override_file_and_environment() {
    let cli = CliArgs::parse_from([
        "igdb-cache",
        "serve",
        "--server-port",
        "6000",
        "--igdb-client-id",
        "from-cli",
    ]);
    let env = env_layer(&[
        ("IGDB_CACHE__SERVER__PORT", "5000"),
        ("IGDB_CACHE__IGDB__CLIENT_ID", "from-env"),
    ]);

    let settings = load_layered(toml_layer(LAYERED_TOML), env, &cli).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 6000);
    assert_eq!(settings.igdb.client_id.as_deref(), Some("from-cli"));
    assert_eq!(settings.logging.level, LevelFilter::WARN);
}

#[test]
fn later_file_layer_overrides_earlier_one() {
    let cli = CliArgs::parse_from(["igdb-cache", "purge-expired"]);
    let files = toml_layer(LAYERED_TOML).add_source(config::File::from_str(
        "[server]\nport = 4100\n",
        config::FileFormat::Toml,
    ));

    let settings = load_layered(files, env_layer(&[]), &cli).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4100);
    assert_eq!(settings.igdb.client_id.as_deref(), Some("from-file"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn base_url_gains_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.igdb.base_url = Some("http://localhost:8080/v4".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.igdb.base_url.as_str(), "http://localhost:8080/v4/");
    assert_eq!(
        settings.igdb.base_url.join("games").expect("join").as_str(),
        "http://localhost:8080/v4/games"
    );
}

#[test]
fn non_http_base_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.igdb.base_url = Some("ftp://example.com/".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp is not allowed");
    assert!(matches!(err, LoadError::Invalid { key: "igdb.base_url", .. }));
}

#[test]
fn blank_credentials_are_dropped() {
    let mut raw = RawSettings::default();
    raw.igdb.client_id = Some("   ".to_string());
    raw.igdb.access_token = Some("token".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.igdb.client_id.is_none());
    assert_eq!(settings.igdb.access_token.as_deref(), Some("token"));
}

#[test]
fn debug_output_redacts_access_token() {
    let mut raw = RawSettings::default();
    raw.igdb.access_token = Some("super-secret".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!format!("{:?}", settings.igdb).contains("super-secret"));
}

#[test]
fn default_ttl_cannot_exceed_max() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(7200);
    raw.cache.max_ttl_seconds = Some(3600);

    let err = Settings::from_raw(raw).expect_err("default above max");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.default_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    let err = Settings::from_raw(raw).expect_err("port zero");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = RawSettings::default();
    raw.igdb.request_timeout_seconds = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn malformed_housekeeping_schedule_is_rejected() {
    let mut raw = RawSettings::default();
    raw.housekeeping.schedule = Some("hourly".to_string());

    let err = Settings::from_raw(raw).expect_err("bad cron");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "housekeeping.schedule",
            ..
        }
    ));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["igdb-cache"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_purge_expired_arguments() {
    let args = CliArgs::parse_from([
        "igdb-cache",
        "purge-expired",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("purge-expired command") {
        Command::PurgeExpired(purge) => {
            assert_eq!(
                purge.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "igdb-cache",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--server-port",
        "8080",
        "--log-json",
        "true",
        "--database-url",
        "postgres://cache",
        "--igdb-base-url",
        "http://localhost:9000",
        "--cache-default-ttl-seconds",
        "600",
    ]);

    let overrides = match args.command.expect("serve command") {
        Command::Serve(serve) => serve.overrides,
        other => panic!("unexpected command: {other:?}"),
    };

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.to_string(), "0.0.0.0:8080");
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.database.url.as_deref(), Some("postgres://cache"));
    assert_eq!(settings.igdb.base_url.as_str(), "http://localhost:9000/");
    assert_eq!(settings.cache.ttl.default, time::Duration::minutes(10));
}
