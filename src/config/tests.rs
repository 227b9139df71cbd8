use std::io::Write;

use clap::Parser;

use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.store, StoreBackend::Postgres);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(
        settings.cache.follower_ttl,
        Duration::from_secs(DEFAULT_VIEW_TTL_SECS)
    );
    assert_eq!(
        settings.cache.subscriber_ttl,
        Duration::from_secs(DEFAULT_VIEW_TTL_SECS)
    );
    assert_eq!(settings.cache.memory_capacity.get(), DEFAULT_MEMORY_CAPACITY);
    assert_eq!(
        settings.database.max_connections.get(),
        DEFAULT_DB_MAX_CONNECTIONS
    );
    assert!(settings.database.url.is_none());
    assert!(settings.operations.timeout.is_none());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("postgres://from-file".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = Overrides {
        database_url: Some("postgres://from-cli".to_string()),
        log_level: Some("debug".to_string()),
        store: Some(StoreBackend::Memory),
        timeout_ms: Some(250),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://from-cli")
    );
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.store, StoreBackend::Memory);
    assert_eq!(
        settings.operations.timeout,
        Some(Duration::from_millis(250))
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_overrides(&Overrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some(CacheBackend::Redis);
    raw.cache.redis_url = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("redis without url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.subscriber_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.subscriber_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn zero_timeout_disables_deadline() {
    let mut raw = RawSettings::default();
    raw.operations.timeout_ms = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.operations.timeout.is_none());
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn config_file_is_layered_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        r#"
[store]
backend = "memory"

[cache]
follower_ttl_seconds = 60
memory_capacity = 32

[logging]
level = "warn"
"#
    )
    .expect("write config");

    let path = file.path().to_str().expect("utf-8 path").to_string();
    let args = CliArgs::parse_from([
        "relcache",
        "--config-file",
        path.as_str(),
        "--log-level",
        "trace",
        "followers",
        "alice",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.store, StoreBackend::Memory);
    assert_eq!(settings.cache.follower_ttl, Duration::from_secs(60));
    assert_eq!(
        settings.cache.subscriber_ttl,
        Duration::from_secs(DEFAULT_VIEW_TTL_SECS)
    );
    assert_eq!(settings.cache.memory_capacity.get(), 32);
    assert_eq!(settings.logging.level, LevelFilter::TRACE);
}

#[test]
fn parse_create_arguments() {
    let args = CliArgs::parse_from([
        "relcache",
        "create",
        "--following",
        "alice:bob",
        "alice:carol",
    ]);

    match args.command {
        Command::Create(create) => {
            assert!(create.following);
            assert!(!create.blocked);
            assert!(!create.subscribed);
            assert_eq!(
                create.pairs.pairs,
                vec![
                    ("alice".to_string(), "bob".to_string()),
                    ("alice".to_string(), "carol".to_string()),
                ]
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn malformed_pair_is_rejected() {
    let result = CliArgs::try_parse_from(["relcache", "delete", "alice-bob"]);
    assert!(result.is_err());

    let result = CliArgs::try_parse_from(["relcache", "delete", "alice:"]);
    assert!(result.is_err());
}

#[test]
fn global_flags_follow_subcommand() {
    let args = CliArgs::parse_from([
        "relcache",
        "follow",
        "alice",
        "bob",
        "--store",
        "memory",
        "--cache",
        "redis",
        "--redis-url",
        "redis://localhost",
    ]);

    assert_eq!(args.overrides.store, Some(StoreBackend::Memory));
    assert_eq!(args.overrides.cache, Some(CacheBackend::Redis));
    match args.command {
        Command::Follow(pair) => {
            assert_eq!(pair.owner, "alice");
            assert_eq!(pair.related, "bob");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn documented_cache_keys_reach_cache_config() {
    let mut raw = RawSettings::default();
    raw.cache.follower_ttl_seconds = Some(90);
    raw.cache.subscriber_ttl_seconds = Some(120);
    raw.cache.memory_capacity = Some(64);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let cache = crate::cache::CacheConfig::from(&settings.cache);
    assert_eq!(cache.follower_ttl(), Duration::from_secs(90));
    assert_eq!(cache.subscriber_ttl(), Duration::from_secs(120));
    assert_eq!(cache.memory_capacity_non_zero().get(), 64);
}
