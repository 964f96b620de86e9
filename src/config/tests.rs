use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(settings.cache.ttl, Duration::from_secs(3600));
    assert!((settings.cache.stale_fraction - 0.83).abs() < f64::EPSILON);
    assert_eq!(settings.cache.page_size.get(), 100);
    assert_eq!(settings.cache.redis_key, "pockets:links");
    assert!(settings.cache.refresh_interval.is_none());
    assert_eq!(settings.upstream.project_id, "pockets");
    assert_eq!(settings.upstream.comments_project_id, "pockets-discussion");
    assert_eq!(
        settings.upstream.base_url.as_str(),
        "https://silo.msar.dev/api"
    );
    assert!(settings.admin.pin.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
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
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("redis".to_string());

    let err = Settings::from_raw(raw.clone()).expect_err("missing redis url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));

    raw.apply_serve_overrides(&ServeOverrides {
        redis_url: Some("redis://127.0.0.1/".to_string()),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, CacheBackend::Redis);
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memcached".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown backend");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.backend",
            ..
        }
    ));
}

#[test]
fn stale_fraction_must_be_a_fraction() {
    for bad in [0.0, -0.5, 1.5, f64::NAN] {
        let mut raw = RawSettings::default();
        raw.cache.stale_fraction = Some(bad);
        assert!(
            Settings::from_raw(raw).is_err(),
            "stale_fraction {bad} should be rejected"
        );
    }

    let mut raw = RawSettings::default();
    raw.cache.stale_fraction = Some(1.0);
    assert!(Settings::from_raw(raw).is_ok());
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_admin_pin_means_unconfigured() {
    let mut raw = RawSettings::default();
    raw.admin.pin = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.admin.pin.is_none());
}

#[test]
fn zero_refresh_interval_disables_the_loop() {
    let mut raw = RawSettings::default();
    raw.cache.refresh_interval_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.cache.refresh_interval.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["pockets"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "pockets",
        "serve",
        "--server-port",
        "8080",
        "--cache-backend",
        "redis",
        "--redis-url",
        "redis://cache:6379/",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(serve.overrides.cache_backend.as_deref(), Some("redis"));
            assert_eq!(
                serve.overrides.redis_url.as_deref(),
                Some("redis://cache:6379/")
            );
        }
    }
}
