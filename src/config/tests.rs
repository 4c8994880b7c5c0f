use super::*;

#[test]
fn defaults_resolve_without_any_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.paths.output_dir, PathBuf::from("dist"));
    assert_eq!(settings.offline.cache_name(), "folio-v1");
    assert_eq!(
        settings.offline.max_precache_bytes.get(),
        DEFAULT_MAX_PRECACHE_BYTES
    );
    assert_eq!(settings.site.title_template, "%s | Portfolio");
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(8080),
        build: BuildOverrides {
            log_level: Some("debug".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 8080);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn build_overrides_pin_date_and_drafts() {
    let mut raw = RawSettings::default();
    raw.apply_build_overrides(&BuildOverrides {
        drafts: true,
        build_date: Some("2024-05-01".to_string()),
        site_url: Some("https://example.com".to_string()),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(settings.build.include_drafts);
    assert_eq!(
        settings.build.build_date,
        Some(time::macros::date!(2024 - 05 - 01))
    );
    assert_eq!(settings.site.host(), "example.com");
    assert_eq!(
        settings.site.absolute("/blog/"),
        "https://example.com/blog/"
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_build_overrides(&BuildOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn rejects_non_web_site_url() {
    let mut raw = RawSettings::default();
    raw.site.url = Some("ftp://example.com".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp scheme should fail");
    assert!(matches!(err, LoadError::Invalid { key: "site.url", .. }));
}

#[test]
fn rejects_unparsable_site_url() {
    let mut raw = RawSettings::default();
    raw.site.url = Some("not a url".to_string());

    let err = Settings::from_raw(raw).expect_err("relative url should fail");
    assert!(err.to_string().contains("Invalid URL format"));
}

#[test]
fn rejects_invalid_site_email() {
    let mut raw = RawSettings::default();
    raw.site.email = Some("not-an-email".to_string());

    let err = Settings::from_raw(raw).expect_err("email should fail");
    assert!(matches!(err, LoadError::Invalid { key: "site.email", .. }));
}

#[test]
fn site_email_is_normalized() {
    let mut raw = RawSettings::default();
    raw.site.email = Some(" User@Example.COM ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.email.as_deref(), Some("user@example.com"));
}

#[test]
fn title_template_requires_placeholder() {
    let mut raw = RawSettings::default();
    raw.site.title_template = Some("Static title".to_string());

    let err = Settings::from_raw(raw).expect_err("template should fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "site.title_template",
            ..
        }
    ));
}

#[test]
fn output_dir_must_differ_from_inputs() {
    let mut raw = RawSettings::default();
    raw.paths.output_dir = Some(PathBuf::from("public"));

    let err = Settings::from_raw(raw).expect_err("overlapping dirs should fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "paths.output_dir",
            ..
        }
    ));
}

#[test]
fn rejects_zero_rate_limit_values() {
    let mut raw = RawSettings::default();
    raw.rate_limit.max_requests = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero should fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.max_requests",
            ..
        }
    ));
}

#[test]
fn rejects_cache_prefix_with_separators() {
    let mut raw = RawSettings::default();
    raw.offline.cache_prefix = Some("bad prefix/".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn offline_path_must_be_site_relative() {
    let mut raw = RawSettings::default();
    raw.offline.offline_path = Some("offline.html".to_string());

    let err = Settings::from_raw(raw).expect_err("relative path should fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "offline.offline_path",
            ..
        }
    ));
}

#[test]
fn parse_build_arguments() {
    let args = CliArgs::parse_from([
        "folio",
        "build",
        "--output-dir",
        "out",
        "--drafts",
        "--build-date",
        "2024-01-31",
    ]);

    match args.command.expect("build command") {
        Command::Build(build) => {
            assert_eq!(build.overrides.output_dir, Some(PathBuf::from("out")));
            assert!(build.overrides.drafts);
            assert_eq!(build.overrides.build_date.as_deref(), Some("2024-01-31"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from(["folio", "serve", "--no-build", "--server-port", "9000"]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert!(serve.no_build);
            assert_eq!(serve.overrides.server_port, Some(9000));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn default_to_build_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Build(BuildArgs::default()));
    assert!(matches!(command, Command::Build(_)));
}

#[test]
fn output_dir_may_not_enclose_inputs_or_working_dir() {
    let cases = [
        ("site", "site/content"),
        (".", "content"),
        ("./nested/..", "content"),
    ];
    for (output, content) in cases {
        let mut raw = RawSettings::default();
        raw.paths.output_dir = Some(PathBuf::from(output));
        raw.paths.content_dir = Some(PathBuf::from(content));

        let err = Settings::from_raw(raw).expect_err("enclosing output dir should fail");
        assert!(
            matches!(
                err,
                LoadError::Invalid {
                    key: "paths.output_dir",
                    ..
                }
            ),
            "output {output} with content {content}"
        );
    }
}

#[test]
fn output_dir_inside_public_is_rejected() {
    let mut raw = RawSettings::default();
    raw.paths.output_dir = Some(PathBuf::from("public/dist"));

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn sibling_output_dir_is_accepted() {
    let mut raw = RawSettings::default();
    raw.paths.output_dir = Some(PathBuf::from("build/site"));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.paths.output_dir, PathBuf::from("build/site"));
}
