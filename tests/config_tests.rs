mod support;

use std::time::Duration;

use courier::domain::Priority;
use courier::error::{ConfigError, Error};
use courier::infrastructure::config::settings::Config;

use support::config::write_config;

#[test]
fn loads_full_config_from_file() {
    let (_dir, path) = write_config(
        r#"
[logging]
level = "debug"
format = "json"

[scheduler]
max_concurrent = 4

[request]
default_timeout_ms = 10000
default_max_retries = 2

[retry]
base_delay_ms = 500
max_delay_ms = 8000
jitter = true

[cache]
default_ttl_ms = 60000
max_entries = 250

[quality]
window_size = 30
evaluation_interval_ms = 2000
idle_threshold_ms = 15000
probe_address = "https://status.example.com/health"
probe_timeout_ms = 1500

[batch]
max_retained = 20
"#,
    );

    let config = Config::load(&path).expect("config loads");
    let settings = config.engine_settings();

    assert_eq!(config.logging.format, "json");
    assert_eq!(settings.max_concurrent, 4);
    assert_eq!(settings.request.timeout, Duration::from_secs(10));
    assert_eq!(settings.request.max_retries, 2);
    assert_eq!(settings.request.cache_ttl, Duration::from_secs(60));
    assert_eq!(settings.retry.base_delay, Duration::from_millis(500));
    assert_eq!(settings.retry.max_delay, Duration::from_secs(8));
    assert!(settings.retry.jitter);
    assert_eq!(settings.cache_max_entries, 250);
    assert_eq!(settings.quality.window_size, 30);
    assert_eq!(settings.quality.evaluation_interval, Duration::from_secs(2));
    assert_eq!(settings.quality.idle_threshold, Duration::from_secs(15));
    assert_eq!(
        settings.quality.probe_address.as_deref(),
        Some("https://status.example.com/health")
    );
    assert_eq!(settings.quality.probe_timeout, Duration::from_millis(1500));
    assert_eq!(settings.max_retained_batches, 20);
}

#[test]
fn empty_file_matches_defaults() {
    let (_dir, path) = write_config("");

    let config = Config::load(&path).expect("config loads");

    assert_eq!(config, Config::default());
    let settings = config.engine_settings();
    assert_eq!(settings.max_concurrent, 6);
    assert_eq!(settings.request.max_retries, 3);
    assert_eq!(settings.retry.base_delay, Duration::from_secs(1));
    assert_eq!(settings.retry.max_delay, Duration::from_secs(30));
}

#[test]
fn missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = Config::load(dir.path().join("absent.toml"));

    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn malformed_toml_is_parse_error() {
    let (_dir, path) = write_config("[scheduler\nmax_concurrent = 2");

    let result = Config::load(&path);

    assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
}

#[test]
fn config_rejects_out_of_range_values() {
    let cases = [
        ("[scheduler]\nmax_concurrent = 0", "max_concurrent"),
        ("[retry]\nbase_delay_ms = 2000\nmax_delay_ms = 1000", "max_delay_ms"),
        ("[quality]\nwindow_size = 5", "window_size"),
        ("[quality]\nwindow_size = 101", "window_size"),
        ("[quality]\nprobe_address = \"ftp://example.com\"", "probe_address"),
        ("[cache]\nmax_entries = 0", "max_entries"),
        ("[logging]\nformat = \"xml\"", "format"),
    ];

    for (toml, expected) in cases {
        let (_dir, path) = write_config(toml);
        match Config::load(&path) {
            Err(Error::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, expected, "for config {toml:?}");
            }
            Err(err) => panic!("expected invalid {expected}, got {err}"),
            Ok(_) => panic!("expected {toml:?} to be rejected"),
        }
    }
}

#[tokio::test]
async fn request_defaults_flow_into_built_requests() {
    let (_dir, path) = write_config(
        "[request]\ndefault_timeout_ms = 750\ndefault_max_retries = 1\n[cache]\ndefault_ttl_ms = 2000",
    );
    let config = Config::load(&path).unwrap();
    let engine = courier::infrastructure::bootstrap::build_engine(&config).unwrap();

    let request = engine
        .request(courier::domain::Method::Get, "https://api.example.com/goals")
        .cached()
        .build()
        .unwrap();

    assert_eq!(request.timeout(), Duration::from_millis(750));
    assert_eq!(request.max_retries(), 1);
    assert_eq!(request.cache_ttl(), Some(Duration::from_secs(2)));
    assert_eq!(request.priority(), Priority::Normal);
}
