use narrify_client::config::{ClientConfig, ConfigError};
use proptest::prelude::*;
use std::io::Write;
use std::time::Duration;

fn base_config() -> ClientConfig {
    ClientConfig {
        api_base_url: "http://localhost:8000/api".to_string(),
        request_timeout_ms: 5_000,
        session_path: "tmp/narrify-session.json".into(),
        session_poll_ms: 1_000,
        search_debounce_ms: 350,
        feed_page_size: 5,
        stale_after_ms: None,
        log_filter: None,
    }
}

const FULL_TOML: &str = r#"
api_base_url = "http://localhost:8000/api"
request_timeout_ms = 5000
session_path = "tmp/narrify-session.json"
session_poll_ms = 1000
search_debounce_ms = 350
feed_page_size = 5
stale_after_ms = 30000
log_filter = "narrify_client=debug"
"#;

#[test]
fn base_config_is_valid() {
    assert!(base_config().validate().is_ok());
}

#[test]
fn parses_full_toml() {
    let config = ClientConfig::from_toml(FULL_TOML).unwrap();
    config.validate().unwrap();
    assert_eq!(config.search_debounce(), Duration::from_millis(350));
    assert_eq!(config.stale_after(), Some(Duration::from_secs(30)));
    assert_eq!(config.log_filter.as_deref(), Some("narrify_client=debug"));
}

#[test]
fn optional_fields_default_to_none() {
    let toml = FULL_TOML
        .lines()
        .filter(|line| !line.starts_with("stale_after_ms") && !line.starts_with("log_filter"))
        .collect::<Vec<_>>()
        .join("\n");
    let config = ClientConfig::from_toml(&toml).unwrap();
    assert_eq!(config.stale_after(), None);
    assert!(config.log_filter.is_none());
}

#[test]
fn unknown_fields_are_rejected() {
    let toml = format!("{}\ntheme = \"dark\"\n", FULL_TOML);
    assert!(matches!(
        ClientConfig::from_toml(&toml),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn missing_required_field_is_rejected() {
    let toml = FULL_TOML.replace("feed_page_size = 5", "");
    assert!(ClientConfig::from_toml(&toml).is_err());
}

#[test]
fn reads_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_TOML.as_bytes()).unwrap();
    let config = ClientConfig::from_path(file.path()).unwrap();
    assert_eq!(config.feed_page_size, 5);
}

#[test]
fn config_requires_http_url() {
    let mut config = base_config();
    config.api_base_url = "localhost:8000".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { field: "api_base_url", .. })
    ));
    config.api_base_url = "   ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn config_rejects_zero_stale_after() {
    let mut config = base_config();
    config.stale_after_ms = Some(0);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { field: "stale_after_ms", .. })
    ));
}

#[test]
fn config_rejects_empty_session_path() {
    let mut config = base_config();
    config.session_path = "".into();
    assert!(config.validate().is_err());
}

proptest! {
    #[test]
    fn nonzero_values_validate(
        timeout in 1u64..600_000,
        poll in 1u64..600_000,
        debounce in 1u64..10_000,
        page in 1usize..500,
        stale in proptest::option::of(1u64..3_600_000),
        https in any::<bool>(),
    ) {
        let mut config = base_config();
        config.request_timeout_ms = timeout;
        config.session_poll_ms = poll;
        config.search_debounce_ms = debounce;
        config.feed_page_size = page;
        config.stale_after_ms = stale;
        if https {
            config.api_base_url = "https://narrify.example/api".to_string();
        }
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn any_zero_duration_is_rejected(which in 0usize..4) {
        let mut config = base_config();
        let field = match which {
            0 => { config.request_timeout_ms = 0; "request_timeout_ms" }
            1 => { config.session_poll_ms = 0; "session_poll_ms" }
            2 => { config.search_debounce_ms = 0; "search_debounce_ms" }
            _ => { config.feed_page_size = 0; "feed_page_size" }
        };
        match config.validate() {
            Err(ConfigError::InvalidValue { field: got, .. }) => prop_assert_eq!(got, field),
            other => prop_assert!(false, "expected InvalidValue, got {:?}", other),
        }
    }
}
